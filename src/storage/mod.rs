// 存储模块
// 包含键约定、数据模型、客户端以及批处理操作

pub mod client;
pub mod error;
pub mod keys;
pub mod models;
pub mod operations;

// 重新导出常用类型，方便其他模块使用
#[cfg(any(test, feature = "test-util"))]
pub use client::MemoryStore;
pub use client::{RedisStore, ScanPage, Store};
pub use error::{StoreError, StoreResult};
pub use models::{ChatEvent, ChatId, UserId, UserRecord};
