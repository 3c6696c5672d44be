//! 存储客户端
//!
//! `Store` 抽象了本工具用到的全部键值操作。生产环境使用 [`RedisStore`]，
//! 测试使用内存实现 `MemoryStore`（`test-util` 特性）。

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use crate::storage::error::StoreResult;

#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod redis_store;

#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryStore;
pub use redis_store::RedisStore;

/// 一页 SCAN 结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    pub keys: Vec<String>,
    /// 为 0 表示扫描结束
    pub next_cursor: u64,
}

#[async_trait]
pub trait Store: Send + Sync {
    /// 探活，返回往返耗时
    async fn ping(&self) -> StoreResult<Duration>;

    /// 读取字符串值；键不存在时返回 `Ok(None)`
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// 无条件覆盖写入；`ttl` 为 `None` 或零时永不过期
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()>;

    /// 向集合添加成员，重复添加无副作用
    async fn add_to_set(&self, key: &str, member: &str) -> StoreResult<()>;

    async fn set_cardinality(&self, key: &str) -> StoreResult<u64>;

    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>>;

    /// 写入哈希字段，同名字段后写覆盖先写
    async fn hash_set(&self, key: &str, fields: &[(&str, &str)]) -> StoreResult<()>;

    async fn hash_get_all(&self, key: &str) -> StoreResult<HashMap<String, String>>;

    /// 基于游标的一页键空间扫描，不是时间点快照
    async fn scan_page(&self, cursor: u64, pattern: &str, page_hint: usize) -> StoreResult<ScanPage>;
}
