/// 批处理操作
/// 基于 `Store` 的扫描、统计、批量写入与 CSV 导入

// 成员关系读写
pub mod membership;

// 按模式扫描键
pub mod scan;

// 批量生成数据
pub mod populate;

// 统计查询
pub mod stats;

// CSV 导入
pub mod import;

// 重新导出常用操作
pub use import::{CsvImporter, ImportError, ImportReport};
pub use membership::{load_user, record_event};
pub use populate::{KeyLayout, PopulateError, PopulateOptions, PopulateReport, populate_users};
pub use scan::{ScanOptions, find_keys_by_pattern};
pub use stats::{KeyFailure, QueryReport, chats_with_min_users, users_with_chat_count};
