/// 存储数据模型
// 标识符
pub mod ids;

// 聊天事件（CSV 行）
pub mod event;

// 用户记录
pub mod user;

// 重新导出常用类型
pub use event::ChatEvent;
pub use ids::{ChatId, UserId};
pub use user::UserRecord;
