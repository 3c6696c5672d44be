/// 存储键模块
/// 提供各种存储键生成与解析函数

// 用户键
pub mod user_keys;

// 聊天键
pub mod chat_keys;

// 重新导出常用的键函数
pub use chat_keys::{CHAT_USERS_PATTERN, chat_id_from_users_key, chat_users_key, legacy_message_key};
pub use user_keys::{USER_CHATS_PATTERN, user_chats_key, user_id_from_chats_key, user_key};
