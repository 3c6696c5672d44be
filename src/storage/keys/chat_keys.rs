use crate::storage::models::{ChatId, UserId};

/// 聊天键前缀
const CHAT_PREFIX: &str = "chat:";

/// 聊天成员集合后缀
const USERS_SUFFIX: &str = ":users";

/// 所有聊天成员集合的匹配模式
pub const CHAT_USERS_PATTERN: &str = "chat:*:users";

/// 生成聊天成员集合键 `chat:<id>:users`
pub fn chat_users_key(chat_id: ChatId) -> String {
    format!("{}{}{}", CHAT_PREFIX, chat_id, USERS_SUFFIX)
}

/// 旧版扁平键 `chat:<chat>:user:<user>:type:<type>`，值为时间戳字符串
pub fn legacy_message_key(chat_id: ChatId, user_id: UserId, message_type: &str) -> String {
    format!(
        "{}{}:user:{}:type:{}",
        CHAT_PREFIX, chat_id, user_id, message_type
    )
}

/// 从 `chat:<id>:users` 中取出 id 片段
pub fn chat_id_from_users_key(key: &str) -> Option<&str> {
    key.strip_prefix(CHAT_PREFIX)?
        .strip_suffix(USERS_SUFFIX)
        .filter(|id| !id.is_empty())
}
