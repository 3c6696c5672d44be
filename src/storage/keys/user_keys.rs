use crate::storage::models::UserId;

/// 用户键前缀
const USER_PREFIX: &str = "user:";

/// 用户聊天集合后缀
const CHATS_SUFFIX: &str = ":chats";

/// 所有用户聊天集合的匹配模式
pub const USER_CHATS_PATTERN: &str = "user:*:chats";

/// 用户记录哈希的字段
pub const LAST_ACTIVE_FIELD: &str = "last_active";
pub const LAST_CHAT_ID_FIELD: &str = "last_chat_id";

/// 生成用户记录键 `user:<id>`
pub fn user_key(user_id: UserId) -> String {
    format!("{}{}", USER_PREFIX, user_id)
}

/// 生成用户聊天集合键 `user:<id>:chats`
pub fn user_chats_key(user_id: UserId) -> String {
    format!("{}{}{}", USER_PREFIX, user_id, CHATS_SUFFIX)
}

/// 从 `user:<id>:chats` 中取出 id 片段
pub fn user_id_from_chats_key(key: &str) -> Option<&str> {
    key.strip_prefix(USER_PREFIX)?
        .strip_suffix(CHATS_SUFFIX)
        .filter(|id| !id.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_user_keys() {
        assert_eq!(user_key(UserId(100)), "user:100");
        assert_eq!(user_chats_key(UserId(100)), "user:100:chats");
    }

    #[test]
    fn extracts_user_id() {
        assert_eq!(user_id_from_chats_key("user:42:chats"), Some("42"));
        assert_eq!(user_id_from_chats_key("user::chats"), None);
        assert_eq!(user_id_from_chats_key("chat:42:users"), None);
    }
}
