use std::collections::HashMap;

use serde::Serialize;

use super::{ChatId, UserId};
use crate::storage::keys::user_keys::{LAST_ACTIVE_FIELD, LAST_CHAT_ID_FIELD};

/// 用户记录：`user:<id>` 哈希加上 `user:<id>:chats` 集合
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRecord {
    pub user_id: UserId,
    pub last_active: Option<String>,
    pub last_chat_id: Option<String>,
    pub chats: Vec<ChatId>,
}

impl UserRecord {
    /// 由哈希字段和聊天集合成员组装，无法解析的成员被丢弃
    pub fn from_parts(user_id: UserId, mut fields: HashMap<String, String>, members: Vec<String>) -> Self {
        let mut chats: Vec<ChatId> = members.iter().filter_map(|m| m.parse().ok()).collect();
        chats.sort();

        UserRecord {
            user_id,
            last_active: fields.remove(LAST_ACTIVE_FIELD),
            last_chat_id: fields.remove(LAST_CHAT_ID_FIELD),
            chats,
        }
    }
}
