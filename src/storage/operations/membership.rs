use crate::storage::client::Store;
use crate::storage::error::StoreResult;
use crate::storage::keys::user_keys::{LAST_ACTIVE_FIELD, LAST_CHAT_ID_FIELD};
use crate::storage::keys::{chat_users_key, user_chats_key, user_key};
use crate::storage::models::{ChatEvent, UserId, UserRecord};

/// 将一条聊天事件写入集合结构
///
/// 依次执行：用户加入 `chat:<id>:users`，覆盖 `user:<id>` 哈希，
/// 聊天加入 `user:<id>:chats`。集合写入幂等，哈希写入后写覆盖先写。
pub async fn record_event(store: &dyn Store, event: &ChatEvent) -> StoreResult<()> {
    let chat_id = event.chat_id.to_string();
    let user_id = event.user_id.to_string();

    // 添加用户到聊天成员集合
    store
        .add_to_set(&chat_users_key(event.chat_id), &user_id)
        .await?;

    // 更新用户记录
    store
        .hash_set(
            &user_key(event.user_id),
            &[
                (LAST_ACTIVE_FIELD, event.last_event.as_str()),
                (LAST_CHAT_ID_FIELD, chat_id.as_str()),
            ],
        )
        .await?;

    // 添加聊天到用户的聊天集合
    store
        .add_to_set(&user_chats_key(event.user_id), &chat_id)
        .await?;

    Ok(())
}

/// 读取用户记录，哈希和聊天集合都不存在时返回 `None`
pub async fn load_user(store: &dyn Store, user_id: UserId) -> StoreResult<Option<UserRecord>> {
    let fields = store.hash_get_all(&user_key(user_id)).await?;
    let members = store.set_members(&user_chats_key(user_id)).await?;

    if fields.is_empty() && members.is_empty() {
        tracing::debug!(%user_id, "User not found");
        return Ok(None);
    }

    Ok(Some(UserRecord::from_parts(user_id, fields, members)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::client::MemoryStore;
    use crate::storage::models::ChatId;

    fn event(chat: i64, user: i64, at: &str) -> ChatEvent {
        ChatEvent {
            chat_id: ChatId(chat),
            user_id: UserId(user),
            message_type: "GROUP".into(),
            last_event: at.into(),
        }
    }

    #[tokio::test]
    async fn last_write_wins_on_user_hash() {
        let store = MemoryStore::new();
        record_event(&store, &event(1, 10, "t1")).await.unwrap();
        record_event(&store, &event(2, 10, "t2")).await.unwrap();

        let user = load_user(&store, UserId(10)).await.unwrap().unwrap();
        assert_eq!(user.last_active.as_deref(), Some("t2"));
        assert_eq!(user.last_chat_id.as_deref(), Some("2"));
        assert_eq!(user.chats, vec![ChatId(1), ChatId(2)]);
    }

    #[tokio::test]
    async fn unknown_user_is_absent() {
        let store = MemoryStore::new();
        assert_eq!(load_user(&store, UserId(404)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn one_event_is_three_writes() {
        let store = MemoryStore::new();
        record_event(&store, &event(1, 10, "t1")).await.unwrap();
        assert_eq!(store.writes(), 3);
    }
}
