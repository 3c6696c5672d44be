use std::str::FromStr;

use futures_util::{StreamExt, stream};
use serde::Serialize;

use super::scan::{ScanOptions, find_keys_by_pattern};
use crate::storage::client::Store;
use crate::storage::error::StoreResult;
use crate::storage::keys::{
    CHAT_USERS_PATTERN, USER_CHATS_PATTERN, chat_id_from_users_key, user_id_from_chats_key,
};
use crate::storage::models::{ChatId, UserId};

/// 同时进行的 SCARD 请求数
const CARDINALITY_READ_CONCURRENCY: usize = 16;

/// 单个键处理失败
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyFailure {
    pub key: String,
    pub error: String,
}

/// 统计查询结果：匹配项按扫描顺序排列，单键失败不影响其他键
#[derive(Debug, Clone, Serialize)]
pub struct QueryReport<T> {
    pub matches: Vec<T>,
    pub scanned: usize,
    pub failures: Vec<KeyFailure>,
}

/// 成员数不少于 `min_users` 的聊天
pub async fn chats_with_min_users(
    store: &dyn Store,
    min_users: u64,
    scan: ScanOptions,
) -> StoreResult<QueryReport<ChatId>> {
    let report = filter_by_cardinality(
        store,
        CHAT_USERS_PATTERN,
        chat_id_from_users_key,
        |count| count >= min_users,
        scan,
    )
    .await?;

    tracing::info!(
        min_users,
        matched = report.matches.len(),
        failed = report.failures.len(),
        "Chats with the minimum number of users found"
    );
    Ok(report)
}

/// 所在聊天数恰好等于 `chat_count` 的用户
pub async fn users_with_chat_count(
    store: &dyn Store,
    chat_count: u64,
    scan: ScanOptions,
) -> StoreResult<QueryReport<UserId>> {
    let report = filter_by_cardinality(
        store,
        USER_CHATS_PATTERN,
        user_id_from_chats_key,
        |count| count == chat_count,
        scan,
    )
    .await?;

    tracing::info!(
        chat_count,
        matched = report.matches.len(),
        failed = report.failures.len(),
        "Users with the target number of chats found"
    );
    Ok(report)
}

async fn filter_by_cardinality<T, K>(
    store: &dyn Store,
    pattern: &str,
    extract_id: fn(&str) -> Option<&str>,
    keep: K,
    scan: ScanOptions,
) -> StoreResult<QueryReport<T>>
where
    T: FromStr,
    K: Fn(u64) -> bool,
{
    let keys = find_keys_by_pattern(store, pattern, scan).await?;
    let scanned = keys.len();

    // buffered 保持输入顺序
    let counts: Vec<(String, StoreResult<u64>)> = stream::iter(keys)
        .map(|key| async move {
            let count = store.set_cardinality(&key).await;
            (key, count)
        })
        .buffered(CARDINALITY_READ_CONCURRENCY)
        .collect()
        .await;

    let mut matches = Vec::new();
    let mut failures = Vec::new();

    for (key, count) in counts {
        let count = match count {
            Ok(count) => count,
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "Failed to read set size, skipping");
                failures.push(KeyFailure {
                    key,
                    error: err.to_string(),
                });
                continue;
            }
        };

        if !keep(count) {
            continue;
        }

        match extract_id(&key).and_then(|id| id.parse::<T>().ok()) {
            Some(id) => matches.push(id),
            None => {
                tracing::warn!(key = %key, "Key does not carry a numeric id, skipping");
                failures.push(KeyFailure {
                    key,
                    error: "键中没有合法的数字ID".to_string(),
                });
            }
        }
    }

    Ok(QueryReport {
        matches,
        scanned,
        failures,
    })
}
