use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinSet;

use super::membership::record_event;
use crate::storage::client::Store;
use crate::storage::error::StoreResult;
use crate::storage::keys::legacy_message_key;
use crate::storage::models::{ChatEvent, ChatId, UserId};
use crate::utils::format_timestamp;

/// 批量生成时的键布局
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyLayout {
    /// 旧版扁平键 `chat:<c>:user:<u>:type:<t>`，每个用户一次 SET
    Legacy,
    /// 集合结构，与 CSV 导入写入的数据相同
    Membership,
}

impl fmt::Display for KeyLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyLayout::Legacy => f.write_str("legacy"),
            KeyLayout::Membership => f.write_str("membership"),
        }
    }
}

impl FromStr for KeyLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "legacy" => Ok(KeyLayout::Legacy),
            "membership" => Ok(KeyLayout::Membership),
            other => Err(format!("未知的键布局: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PopulateOptions {
    pub count: usize,
    /// 同时进行的写入任务上限，至少为 1
    pub concurrency: usize,
    pub chat_id: ChatId,
    /// 第 i 个用户的ID为 `base_user_id + i`
    pub base_user_id: i64,
    pub message_type: String,
    /// 仅对旧版布局生效
    pub ttl: Option<Duration>,
    pub layout: KeyLayout,
}

impl Default for PopulateOptions {
    fn default() -> Self {
        Self {
            count: 0,
            concurrency: 64,
            chat_id: ChatId(5481),
            base_user_id: 121_000_000,
            message_type: "CHANNEL".to_string(),
            ttl: None,
            layout: KeyLayout::Legacy,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PopulateError {
    #[error("用户ID超出范围: base_user_id={base_user_id}, count={count}")]
    UserIdOverflow { base_user_id: i64, count: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteFailure {
    /// 任务崩溃时无法得知对应的用户
    pub user_id: Option<UserId>,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PopulateReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failures: Vec<WriteFailure>,
    pub elapsed_ms: u128,
}

/// 为 `count` 个合成用户各写入一条记录
///
/// 同时运行的任务数不超过 `concurrency`。单个写入失败只记录，不会取消其他写入；
/// 函数在全部任务结束后返回，失败集合汇总在报告中。
/// 最后一个用户ID超出 `i64` 时不发出任何写入，直接返回错误。
pub async fn populate_users(
    store: Arc<dyn Store>,
    options: &PopulateOptions,
) -> Result<PopulateReport, PopulateError> {
    let started = Instant::now();
    let concurrency = options.concurrency.max(1);
    let ids = user_ids(options)?;

    tracing::info!(
        count = options.count,
        concurrency,
        layout = %options.layout,
        chat_id = %options.chat_id,
        "Populating synthetic users"
    );

    let mut tasks = JoinSet::new();
    let mut succeeded = 0;
    let mut failures = Vec::new();

    for user_id in ids {
        // 池满时先等一个任务结束
        while tasks.len() >= concurrency {
            if let Some(joined) = tasks.join_next().await {
                collect(joined, &mut succeeded, &mut failures);
            }
        }

        let user_id = UserId(user_id);
        let store = store.clone();
        let options = options.clone();

        tasks.spawn(async move {
            let result = write_user(store.as_ref(), user_id, &options).await;
            (user_id, result)
        });
    }

    while let Some(joined) = tasks.join_next().await {
        collect(joined, &mut succeeded, &mut failures);
    }

    let report = PopulateReport {
        attempted: options.count,
        succeeded,
        failures,
        elapsed_ms: started.elapsed().as_millis(),
    };

    tracing::info!(
        attempted = report.attempted,
        succeeded = report.succeeded,
        failed = report.failures.len(),
        elapsed_ms = report.elapsed_ms,
        "All populate tasks have finished"
    );
    Ok(report)
}

fn user_ids(options: &PopulateOptions) -> Result<impl Iterator<Item = i64>, PopulateError> {
    let overflow = || PopulateError::UserIdOverflow {
        base_user_id: options.base_user_id,
        count: options.count,
    };

    let count = i64::try_from(options.count).map_err(|_| overflow())?;
    // 只检查最后一个ID，`count` 为 0 时没有ID需要检查
    if count > 0 {
        options.base_user_id.checked_add(count - 1).ok_or_else(overflow)?;
    }

    let base = options.base_user_id;
    Ok((0..count).map(move |offset| base + offset))
}

async fn write_user(store: &dyn Store, user_id: UserId, options: &PopulateOptions) -> StoreResult<()> {
    let now = format_timestamp(chrono::Utc::now());

    match options.layout {
        KeyLayout::Legacy => {
            let key = legacy_message_key(options.chat_id, user_id, &options.message_type);
            store.set(&key, &now, options.ttl).await
        }
        KeyLayout::Membership => {
            let event = ChatEvent {
                chat_id: options.chat_id,
                user_id,
                message_type: options.message_type.clone(),
                last_event: now,
            };
            record_event(store, &event).await
        }
    }
}

fn collect(
    joined: Result<(UserId, StoreResult<()>), tokio::task::JoinError>,
    succeeded: &mut usize,
    failures: &mut Vec<WriteFailure>,
) {
    match joined {
        Ok((user_id, Ok(()))) => {
            tracing::debug!(%user_id, "Value set for user");
            *succeeded += 1;
        }
        Ok((user_id, Err(err))) => {
            tracing::warn!(%user_id, error = %err, "Error setting value for user");
            failures.push(WriteFailure {
                user_id: Some(user_id),
                error: err.to_string(),
            });
        }
        Err(err) => {
            tracing::error!(error = %err, "Populate task panicked");
            failures.push(WriteFailure {
                user_id: None,
                error: err.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::client::MemoryStore;

    fn options(count: usize, concurrency: usize) -> PopulateOptions {
        PopulateOptions {
            count,
            concurrency,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn issues_exactly_n_writes() {
        for count in [0, 1, 17, 250] {
            let store = Arc::new(MemoryStore::new());
            let report = populate_users(store.clone(), &options(count, 8)).await.unwrap();

            assert_eq!(store.writes(), count as u64);
            assert_eq!(report.attempted, count);
            assert_eq!(report.succeeded, count);
            assert!(report.failures.is_empty());
        }
    }

    #[tokio::test]
    async fn concurrency_stays_bounded() {
        let store = Arc::new(MemoryStore::new());
        store.set_write_delay(Duration::from_millis(5));

        let report = populate_users(store.clone(), &options(40, 4)).await.unwrap();

        assert_eq!(report.succeeded, 40);
        assert!(store.max_in_flight() <= 4);
        assert!(store.max_in_flight() >= 2);
    }

    #[tokio::test]
    async fn legacy_keys_and_timestamp_format() {
        let store = Arc::new(MemoryStore::new());
        populate_users(store.clone(), &options(2, 2)).await.unwrap();

        let value = store
            .get("chat:5481:user:121000001:type:CHANNEL")
            .await
            .unwrap()
            .unwrap();
        // 2024-01-01 00:00:00.000000 +00:00
        assert_eq!(value.len(), 33);
        assert!(value.ends_with(" +00:00"));
    }

    #[tokio::test]
    async fn failures_are_aggregated_not_fatal() {
        let store = Arc::new(MemoryStore::new());
        store.fail_key("chat:5481:user:121000003:type:CHANNEL");
        store.fail_key("chat:5481:user:121000007:type:CHANNEL");

        let report = populate_users(store.clone(), &options(10, 3)).await.unwrap();

        assert_eq!(store.writes(), 10);
        assert_eq!(report.succeeded, 8);
        let mut failed: Vec<_> = report.failures.iter().filter_map(|f| f.user_id).collect();
        failed.sort();
        assert_eq!(failed, vec![UserId(121000003), UserId(121000007)]);
    }

    #[tokio::test]
    async fn membership_layout_feeds_chat_sets() {
        let store = Arc::new(MemoryStore::new());
        let opts = PopulateOptions {
            layout: KeyLayout::Membership,
            chat_id: ChatId(9),
            ..options(5, 2)
        };

        let report = populate_users(store.clone(), &opts).await.unwrap();

        assert_eq!(report.succeeded, 5);
        assert_eq!(store.set_cardinality("chat:9:users").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn user_id_overflow_rejected_before_any_write() {
        let store = Arc::new(MemoryStore::new());
        let opts = PopulateOptions {
            base_user_id: i64::MAX,
            ..options(2, 2)
        };

        let err = populate_users(store.clone(), &opts).await.unwrap_err();

        assert_eq!(
            err,
            PopulateError::UserIdOverflow {
                base_user_id: i64::MAX,
                count: 2
            }
        );
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn last_id_may_be_i64_max() {
        let store = Arc::new(MemoryStore::new());
        let opts = PopulateOptions {
            base_user_id: i64::MAX - 1,
            ..options(2, 2)
        };

        let report = populate_users(store.clone(), &opts).await.unwrap();
        assert_eq!(report.succeeded, 2);
        assert!(
            store
                .get(&format!("chat:5481:user:{}:type:CHANNEL", i64::MAX))
                .await
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn parses_layout_names() {
        assert_eq!("Legacy".parse::<KeyLayout>().unwrap(), KeyLayout::Legacy);
        assert_eq!("membership".parse::<KeyLayout>().unwrap(), KeyLayout::Membership);
        assert!("flat".parse::<KeyLayout>().is_err());
    }
}
