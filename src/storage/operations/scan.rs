use std::collections::HashSet;
use std::time::Duration;

use crate::storage::client::{ScanPage, Store};
use crate::storage::error::{StoreError, StoreResult};

#[derive(Debug, Clone, Copy)]
pub struct ScanOptions {
    /// 传给 SCAN 的 COUNT 提示
    pub page_hint: usize,
    /// 单页失败后用同一游标重试的次数
    pub page_retries: u32,
    pub retry_delay: Duration,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            page_hint: 100,
            page_retries: 0,
            retry_delay: Duration::from_millis(50),
        }
    }
}

/// 按 glob 模式收集全部匹配的键
///
/// 循环调用 `scan_page` 直到游标归零。结果是弱一致的：扫描期间新增或删除的键
/// 可能出现也可能不出现。同一个键在多页中重复出现时只保留第一次。
/// 某一页在重试后仍失败则整个扫描中止，不返回部分结果。
pub async fn find_keys_by_pattern(
    store: &dyn Store,
    pattern: &str,
    options: ScanOptions,
) -> StoreResult<Vec<String>> {
    tracing::info!(pattern, "Starting key search by pattern");

    let mut cursor = 0u64;
    let mut pages = 0usize;
    let mut seen = HashSet::new();
    let mut keys = Vec::new();

    loop {
        let page = fetch_page(store, cursor, pattern, &options)
            .await
            .map_err(|source| {
                tracing::error!(pattern, cursor, pages, error = %source, "Failed to scan keys");
                StoreError::ScanPage {
                    cursor,
                    pages,
                    source: Box::new(source),
                }
            })?;
        pages += 1;

        tracing::debug!(
            pattern,
            batch = page.keys.len(),
            next_cursor = page.next_cursor,
            "Batch of keys fetched"
        );

        for key in page.keys {
            if seen.insert(key.clone()) {
                keys.push(key);
            }
        }

        if page.next_cursor == 0 {
            break;
        }
        cursor = page.next_cursor;
    }

    tracing::info!(pattern, pages, total_keys = keys.len(), "Key search completed");
    Ok(keys)
}

async fn fetch_page(
    store: &dyn Store,
    cursor: u64,
    pattern: &str,
    options: &ScanOptions,
) -> StoreResult<ScanPage> {
    let mut attempt = 0;
    loop {
        match store.scan_page(cursor, pattern, options.page_hint).await {
            Ok(page) => return Ok(page),
            Err(err) if attempt < options.page_retries => {
                attempt += 1;
                tracing::warn!(pattern, cursor, attempt, error = %err, "Scan page failed, retrying");
                tokio::time::sleep(options.retry_delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::client::MemoryStore;

    fn options(page_hint: usize) -> ScanOptions {
        ScanOptions {
            page_hint,
            page_retries: 0,
            retry_delay: Duration::ZERO,
        }
    }

    async fn seeded(matching: usize, other: usize) -> MemoryStore {
        let store = MemoryStore::new();
        for i in 0..matching {
            store.add_to_set(&format!("chat:{i}:users"), "1").await.unwrap();
        }
        for i in 0..other {
            store.set(&format!("noise:{i}"), "x", None).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn returns_all_matches_for_any_page_size() {
        let store = seeded(23, 17).await;

        for page_hint in [1, 2, 7, 40, 1000] {
            let mut keys = find_keys_by_pattern(&store, "chat:*:users", options(page_hint))
                .await
                .unwrap();
            keys.sort();

            let mut expected: Vec<String> = (0..23).map(|i| format!("chat:{i}:users")).collect();
            expected.sort();
            assert_eq!(keys, expected, "page_hint = {page_hint}");
        }
    }

    #[tokio::test]
    async fn no_matches_is_empty_not_error() {
        let store = seeded(0, 5).await;
        let keys = find_keys_by_pattern(&store, "chat:*:users", options(2))
            .await
            .unwrap();
        assert!(keys.is_empty());
    }

    #[tokio::test]
    async fn empty_store_scans_once() {
        let store = MemoryStore::new();
        let keys = find_keys_by_pattern(&store, "*", options(10)).await.unwrap();

        assert!(keys.is_empty());
        assert_eq!(store.scan_calls(), 1);
    }

    #[tokio::test]
    async fn duplicate_keys_reported_once() {
        let store = seeded(10, 0).await;
        store.set_scan_overlap(true);

        let keys = find_keys_by_pattern(&store, "chat:*:users", options(3))
            .await
            .unwrap();
        assert_eq!(keys.len(), 10);
    }

    #[tokio::test]
    async fn page_error_aborts_without_retries() {
        let store = seeded(10, 0).await;
        store.fail_next_scans(1);

        let err = find_keys_by_pattern(&store, "chat:*:users", options(3))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ScanPage { cursor: 0, pages: 0, .. }));
    }

    #[tokio::test]
    async fn transient_page_error_is_retried() {
        let store = seeded(10, 0).await;
        store.fail_next_scans(2);

        let opts = ScanOptions {
            page_retries: 2,
            ..options(3)
        };
        let keys = find_keys_by_pattern(&store, "chat:*:users", opts).await.unwrap();
        assert_eq!(keys.len(), 10);
    }
}
