use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{ScanPage, Store};
use crate::storage::error::{StoreError, StoreResult};

#[derive(Debug, Clone)]
enum Value {
    Text(String, Option<Instant>),
    Set(BTreeSet<String>),
    Hash(HashMap<String, String>),
}

/// 内存存储，行为上模拟 Redis 的子集
///
/// 用于测试：统计调用次数、记录最大并发写入数，并支持注入故障。
/// SCAN 的游标是有序键列表中的位置，和 Redis 一样不保证快照一致。
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, Value>>,
    failing_keys: Mutex<HashSet<String>>,
    scan_failures: AtomicUsize,
    scan_overlap: AtomicBool,
    unreachable: AtomicBool,
    write_delay: Mutex<Option<Duration>>,
    read_delays: Mutex<HashMap<String, Duration>>,
    writes: AtomicU64,
    reads: AtomicU64,
    scan_calls: AtomicU64,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 对该键的读写都返回命令错误
    pub fn fail_key(&self, key: impl Into<String>) {
        self.failing_keys.lock().insert(key.into());
    }

    /// 接下来的 `n` 次 SCAN 调用失败
    pub fn fail_next_scans(&self, n: usize) {
        self.scan_failures.store(n, Ordering::SeqCst);
    }

    /// 每页额外重复上一页的最后一个键，模拟扫描期间的重复返回
    pub fn set_scan_overlap(&self, overlap: bool) {
        self.scan_overlap.store(overlap, Ordering::SeqCst);
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// 每次写入前等待，便于观察并发度
    pub fn set_write_delay(&self, delay: Duration) {
        *self.write_delay.lock() = Some(delay);
    }

    /// 读取该键的集合大小前等待，用于打乱并发读取的完成顺序
    pub fn set_read_delay(&self, key: impl Into<String>, delay: Duration) {
        self.read_delays.lock().insert(key.into(), delay);
    }

    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn scan_calls(&self) -> u64 {
        self.scan_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self, op: &'static str, key: &str) -> StoreResult<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(StoreError::Connection("memory store marked unreachable".into()));
        }
        if self.failing_keys.lock().contains(key) {
            return Err(StoreError::command(op, key, "injected failure"));
        }
        Ok(())
    }

    async fn write<T>(
        &self,
        op: &'static str,
        key: &str,
        apply: impl FnOnce(&mut BTreeMap<String, Value>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let delay = *self.write_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.writes.fetch_add(1, Ordering::SeqCst);
        let result = match self.check(op, key) {
            Ok(()) => {
                let mut entries = self.entries.lock();
                apply(&mut *entries)
            }
            Err(err) => Err(err),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn read<T>(
        &self,
        op: &'static str,
        key: &str,
        inspect: impl FnOnce(Option<&Value>) -> StoreResult<T>,
    ) -> StoreResult<T> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.check(op, key)?;

        let mut entries = self.entries.lock();
        let expired = matches!(
            entries.get(key),
            Some(Value::Text(_, Some(deadline))) if *deadline <= Instant::now()
        );
        if expired {
            entries.remove(key);
        }
        inspect(entries.get(key))
    }
}

fn wrong_type(op: &'static str, key: &str) -> StoreError {
    StoreError::command(
        op,
        key,
        "WRONGTYPE Operation against a key holding the wrong kind of value",
    )
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> StoreResult<Duration> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(StoreError::Connection("memory store marked unreachable".into()));
        }
        Ok(Duration::ZERO)
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.read("GET", key, |value| match value {
            None => Ok(None),
            Some(Value::Text(text, _)) => Ok(Some(text.clone())),
            Some(_) => Err(wrong_type("GET", key)),
        })
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        let deadline = ttl
            .filter(|t| !t.is_zero())
            .map(|t| Instant::now() + t);

        self.write("SET", key, |entries| {
            entries.insert(key.to_string(), Value::Text(value.to_string(), deadline));
            Ok(())
        })
        .await
    }

    async fn add_to_set(&self, key: &str, member: &str) -> StoreResult<()> {
        self.write("SADD", key, |entries| {
            match entries
                .entry(key.to_string())
                .or_insert_with(|| Value::Set(BTreeSet::new()))
            {
                Value::Set(members) => {
                    members.insert(member.to_string());
                    Ok(())
                }
                _ => Err(wrong_type("SADD", key)),
            }
        })
        .await
    }

    async fn set_cardinality(&self, key: &str) -> StoreResult<u64> {
        let delay = self.read_delays.lock().get(key).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.read("SCARD", key, |value| match value {
            None => Ok(0),
            Some(Value::Set(members)) => Ok(members.len() as u64),
            Some(_) => Err(wrong_type("SCARD", key)),
        })
    }

    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>> {
        self.read("SMEMBERS", key, |value| match value {
            None => Ok(Vec::new()),
            Some(Value::Set(members)) => Ok(members.iter().cloned().collect()),
            Some(_) => Err(wrong_type("SMEMBERS", key)),
        })
    }

    async fn hash_set(&self, key: &str, fields: &[(&str, &str)]) -> StoreResult<()> {
        self.write("HSET", key, |entries| {
            match entries
                .entry(key.to_string())
                .or_insert_with(|| Value::Hash(HashMap::new()))
            {
                Value::Hash(hash) => {
                    for (field, value) in fields {
                        hash.insert(field.to_string(), value.to_string());
                    }
                    Ok(())
                }
                _ => Err(wrong_type("HSET", key)),
            }
        })
        .await
    }

    async fn hash_get_all(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        self.read("HGETALL", key, |value| match value {
            None => Ok(HashMap::new()),
            Some(Value::Hash(hash)) => Ok(hash.clone()),
            Some(_) => Err(wrong_type("HGETALL", key)),
        })
    }

    async fn scan_page(&self, cursor: u64, pattern: &str, page_hint: usize) -> StoreResult<ScanPage> {
        self.scan_calls.fetch_add(1, Ordering::SeqCst);

        if self.unreachable.load(Ordering::SeqCst) {
            return Err(StoreError::Connection("memory store marked unreachable".into()));
        }
        let should_fail = self
            .scan_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(StoreError::command("SCAN", pattern, "injected failure"));
        }

        let entries = self.entries.lock();
        let start = usize::try_from(cursor).unwrap_or(usize::MAX);
        let page_hint = page_hint.max(1);

        let mut keys: Vec<String> = entries
            .keys()
            .skip(start)
            .take(page_hint)
            .filter(|key| glob_match(pattern, key))
            .cloned()
            .collect();

        if self.scan_overlap.load(Ordering::SeqCst) && start > 0 {
            if let Some(previous) = entries.keys().nth(start - 1) {
                if glob_match(pattern, previous) {
                    keys.insert(0, previous.clone());
                }
            }
        }

        let next = start.saturating_add(page_hint);
        let next_cursor = if next >= entries.len() { 0 } else { next as u64 };

        Ok(ScanPage { keys, next_cursor })
    }
}

/// Redis 风格的 glob 匹配：`*`、`?`、`[...]`（含范围和 `^` 取反）以及 `\` 转义
///
/// 只回溯到最近的 `*`，耗时与模式长度乘文本长度成正比。
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    // 最近一个 `*` 之后的模式位置，以及它目前吞掉的文本终点
    let mut star: Option<(usize, usize)> = None;

    while t < text.len() {
        if pattern.get(p) == Some(&'*') {
            star = Some((p + 1, t));
            p += 1;
            continue;
        }
        if let Some(next) = step(&pattern, p, text[t]) {
            p = next;
            t += 1;
            continue;
        }

        match star {
            Some((after_star, consumed)) => {
                p = after_star;
                t = consumed + 1;
                star = Some((after_star, consumed + 1));
            }
            None => return false,
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

/// 用 `pattern[p..]` 的第一个元素（非 `*`）匹配字符 `c`，返回之后的模式位置
fn step(pattern: &[char], p: usize, c: char) -> Option<usize> {
    match *pattern.get(p)? {
        '?' => Some(p + 1),
        '[' => match match_class(&pattern[p + 1..], c) {
            Some((true, rest)) => Some(pattern.len() - rest.len()),
            _ => None,
        },
        '\\' if p + 1 < pattern.len() => (pattern[p + 1] == c).then_some(p + 2),
        literal => (literal == c).then_some(p + 1),
    }
}

/// 解析字符类，返回是否匹配以及类之后剩余的模式；未闭合时返回 `None`
fn match_class(pattern: &[char], c: char) -> Option<(bool, &[char])> {
    let (negate, mut i) = match pattern.first() {
        Some('^') => (true, 1),
        _ => (false, 0),
    };
    let mut matched = false;

    while i < pattern.len() {
        match pattern[i] {
            ']' => return Some((matched != negate, &pattern[i + 1..])),
            '\\' if i + 1 < pattern.len() => {
                matched |= pattern[i + 1] == c;
                i += 2;
            }
            lo if i + 2 < pattern.len() && pattern[i + 1] == '-' && pattern[i + 2] != ']' => {
                let hi = pattern[i + 2];
                let (lo, hi) = if lo <= hi { (lo, hi) } else { (hi, lo) };
                matched |= lo <= c && c <= hi;
                i += 3;
            }
            other => {
                matched |= other == c;
                i += 1;
            }
        }
    }
    None
}
