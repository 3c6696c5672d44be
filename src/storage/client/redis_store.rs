use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, IntoConnectionInfo};

use super::{ScanPage, Store};
use crate::config::RedisOptions;
use crate::storage::error::{StoreError, StoreResult};

/// 建立连接的超时时间
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// 基于 Redis 的存储实现
///
/// 内部持有一个多路复用的连接管理器，克隆开销很小，
/// 并发任务共享同一条连接，连接数不随任务数增长。
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    addr: String,
}

impl RedisStore {
    /// 连接 Redis 并做一次 PING，失败视为启动期致命错误
    pub async fn connect(options: &RedisOptions) -> StoreResult<Self> {
        tracing::info!(addr = %options.addr, db = options.db, "Creating Redis client");

        let mut info = format!("redis://{}", options.addr)
            .into_connection_info()
            .map_err(|e| StoreError::Connection(format!("无效的地址 {}: {}", options.addr, e)))?;
        info.redis.db = options.db;
        info.redis.password = options.password.clone();

        let client = redis::Client::open(info)
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        let conn = tokio::time::timeout(CONNECT_TIMEOUT, client.get_connection_manager())
            .await
            .map_err(|_| StoreError::Connection(format!("连接 {} 超时", options.addr)))?
            .map_err(|e| StoreError::from_redis("CONNECT", &options.addr, e))?;

        let store = RedisStore {
            conn,
            addr: options.addr.clone(),
        };

        let latency = store.ping().await?;
        tracing::info!(addr = %store.addr, ?latency, "Connected to Redis successfully");

        Ok(store)
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// 释放连接
    pub fn close(self) {
        tracing::info!(addr = %self.addr, "Closing Redis connection");
        drop(self.conn);
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn ping(&self) -> StoreResult<Duration> {
        let mut conn = self.conn.clone();
        let started = Instant::now();

        let reply: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::from_redis("PING", &self.addr, e))?;

        let elapsed = started.elapsed();
        tracing::debug!(%reply, ?elapsed, "Redis ping response");
        Ok(elapsed)
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn.clone();

        let value: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| StoreError::from_redis("GET", key, e))?;

        if value.is_none() {
            tracing::debug!(key, "Key not found");
        }
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        let mut conn = self.conn.clone();

        // 零 TTL 等同于不过期
        let result: redis::RedisResult<()> = match ttl.filter(|t| !t.is_zero()) {
            Some(ttl) => {
                let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
                conn.pset_ex(key, value, millis).await
            }
            None => conn.set(key, value).await,
        };

        result.map_err(|e| StoreError::from_redis("SET", key, e))
    }

    async fn add_to_set(&self, key: &str, member: &str) -> StoreResult<()> {
        let mut conn = self.conn.clone();

        let _: () = conn
            .sadd(key, member)
            .await
            .map_err(|e| StoreError::from_redis("SADD", key, e))?;
        Ok(())
    }

    async fn set_cardinality(&self, key: &str) -> StoreResult<u64> {
        let mut conn = self.conn.clone();

        conn.scard(key)
            .await
            .map_err(|e| StoreError::from_redis("SCARD", key, e))
    }

    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>> {
        let mut conn = self.conn.clone();

        conn.smembers(key)
            .await
            .map_err(|e| StoreError::from_redis("SMEMBERS", key, e))
    }

    async fn hash_set(&self, key: &str, fields: &[(&str, &str)]) -> StoreResult<()> {
        let mut conn = self.conn.clone();

        let _: () = conn
            .hset_multiple(key, fields)
            .await
            .map_err(|e| StoreError::from_redis("HSET", key, e))?;
        Ok(())
    }

    async fn hash_get_all(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        let mut conn = self.conn.clone();

        conn.hgetall(key)
            .await
            .map_err(|e| StoreError::from_redis("HGETALL", key, e))
    }

    async fn scan_page(&self, cursor: u64, pattern: &str, page_hint: usize) -> StoreResult<ScanPage> {
        let mut conn = self.conn.clone();

        let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(page_hint)
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::from_redis("SCAN", pattern, e))?;

        Ok(ScanPage { keys, next_cursor })
    }
}
