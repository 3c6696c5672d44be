use std::env;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

/// 默认 HTTP 端口
pub const DEFAULT_SERVER_PORT: u16 = 8080;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("缺少环境变量 {0}")]
    Missing(&'static str),

    #[error("环境变量 {key} 的值无效: {value:?}")]
    Invalid { key: &'static str, value: String },
}

/// Redis 连接参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisOptions {
    pub addr: String,
    pub password: Option<String>,
    pub db: i64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub redis: RedisOptions,
    /// 监听地址，必须是 IP 字面量
    pub server_host: IpAddr,
    pub server_port: u16,
    pub shutdown_timeout_secs: u64,
    pub ping_interval_secs: u64,
    pub populate_concurrency: usize,
    pub scan_page_hint: usize,
    pub scan_page_retries: u32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 从任意键值来源构建配置，空字符串视为未设置
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let addr = get("REDIS_ADDR").ok_or(ConfigError::Missing("REDIS_ADDR"))?;

        let config = Config {
            redis: RedisOptions {
                addr,
                password: get("REDIS_PASSWORD"),
                db: parse_or(get("REDIS_DB"), "REDIS_DB", 0)?,
            },
            server_host: parse_or(
                get("SERVER_HOST"),
                "SERVER_HOST",
                IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            )?,
            server_port: parse_or(get("SERVER_PORT"), "SERVER_PORT", DEFAULT_SERVER_PORT)?,
            shutdown_timeout_secs: parse_or(get("SHUTDOWN_TIMEOUT_SECS"), "SHUTDOWN_TIMEOUT_SECS", 30)?,
            ping_interval_secs: parse_or(
                get("REDIS_PING_INTERVAL_SECS"),
                "REDIS_PING_INTERVAL_SECS",
                30,
            )?,
            populate_concurrency: parse_or(get("POPULATE_CONCURRENCY"), "POPULATE_CONCURRENCY", 64)?,
            scan_page_hint: parse_or(get("SCAN_PAGE_HINT"), "SCAN_PAGE_HINT", 100)?,
            scan_page_retries: parse_or(get("SCAN_PAGE_RETRIES"), "SCAN_PAGE_RETRIES", 0)?,
        };

        if config.populate_concurrency == 0 {
            return Err(ConfigError::Invalid {
                key: "POPULATE_CONCURRENCY",
                value: "0".into(),
            });
        }

        if config.scan_page_hint == 0 {
            return Err(ConfigError::Invalid {
                key: "SCAN_PAGE_HINT",
                value: "0".into(),
            });
        }

        tracing::info!(
            redis_addr = %config.redis.addr,
            redis_db = config.redis.db,
            server_host = %config.server_host,
            server_port = config.server_port,
            "Configuration loaded"
        );

        Ok(config)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }
}

fn parse_or<T: FromStr>(raw: Option<String>, key: &'static str, default: T) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => {
            tracing::debug!("{key} not set, using default");
            Ok(default)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_applied_when_unset() {
        let config = Config::from_lookup(lookup(&[("REDIS_ADDR", "localhost:6379")])).unwrap();

        assert_eq!(config.server_port, 8080);
        assert_eq!(config.server_host, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(config.redis.db, 0);
        assert_eq!(config.redis.password, None);
        assert_eq!(config.shutdown_timeout(), Duration::from_secs(30));
        assert_eq!(config.populate_concurrency, 64);
        assert_eq!(config.scan_page_retries, 0);
    }

    #[test]
    fn missing_redis_addr_is_fatal() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("REDIS_ADDR")));
    }

    #[test]
    fn malformed_db_index_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("REDIS_ADDR", "localhost:6379"),
            ("REDIS_DB", "zero"),
        ]))
        .unwrap_err();

        assert!(matches!(err, ConfigError::Invalid { key: "REDIS_DB", .. }));
    }

    #[test]
    fn empty_password_means_no_auth() {
        let config = Config::from_lookup(lookup(&[
            ("REDIS_ADDR", "redis:6379"),
            ("REDIS_PASSWORD", ""),
            ("REDIS_DB", "3"),
            ("SERVER_PORT", "9090"),
        ]))
        .unwrap();

        assert_eq!(config.redis.password, None);
        assert_eq!(config.redis.db, 3);
        assert_eq!(config.server_port, 9090);
    }

    #[test]
    fn zero_concurrency_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("REDIS_ADDR", "localhost:6379"),
            ("POPULATE_CONCURRENCY", "0"),
        ]))
        .unwrap_err();

        assert!(matches!(err, ConfigError::Invalid { key: "POPULATE_CONCURRENCY", .. }));
    }

    #[test]
    fn host_names_are_not_bind_addresses() {
        let err = Config::from_lookup(lookup(&[
            ("REDIS_ADDR", "localhost:6379"),
            ("SERVER_HOST", "localhost"),
        ]))
        .unwrap_err();

        assert!(matches!(err, ConfigError::Invalid { key: "SERVER_HOST", .. }));
    }

    #[test]
    fn ip_literal_host_accepted() {
        let config = Config::from_lookup(lookup(&[
            ("REDIS_ADDR", "localhost:6379"),
            ("SERVER_HOST", "::1"),
        ]))
        .unwrap();

        assert_eq!(config.server_host, "::1".parse::<IpAddr>().unwrap());
    }
}
