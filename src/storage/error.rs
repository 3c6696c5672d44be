use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("无法连接到存储: {0}")]
    Connection(String),

    #[error("{op} {key} 执行失败: {message}")]
    Command {
        op: &'static str,
        key: String,
        message: String,
    },

    #[error("扫描在游标 {cursor} 处中止（已读取 {pages} 页）: {source}")]
    ScanPage {
        cursor: u64,
        pages: usize,
        #[source]
        source: Box<StoreError>,
    },
}

impl StoreError {
    pub fn command(op: &'static str, key: impl Into<String>, message: impl ToString) -> Self {
        StoreError::Command {
            op,
            key: key.into(),
            message: message.to_string(),
        }
    }

    /// 按错误类型区分连接故障与命令故障
    pub fn from_redis(op: &'static str, key: impl Into<String>, err: redis::RedisError) -> Self {
        if err.is_io_error() || err.is_connection_refusal() || err.is_connection_dropped() || err.is_timeout() {
            StoreError::Connection(err.to_string())
        } else {
            StoreError::command(op, key, err)
        }
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, StoreError::Connection(_))
    }
}
