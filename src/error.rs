use thiserror::Error;

use crate::config::ConfigError;
use crate::storage::StoreError;
use crate::storage::operations::{ImportError, PopulateError};

/// 进程级错误，在 `main` 中记录后以非零状态退出
#[derive(Debug, Error)]
pub enum AppError {
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Import(#[from] ImportError),

    #[error(transparent)]
    Populate(#[from] PopulateError),

    #[error("HTTP 服务错误: {0}")]
    Server(#[from] std::io::Error),

    #[error("输出结果失败: {0}")]
    Output(#[from] serde_json::Error),
}
