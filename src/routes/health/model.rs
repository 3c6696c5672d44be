use serde::Serialize;

/// 构建信息，编译时从环境变量 `BUILD_TIME`、`GIT_TAG`、`GIT_HASH` 读取
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppInfo {
    pub name: String,
    pub build_version: String,
    pub build_time: String,
    pub git_tag: String,
    pub git_hash: String,
}

impl AppInfo {
    pub fn from_build() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            build_version: env!("CARGO_PKG_VERSION").to_string(),
            build_time: option_env!("BUILD_TIME").unwrap_or("unknown").to_string(),
            git_tag: option_env!("GIT_TAG").unwrap_or("no git tag").to_string(),
            git_hash: option_env!("GIT_HASH").unwrap_or("no git hash").to_string(),
        }
    }
}
