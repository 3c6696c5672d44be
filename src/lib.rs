use std::sync::Arc;

use metrics::Metrics;
use routes::health::AppInfo;

pub mod config;
pub mod error;
pub mod metrics;
pub mod middleware;
pub mod router;
pub mod routes;
pub mod server;
pub mod storage;
pub mod utils;

#[derive(Clone)]
pub struct AppState {
    pub app_info: Arc<AppInfo>,
    pub metrics: Arc<Metrics>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            app_info: Arc::new(AppInfo::from_build()),
            metrics: Arc::new(Metrics::new()),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
