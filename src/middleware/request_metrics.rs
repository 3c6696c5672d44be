use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::Request,
    middleware::Next,
    response::Response,
};
use tracing::{error, warn};

use crate::AppState;

/// 未匹配路由统一记为一个标签，避免任意路径撑大指标
const UNMATCHED_PATH: &str = "unmatched";

pub async fn track_requests(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| UNMATCHED_PATH.to_string());
    let method = req.method().clone();

    let response = next.run(req).await;
    let status = response.status();

    state.metrics.record_request(&path, status.as_u16());

    if status.is_server_error() {
        error!(%method, path = %path, status = %status, "Server error occurred");
    } else if status.is_client_error() {
        warn!(%method, path = %path, status = %status, "Client error");
    }

    response
}
