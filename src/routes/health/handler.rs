use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};

use crate::AppState;

// 健康检查，只返回构建信息，不依赖存储状态
pub async fn healthz(State(state): State<AppState>) -> impl IntoResponse {
    tracing::debug!(name = %state.app_info.name, "Sending application info response");

    (StatusCode::OK, Json(state.app_info.as_ref().clone()))
}
