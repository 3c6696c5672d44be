use std::time::Duration;

use axum::{Router, routing::get};
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::{AppState, middleware::track_requests, routes};

/// 单个请求（含读取请求体和写出响应）的处理时限，超时返回 408
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

// 创建主路由：只有健康检查和指标两个接口
pub fn create_router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/healthz", get(routes::health::healthz))
        .route("/metrics", get(routes::metrics::metrics));

    with_layers(routes, state, REQUEST_TIMEOUT)
}

// 超时放在最内层，超时的请求也会被计入指标
fn with_layers(routes: Router<AppState>, state: AppState, timeout: Duration) -> Router {
    routes
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    track_requests,
                ))
                .layer(TimeoutLayer::new(timeout)),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    use super::*;

    async fn get_path(router: Router, path: &str) -> (StatusCode, String) {
        let response = router
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn healthz_reports_all_build_fields() {
        let state = AppState::new();

        for _ in 0..3 {
            let (status, body) = get_path(create_router(state.clone()), "/healthz").await;
            assert_eq!(status, StatusCode::OK);

            let json: serde_json::Value = serde_json::from_str(&body).unwrap();
            for field in ["name", "build_version", "build_time", "git_tag", "git_hash"] {
                assert!(json[field].is_string(), "missing {field}");
            }
            assert_eq!(json["name"], "chat-stats");
        }
    }

    #[tokio::test]
    async fn metrics_counts_served_requests() {
        let state = AppState::new();
        get_path(create_router(state.clone()), "/healthz").await;

        let (status, body) = get_path(create_router(state.clone()), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("http_requests_total{path=\"/healthz\",status=\"200\"} 1"));
        assert!(body.contains("process_uptime_seconds"));
    }

    #[tokio::test]
    async fn no_other_routes() {
        let state = AppState::new();
        let (status, _) = get_path(create_router(state), "/users").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_requests_time_out() {
        let state = AppState::new();
        let slow = Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(REQUEST_TIMEOUT * 2).await;
                "done"
            }),
        );

        let (status, _) = get_path(with_layers(slow, state.clone(), REQUEST_TIMEOUT), "/slow").await;
        assert_eq!(status, StatusCode::REQUEST_TIMEOUT);

        let (_, body) = get_path(create_router(state), "/metrics").await;
        assert!(body.contains("http_requests_total{path=\"/slow\",status=\"408\"} 1"));
    }
}
