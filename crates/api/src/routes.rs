use axum::{
    routing::{get, post},
    Router,
};
use scanner_core::ApiConfig;
use scanner_domain::services::ScanService;
use scanner_worker::InlineExecutor;
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;

use crate::handlers::{
    health::health_check,
    scans::{create_scan, get_scan, get_scan_details},
};

/// API应用状态
#[derive(Clone)]
pub struct AppState {
    pub scans: Arc<ScanService>,
    pub inline: Arc<InlineExecutor>,
    pub api: Arc<ApiConfig>,
}

/// 创建API路由
pub fn create_routes(state: AppState) -> Router {
    // 请求级超时必须大于内联执行的最大超时，否则同步扫描会被提前截断
    let request_timeout = Duration::from_secs(
        state
            .api
            .request_timeout_seconds
            .max(state.api.inline_max_timeout_seconds + 1),
    );

    Router::new()
        .route("/healthz", get(health_check))
        .route("/scan", post(create_scan))
        .route("/scans/{id}", get(get_scan))
        .route("/scans/{id}/details", get(get_scan_details))
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}
