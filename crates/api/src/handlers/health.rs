use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use tracing::warn;

use crate::routes::AppState;

/// 存活与存储连通性检查；数据库不可用时返回 503
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let (status, database) = match state.scans.health_check().await {
        Ok(()) => (StatusCode::OK, json!({ "status": "ok" })),
        Err(e) => {
            warn!("健康检查失败，作业存储不可用: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "status": "unavailable", "error": e.to_string() }),
            )
        }
    };

    let body = json!({
        "status": if status.is_success() { "ok" } else { "degraded" },
        "database": database,
        "service": "scanner",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status, Json(body))
}
