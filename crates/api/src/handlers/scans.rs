use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    response::{ScanAccepted, ScanDetailsResponse, ScanResponse},
    routes::AppState,
};

/// 扫描创建请求
#[derive(Debug, Deserialize)]
pub struct CreateScanRequest {
    pub url: String,
}

/// `wait=true` 时在请求内同步执行，`timeout` 单位为秒
#[derive(Debug, Default, Deserialize)]
pub struct CreateScanParams {
    #[serde(default)]
    pub wait: bool,
    pub timeout: Option<u64>,
}

/// 入队扫描；可选地在请求内执行到结束
pub async fn create_scan(
    State(state): State<AppState>,
    Query(params): Query<CreateScanParams>,
    Json(request): Json<CreateScanRequest>,
) -> ApiResult<Response> {
    if request.url.trim().is_empty() {
        return Err(ApiError::BadRequest("url 不能为空".to_string()));
    }

    let scan_id = state.scans.enqueue(&request.url).await?;

    if !params.wait {
        return Ok((StatusCode::ACCEPTED, Json(ScanAccepted { scan_id })).into_response());
    }

    let timeout = state.api.inline_timeout(params.timeout);
    info!(scan_id = %scan_id, "同步执行扫描，超时: {:?}", timeout);
    state.inline.run(scan_id, timeout).await?;

    let snapshot = state.scans.status(scan_id).await?;
    Ok((StatusCode::OK, Json(ScanResponse::from(snapshot))).into_response())
}

pub async fn get_scan(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ScanResponse>> {
    let snapshot = state.scans.status(id).await?;
    Ok(Json(snapshot.into()))
}

/// 扫描详情，包含尝试次数与失败原因
pub async fn get_scan_details(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ScanDetailsResponse>> {
    let details = state.scans.scan(id).await?;
    Ok(Json(details.into()))
}
