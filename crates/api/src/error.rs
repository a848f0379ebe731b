use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use scanner_core::ScannerError;
use serde_json::json;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("扫描服务错误: {0}")]
    Scanner(#[from] ScannerError),

    #[error("请求参数错误: {0}")]
    BadRequest(String),

    #[error("未找到资源")]
    NotFound,
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::Scanner(err @ ScannerError::InvalidTarget(msg)) => (
                StatusCode::BAD_REQUEST,
                "INVALID_TARGET",
                format!("{}: {}", err.user_message(), msg),
            ),
            ApiError::Scanner(err @ ScannerError::ScanNotFound { id }) => (
                StatusCode::NOT_FOUND,
                "SCAN_NOT_FOUND",
                format!("{} (ID: {})", err.user_message(), id),
            ),
            ApiError::Scanner(err @ ScannerError::NotClaimable { .. }) => (
                StatusCode::CONFLICT,
                "SCAN_NOT_CLAIMABLE",
                err.user_message().to_string(),
            ),
            ApiError::Scanner(err @ ScannerError::ExecutionTimeout { .. }) => (
                StatusCode::GATEWAY_TIMEOUT,
                "SCAN_TIMEOUT",
                err.to_string(),
            ),
            ApiError::Scanner(err @ (ScannerError::WorkUnit(_) | ScannerError::Cancelled)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "SCAN_FAILED",
                err.to_string(),
            ),
            ApiError::Scanner(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                err.user_message().to_string(),
            ),
            ApiError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                format!("请求参数错误: {msg}"),
            ),
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                "请求的资源不存在".to_string(),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        if status.is_server_error() {
            error!("请求处理失败: {}", self);
        }

        let body = Json(json!({
            "success": false,
            "error": {
                "code": code,
                "status": status.as_u16(),
                "message": message,
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (ScannerError::invalid_target("bad"), StatusCode::BAD_REQUEST),
            (ScannerError::scan_not_found(Uuid::nil()), StatusCode::NOT_FOUND),
            (ScannerError::not_claimable(Uuid::nil()), StatusCode::CONFLICT),
            (
                ScannerError::ExecutionTimeout { timeout_ms: 100 },
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (ScannerError::work_unit("boom"), StatusCode::INTERNAL_SERVER_ERROR),
            (
                ScannerError::database_error("down"),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }
}
