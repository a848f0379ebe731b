//! # Scanner API
//!
//! 扫描服务的HTTP接口，基于Axum构建。
//!
//! ## API 端点
//!
//! - `GET /healthz` - 健康检查
//! - `POST /scan` - 入队扫描，`?wait=true&timeout=<秒>` 时在请求内同步执行
//! - `GET /scans/{id}` - 查询扫描状态与进度
//! - `GET /scans/{id}/details` - 查询扫描详情（尝试次数、失败原因）
//!
//! ## 状态码
//!
//! - `202` 已入队，`200` 同步执行完成
//! - `400` 目标URL无效，`404` 扫描不存在
//! - `409` 扫描已在执行或已结束，`504` 同步执行超时

pub mod error;
pub mod handlers;
pub mod response;
pub mod routes;

pub use error::{ApiError, ApiResult};
pub use routes::{create_routes, AppState};
