//! Structured logging utilities
//!
//! Job lifecycle events, each tagged with a stable `event` field.

use tracing::{error, info, warn};
use uuid::Uuid;

pub struct StructuredLogger;

impl StructuredLogger {
    pub fn log_scan_enqueued(scan_id: Uuid, job_id: Uuid, url: &str) {
        info!(
            event = "scan_enqueued",
            scan.id = %scan_id,
            job.id = %job_id,
            scan.url = url,
            "扫描已入队"
        );
    }

    pub fn log_job_claimed(job_id: Uuid, scan_id: Uuid, attempts: i32) {
        info!(
            event = "job_claimed",
            job.id = %job_id,
            scan.id = %scan_id,
            job.attempts = attempts,
            "扫描任务已认领"
        );
    }

    pub fn log_job_completed(job_id: Uuid, scan_id: Uuid) {
        info!(
            event = "job_completed",
            job.id = %job_id,
            scan.id = %scan_id,
            "扫描任务完成"
        );
    }

    pub fn log_job_failed(job_id: Uuid, scan_id: Uuid, reason: &str) {
        warn!(
            event = "job_failed",
            job.id = %job_id,
            scan.id = %scan_id,
            job.error = reason,
            "扫描任务失败"
        );
    }

    pub fn log_execution_timeout(job_id: Uuid, scan_id: Uuid, timeout_ms: u64) {
        warn!(
            event = "job_timeout",
            job.id = %job_id,
            scan.id = %scan_id,
            job.timeout_ms = timeout_ms,
            "扫描任务执行超时"
        );
    }

    pub fn log_finalize_error(job_id: Uuid, scan_id: Uuid, error_message: &str) {
        error!(
            event = "job_finalize_error",
            job.id = %job_id,
            scan.id = %scan_id,
            error = error_message,
            "写入扫描任务终态失败"
        );
    }
}
