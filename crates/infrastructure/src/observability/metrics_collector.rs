//! Metrics collector for scan execution
//!
//! Handles are registered against whatever global recorder is installed;
//! without one every call is a no-op.

use metrics::{counter, histogram, Counter, Histogram};
use std::time::Duration;

/// Execution path a job went through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPath {
    Background,
    Inline,
}

impl ExecutionPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionPath::Background => "background",
            ExecutionPath::Inline => "inline",
        }
    }
}

#[derive(Clone)]
pub struct ScanMetrics {
    scans_enqueued_total: Counter,
    jobs_claimed_total: Counter,
    claim_errors_total: Counter,
    finalize_errors_total: Counter,
}

impl ScanMetrics {
    pub fn new() -> Self {
        Self {
            scans_enqueued_total: counter!("scanner_scans_enqueued_total"),
            jobs_claimed_total: counter!("scanner_jobs_claimed_total"),
            claim_errors_total: counter!("scanner_claim_errors_total"),
            finalize_errors_total: counter!("scanner_finalize_errors_total"),
        }
    }

    pub fn record_enqueued(&self) {
        self.scans_enqueued_total.increment(1);
    }

    pub fn record_claimed(&self) {
        self.jobs_claimed_total.increment(1);
    }

    pub fn record_claim_error(&self) {
        self.claim_errors_total.increment(1);
    }

    pub fn record_finalize_error(&self) {
        self.finalize_errors_total.increment(1);
    }

    /// Record a finished execution, labelled by path and outcome
    pub fn record_execution(&self, path: ExecutionPath, outcome: &'static str, elapsed: Duration) {
        counter!(
            "scanner_job_executions_total",
            "path" => path.as_str(),
            "outcome" => outcome
        )
        .increment(1);

        let duration: Histogram = histogram!(
            "scanner_job_execution_duration_seconds",
            "path" => path.as_str()
        );
        duration.record(elapsed.as_secs_f64());
    }
}

impl Default for ScanMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_without_recorder_are_noops() {
        let metrics = ScanMetrics::new();
        metrics.record_enqueued();
        metrics.record_claimed();
        metrics.record_claim_error();
        metrics.record_finalize_error();
        metrics.record_execution(ExecutionPath::Inline, "timeout", Duration::from_millis(100));
    }
}
