//! Test data builders for creating test entities
//!
//! `ScanBuilder` produces a consistent scan/job pair so a store can be
//! seeded in any lifecycle state.

use chrono::Utc;
use scanner_domain::entities::{Scan, ScanJob, ScanStatus};
use uuid::Uuid;

/// Builder for a scan together with its job row
pub struct ScanBuilder {
    scan: Scan,
    job: ScanJob,
}

impl ScanBuilder {
    pub fn new() -> Self {
        let scan = Scan::new(Uuid::new_v4(), "https://example.com/page".to_string());
        let job = ScanJob::new(scan.id);
        Self { scan, job }
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.scan.url = url.to_string();
        self
    }

    pub fn with_domain_id(mut self, domain_id: Uuid) -> Self {
        self.scan.domain_id = domain_id;
        self
    }

    pub fn running(mut self, progress: f64) -> Self {
        let now = Utc::now();
        self.scan.status = ScanStatus::Running;
        self.scan.progress = progress;
        self.scan.started_at = Some(now);
        self.job.status = ScanStatus::Running;
        self.job.attempts = 1;
        self.job.started_at = Some(now);
        self
    }

    pub fn completed(self) -> Self {
        let mut builder = self.running(1.0);
        let now = Utc::now();
        builder.scan.status = ScanStatus::Completed;
        builder.scan.finished_at = Some(now);
        builder.job.status = ScanStatus::Completed;
        builder.job.finished_at = Some(now);
        builder
    }

    pub fn failed(self, progress: f64, reason: &str) -> Self {
        let mut builder = self.running(progress);
        let now = Utc::now();
        builder.scan.status = ScanStatus::Failed;
        builder.scan.finished_at = Some(now);
        builder.job.status = ScanStatus::Failed;
        builder.job.finished_at = Some(now);
        builder.job.last_error = Some(reason.to_string());
        builder
    }

    pub fn build(self) -> (Scan, ScanJob) {
        (self.scan, self.job)
    }
}

impl Default for ScanBuilder {
    fn default() -> Self {
        Self::new()
    }
}
