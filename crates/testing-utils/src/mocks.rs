//! Mock implementations for the repository traits
//!
//! `InMemoryScanStore` implements all three repositories over a single
//! lock, so every transition is atomic just like the SQL stores.

use async_trait::async_trait;
use chrono::Utc;
use scanner_core::{ScannerError, ScannerResult};
use scanner_domain::entities::{ClaimedJob, Scan, ScanJob, ScanSnapshot, ScanStatus};
use scanner_domain::repositories::{DomainRepository, JobRepository, ScanRepository};
use scanner_domain::value_objects::clamp_progress;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Debug, Default)]
struct StoreState {
    domains: HashMap<String, Uuid>,
    scans: HashMap<Uuid, Scan>,
    jobs: HashMap<Uuid, ScanJob>,
    /// 任务ID按入队顺序排列
    queue: Vec<Uuid>,
    progress_history: HashMap<Uuid, Vec<f64>>,
    failing_claims: usize,
    fail_finalize: bool,
    fail_mark_running: bool,
    unhealthy: bool,
    claim_calls: usize,
}

/// In-memory job store for unit and integration tests
#[derive(Debug, Clone, Default)]
pub struct InMemoryScanStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryScanStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 接下来 `count` 次 claim_next 返回数据库错误
    pub fn fail_next_claims(&self, count: usize) {
        self.state().failing_claims = count;
    }

    /// 让 mark_completed / mark_failed 返回数据库错误
    pub fn set_fail_finalize(&self, fail: bool) {
        self.state().fail_finalize = fail;
    }

    /// 让 mark_running 返回数据库错误
    pub fn set_fail_mark_running(&self, fail: bool) {
        self.state().fail_mark_running = fail;
    }

    /// 让健康检查返回数据库错误
    pub fn set_unhealthy(&self, unhealthy: bool) {
        self.state().unhealthy = unhealthy;
    }

    /// 直接写入一对扫描与任务，用于构造任意状态
    pub fn seed(&self, scan: Scan, job: ScanJob) {
        let mut state = self.state();
        state.queue.push(job.id);
        state.jobs.insert(job.id, job);
        state.scans.insert(scan.id, scan);
    }

    pub fn claim_calls(&self) -> usize {
        self.state().claim_calls
    }

    pub fn scan(&self, scan_id: Uuid) -> Option<Scan> {
        self.state().scans.get(&scan_id).cloned()
    }

    pub fn job_for_scan(&self, scan_id: Uuid) -> Option<ScanJob> {
        self.state()
            .jobs
            .values()
            .find(|job| job.scan_id == scan_id)
            .cloned()
    }

    /// 被接受的进度值，按写入顺序
    pub fn progress_history(&self, scan_id: Uuid) -> Vec<f64> {
        self.state()
            .progress_history
            .get(&scan_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn count_with_status(&self, status: ScanStatus) -> usize {
        self.state()
            .scans
            .values()
            .filter(|scan| scan.status == status)
            .count()
    }

    pub fn scan_count(&self) -> usize {
        self.state().scans.len()
    }

    fn claim_locked(state: &mut StoreState, job_id: Uuid) -> ScannerResult<ClaimedJob> {
        let now = Utc::now();
        let job = state
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| ScannerError::job_not_found(job_id))?;
        let claimed = job.claim(now)?;

        if let Some(scan) = state.scans.get_mut(&claimed.scan_id) {
            scan.status = ScanStatus::Running;
            scan.started_at.get_or_insert(now);
        }
        Ok(claimed)
    }
}

#[async_trait]
impl DomainRepository for InMemoryScanStore {
    async fn get_or_create(&self, registrable_domain: &str) -> ScannerResult<Uuid> {
        let key = registrable_domain.trim().to_ascii_lowercase();
        let mut state = self.state();
        Ok(*state.domains.entry(key).or_insert_with(Uuid::new_v4))
    }
}

#[async_trait]
impl ScanRepository for InMemoryScanStore {
    async fn health_check(&self) -> ScannerResult<()> {
        if self.state().unhealthy {
            return Err(ScannerError::database_error("模拟的数据库不可用"));
        }
        Ok(())
    }

    async fn create(&self, domain_id: Uuid, url: &str) -> ScannerResult<Scan> {
        let scan = Scan::new(domain_id, url.to_string());
        let job = ScanJob::new(scan.id);

        let mut state = self.state();
        state.queue.push(job.id);
        state.jobs.insert(job.id, job);
        state.scans.insert(scan.id, scan.clone());
        Ok(scan)
    }

    async fn status(&self, scan_id: Uuid) -> ScannerResult<Option<ScanSnapshot>> {
        Ok(self.state().scans.get(&scan_id).map(Scan::snapshot))
    }

    async fn find_by_id(&self, scan_id: Uuid) -> ScannerResult<Option<Scan>> {
        Ok(self.scan(scan_id))
    }

    async fn find_job_for_scan(&self, scan_id: Uuid) -> ScannerResult<Option<ScanJob>> {
        Ok(self.job_for_scan(scan_id))
    }
}

#[async_trait]
impl JobRepository for InMemoryScanStore {
    async fn claim_next(&self) -> ScannerResult<Option<ClaimedJob>> {
        let mut state = self.state();
        state.claim_calls += 1;

        if state.failing_claims > 0 {
            state.failing_claims -= 1;
            return Err(ScannerError::database_error("模拟的认领失败"));
        }

        let next = state
            .queue
            .iter()
            .copied()
            .find(|id| matches!(state.jobs.get(id), Some(job) if job.status == ScanStatus::Queued));

        match next {
            Some(job_id) => Self::claim_locked(&mut state, job_id).map(Some),
            None => Ok(None),
        }
    }

    async fn start_job_for_scan(&self, scan_id: Uuid) -> ScannerResult<ClaimedJob> {
        let mut state = self.state();
        let job_id = state
            .jobs
            .values()
            .find(|job| job.scan_id == scan_id)
            .map(|job| job.id)
            .ok_or_else(|| ScannerError::scan_not_found(scan_id))?;

        Self::claim_locked(&mut state, job_id)
    }

    async fn mark_running(&self, job_id: Uuid) -> ScannerResult<()> {
        let now = Utc::now();
        let mut state = self.state();
        if state.fail_mark_running {
            return Err(ScannerError::database_error("模拟的运行状态写入失败"));
        }

        let job = state
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| ScannerError::job_not_found(job_id))?;
        job.mark_running(now)?;
        let scan_id = job.scan_id;

        if let Some(scan) = state.scans.get_mut(&scan_id) {
            scan.status = ScanStatus::Running;
            scan.started_at.get_or_insert(now);
        }
        Ok(())
    }

    async fn update_progress(&self, scan_id: Uuid, progress: f64) -> ScannerResult<()> {
        let mut state = self.state();
        let accepted = match state.scans.get_mut(&scan_id) {
            Some(scan) => scan.record_progress(progress),
            None => false,
        };

        if accepted {
            state
                .progress_history
                .entry(scan_id)
                .or_default()
                .push(clamp_progress(progress));
        }
        Ok(())
    }

    async fn mark_completed(&self, job_id: Uuid) -> ScannerResult<()> {
        let now = Utc::now();
        let mut state = self.state();
        if state.fail_finalize {
            return Err(ScannerError::database_error("模拟的终态写入失败"));
        }

        let job = state
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| ScannerError::job_not_found(job_id))?;
        job.complete(now)?;
        let scan_id = job.scan_id;

        if let Some(scan) = state.scans.get_mut(&scan_id) {
            scan.status = ScanStatus::Completed;
            scan.progress = 1.0;
            scan.finished_at = Some(now);
        }
        Ok(())
    }

    async fn mark_failed(&self, job_id: Uuid, reason: &str) -> ScannerResult<()> {
        let now = Utc::now();
        let mut state = self.state();
        if state.fail_finalize {
            return Err(ScannerError::database_error("模拟的终态写入失败"));
        }

        let job = state
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| ScannerError::job_not_found(job_id))?;
        job.fail(now, reason)?;
        let scan_id = job.scan_id;

        if let Some(scan) = state.scans.get_mut(&scan_id) {
            scan.status = ScanStatus::Failed;
            scan.finished_at = Some(now);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_store_follows_state_machine() {
        let store = InMemoryScanStore::new();
        let domain_id = store.get_or_create("example.com").await.unwrap();
        let scan = store.create(domain_id, "https://example.com").await.unwrap();

        let claimed = store.claim_next().await.unwrap().unwrap();
        assert_eq!(claimed.scan_id, scan.id);
        assert!(store.claim_next().await.unwrap().is_none());
        assert!(matches!(
            store.start_job_for_scan(scan.id).await,
            Err(ScannerError::NotClaimable { .. })
        ));

        store.update_progress(scan.id, 0.5).await.unwrap();
        store.mark_completed(claimed.job_id).await.unwrap();
        store.update_progress(scan.id, 0.1).await.unwrap();

        let snapshot = store.status(scan.id).await.unwrap().unwrap();
        assert_eq!(snapshot.status, ScanStatus::Completed);
        assert_eq!(snapshot.progress, 1.0);
        assert_eq!(store.progress_history(scan.id), vec![0.5]);
        assert!(store.mark_failed(claimed.job_id, "迟到").await.is_err());
    }
}
