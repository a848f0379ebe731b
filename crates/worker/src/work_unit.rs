use std::sync::Arc;

use async_trait::async_trait;
use scanner_core::ScannerResult;
use scanner_domain::entities::ClaimedJob;
use scanner_domain::repositories::JobRepository;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// 一次执行所需的上下文：任务标识、取消令牌与进度上报通道
#[derive(Clone)]
pub struct ExecutionContext {
    job: ClaimedJob,
    jobs: Arc<dyn JobRepository>,
    cancel: CancellationToken,
}

impl ExecutionContext {
    pub fn new(job: ClaimedJob, jobs: Arc<dyn JobRepository>, cancel: CancellationToken) -> Self {
        Self { job, jobs, cancel }
    }

    pub fn scan_id(&self) -> Uuid {
        self.job.scan_id
    }

    pub fn job_id(&self) -> Uuid {
        self.job.job_id
    }

    pub fn attempt(&self) -> i32 {
        self.job.attempts
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// 上报进度，由存储收敛到 `[0, 1]`
    pub async fn report_progress(&self, progress: f64) -> ScannerResult<()> {
        self.jobs.update_progress(self.job.scan_id, progress).await
    }
}

/// 可插拔的扫描执行单元
///
/// 实现需要在各个步骤之间检查取消信号并尽快返回 `ScannerError::Cancelled`，
/// 同一扫描失败后再次调用必须是安全的。
#[async_trait]
pub trait WorkUnit: Send + Sync {
    fn name(&self) -> &str;

    async fn execute(&self, ctx: &ExecutionContext) -> ScannerResult<()>;
}
