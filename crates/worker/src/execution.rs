use std::sync::Arc;
use std::time::{Duration, Instant};

use scanner_core::{ScannerError, ScannerResult};
use scanner_domain::entities::ClaimedJob;
use scanner_domain::repositories::JobRepository;
use scanner_infrastructure::observability::{ExecutionPath, ScanMetrics, StructuredLogger};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::work_unit::{ExecutionContext, WorkUnit};

/// 后台工作池与内联执行器共用的唯一执行路径
///
/// 负责运行执行单元、施加可选超时，并把结果写成任务终态：
/// 成功写 completed，任何错误（包括取消与超时）写 failed。
pub struct JobExecutor {
    jobs: Arc<dyn JobRepository>,
    work_unit: Arc<dyn WorkUnit>,
    metrics: ScanMetrics,
}

impl JobExecutor {
    pub fn new(jobs: Arc<dyn JobRepository>, work_unit: Arc<dyn WorkUnit>) -> Self {
        Self {
            jobs,
            work_unit,
            metrics: ScanMetrics::new(),
        }
    }

    pub fn jobs(&self) -> &Arc<dyn JobRepository> {
        &self.jobs
    }

    pub fn work_unit_name(&self) -> &str {
        self.work_unit.name()
    }

    /// 执行一个已认领的任务
    ///
    /// 进入这里之后的每一种结果都会写成终态。
    /// 返回执行单元的错误（超时为 `ExecutionTimeout`）；执行成功但终态写入失败时返回存储错误。
    #[instrument(skip(self, cancel), fields(
        job_id = %job.job_id,
        scan_id = %job.scan_id,
        attempts = job.attempts,
        path = path.as_str(),
    ))]
    pub async fn run(
        &self,
        job: ClaimedJob,
        cancel: CancellationToken,
        timeout: Option<Duration>,
        path: ExecutionPath,
    ) -> ScannerResult<()> {
        // 认领操作已完成 queued → running，这里直接执行
        let token = cancel.child_token();
        let ctx = ExecutionContext::new(job, Arc::clone(&self.jobs), token.clone());
        let started = Instant::now();

        debug!("开始执行扫描任务，执行单元: {}", self.work_unit.name());
        let outcome = match timeout {
            Some(limit) => {
                tokio::select! {
                    result = self.work_unit.execute(&ctx) => result,
                    _ = tokio::time::sleep(limit) => {
                        // 只取消本次执行，不影响进程级令牌
                        token.cancel();
                        let timeout_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
                        StructuredLogger::log_execution_timeout(job.job_id, job.scan_id, timeout_ms);
                        Err(ScannerError::ExecutionTimeout { timeout_ms })
                    }
                }
            }
            None => self.work_unit.execute(&ctx).await,
        };

        let finalize = match &outcome {
            Ok(()) => self.jobs.mark_completed(job.job_id).await,
            Err(e) => self.jobs.mark_failed(job.job_id, &e.to_string()).await,
        };

        self.metrics
            .record_execution(path, outcome_label(&outcome), started.elapsed());

        if let Err(e) = &finalize {
            self.metrics.record_finalize_error();
            StructuredLogger::log_finalize_error(job.job_id, job.scan_id, &e.to_string());
        }

        match (outcome, finalize) {
            (Err(e), _) => Err(e),
            (Ok(()), Err(e)) => Err(e),
            (Ok(()), Ok(())) => Ok(()),
        }
    }
}

fn outcome_label(outcome: &ScannerResult<()>) -> &'static str {
    match outcome {
        Ok(()) => "completed",
        Err(e) if e.is_timeout() => "timeout",
        Err(e) if e.is_cancelled() => "cancelled",
        Err(_) => "failed",
    }
}
