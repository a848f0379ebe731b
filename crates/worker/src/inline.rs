use std::sync::Arc;
use std::time::Duration;

use scanner_core::{ScannerError, ScannerResult};
use scanner_infrastructure::observability::ExecutionPath;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::execution::JobExecutor;

/// 在调用方的任务中同步执行指定扫描
pub struct InlineExecutor {
    executor: Arc<JobExecutor>,
    shutdown: CancellationToken,
}

impl InlineExecutor {
    pub fn new(executor: Arc<JobExecutor>, shutdown: CancellationToken) -> Self {
        Self { executor, shutdown }
    }

    /// 认领该扫描的任务并在 `timeout` 内执行完毕
    ///
    /// 任务不可认领时立即返回 `NotClaimable`，不会等待；超时返回 `ExecutionTimeout`，
    /// 此时任务已被写为失败。
    ///
    /// 认领与执行在独立任务中进行。调用方中途放弃（例如客户端断开）时本次执行被取消，
    /// 任务仍会被写成终态，不会停留在运行中。
    #[instrument(skip(self), fields(scan_id = %scan_id))]
    pub async fn run(&self, scan_id: Uuid, timeout: Duration) -> ScannerResult<()> {
        let token = self.shutdown.child_token();
        let _caller_gone = token.clone().drop_guard();

        let executor = Arc::clone(&self.executor);
        let execution = tokio::spawn(async move {
            let job = executor.jobs().start_job_for_scan(scan_id).await?;
            info!(job_id = %job.job_id, scan_id = %scan_id, "内联执行扫描，超时: {:?}", timeout);

            executor
                .run(job, token, Some(timeout), ExecutionPath::Inline)
                .await
        });

        match execution.await {
            Ok(result) => result,
            Err(e) => {
                warn!("内联执行任务异常退出: {}", e);
                Err(ScannerError::Internal(format!("内联执行任务异常退出: {e}")))
            }
        }
    }
}
