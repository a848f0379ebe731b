use std::sync::Arc;
use std::time::Duration;

use scanner_domain::entities::ClaimedJob;
use scanner_infrastructure::observability::ExecutionPath;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::execution::JobExecutor;

/// 固定数量的工作者，共享同一个接收端
pub struct WorkerPool {
    executor: Arc<JobExecutor>,
    size: usize,
    job_timeout: Option<Duration>,
}

impl WorkerPool {
    pub fn new(executor: Arc<JobExecutor>, size: usize, job_timeout: Option<Duration>) -> Self {
        Self {
            executor,
            size,
            job_timeout,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// 启动全部工作者；通道关闭且取空后工作者退出
    pub fn spawn(
        &self,
        receiver: mpsc::Receiver<ClaimedJob>,
        shutdown: CancellationToken,
    ) -> Vec<JoinHandle<()>> {
        let receiver = Arc::new(Mutex::new(receiver));

        (0..self.size)
            .map(|index| {
                tokio::spawn(worker_loop(
                    index,
                    Arc::clone(&self.executor),
                    Arc::clone(&receiver),
                    shutdown.clone(),
                    self.job_timeout,
                ))
            })
            .collect()
    }
}

async fn worker_loop(
    index: usize,
    executor: Arc<JobExecutor>,
    receiver: Arc<Mutex<mpsc::Receiver<ClaimedJob>>>,
    shutdown: CancellationToken,
    job_timeout: Option<Duration>,
) {
    debug!(worker = index, "工作者启动");

    loop {
        let next = receiver.lock().await.recv().await;
        let Some(job) = next else {
            break;
        };

        // 执行失败已反映在任务的失败状态中，这里只记录并继续
        if let Err(e) = executor
            .run(job, shutdown.clone(), job_timeout, ExecutionPath::Background)
            .await
        {
            warn!(
                worker = index,
                job_id = %job.job_id,
                scan_id = %job.scan_id,
                "扫描任务执行失败: {}",
                e
            );
        }
    }

    info!(worker = index, "工作者退出");
}
