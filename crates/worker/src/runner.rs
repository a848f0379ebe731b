use std::sync::Arc;
use std::time::Duration;

use scanner_core::WorkerConfig;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::dispatcher::Dispatcher;
use crate::execution::JobExecutor;
use crate::pool::WorkerPool;

#[derive(Debug, Clone, Copy)]
pub struct BackgroundOptions {
    pub concurrency: usize,
    pub poll_interval: Duration,
    pub job_timeout: Option<Duration>,
}

impl BackgroundOptions {
    pub fn new(concurrency: usize, poll_interval: Duration) -> Self {
        Self {
            concurrency,
            poll_interval,
            job_timeout: None,
        }
    }

    pub fn with_job_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.job_timeout = timeout;
        self
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(config.concurrency, config.poll_interval()).with_job_timeout(config.job_timeout())
    }
}

/// 后台处理的任务句柄
pub struct BackgroundHandle {
    dispatcher: Option<JoinHandle<()>>,
    workers: Vec<JoinHandle<()>>,
}

impl BackgroundHandle {
    pub fn is_active(&self) -> bool {
        self.dispatcher.is_some()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// 等待调度器与全部工作者退出
    pub async fn wait(self) {
        if let Some(dispatcher) = self.dispatcher {
            if let Err(e) = dispatcher.await {
                warn!("调度器任务异常退出: {}", e);
            }
        }
        for worker in self.workers {
            if let Err(e) = worker.await {
                warn!("工作者任务异常退出: {}", e);
            }
        }
    }
}

/// 启动后台处理；取消 `shutdown` 即停止
///
/// `concurrency` 为 0 时不启动任何任务。
pub fn start_background(
    executor: Arc<JobExecutor>,
    options: BackgroundOptions,
    shutdown: CancellationToken,
) -> BackgroundHandle {
    if options.concurrency == 0 {
        info!("后台扫描处理未启用");
        return BackgroundHandle {
            dispatcher: None,
            workers: Vec::new(),
        };
    }

    let (sender, receiver) = mpsc::channel(options.concurrency);

    let pool = WorkerPool::new(
        Arc::clone(&executor),
        options.concurrency,
        options.job_timeout,
    );
    let workers = pool.spawn(receiver, shutdown.clone());

    let dispatcher = Dispatcher::new(Arc::clone(executor.jobs()), options.poll_interval);
    let dispatcher = tokio::spawn(dispatcher.run(sender, shutdown));

    info!(
        "后台扫描处理已启动: {} 个工作者，执行单元: {}",
        options.concurrency,
        executor.work_unit_name()
    );

    BackgroundHandle {
        dispatcher: Some(dispatcher),
        workers,
    }
}
