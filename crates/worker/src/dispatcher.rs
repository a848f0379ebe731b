use std::sync::Arc;
use std::time::Duration;

use scanner_domain::entities::ClaimedJob;
use scanner_domain::repositories::JobRepository;
use scanner_infrastructure::observability::ScanMetrics;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const SHUTDOWN_REASON: &str = "进程关闭，任务在分发前被放弃";

/// 轮询间隔下限，`tokio::time::interval` 不接受零间隔
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

enum TickOutcome {
    Drained,
    Stopped,
}

/// 单个控制循环：按固定间隔认领排队任务并投递给工作池
///
/// 投递通道容量等于工作者数量，通道满时认领会暂停，形成背压。
pub struct Dispatcher {
    jobs: Arc<dyn JobRepository>,
    poll_interval: Duration,
    metrics: ScanMetrics,
}

impl Dispatcher {
    pub fn new(jobs: Arc<dyn JobRepository>, poll_interval: Duration) -> Self {
        if poll_interval < MIN_POLL_INTERVAL {
            warn!(
                "轮询间隔 {:?} 过小，使用下限 {:?}",
                poll_interval, MIN_POLL_INTERVAL
            );
        }

        Self {
            jobs,
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
            metrics: ScanMetrics::new(),
        }
    }

    /// 运行直到 `shutdown` 被取消；退出时丢弃发送端以关闭通道
    pub async fn run(self, sender: mpsc::Sender<ClaimedJob>, shutdown: CancellationToken) {
        info!("调度器启动，轮询间隔: {:?}", self.poll_interval);

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if let TickOutcome::Stopped = self.dispatch_tick(&sender, &shutdown).await {
                break;
            }
        }

        drop(sender);
        info!("调度器已停止");
    }

    /// 反复认领直到队列为空；存储错误放弃本轮
    async fn dispatch_tick(
        &self,
        sender: &mpsc::Sender<ClaimedJob>,
        shutdown: &CancellationToken,
    ) -> TickOutcome {
        loop {
            if shutdown.is_cancelled() {
                return TickOutcome::Stopped;
            }

            let job = match self.jobs.claim_next().await {
                Ok(Some(job)) => job,
                Ok(None) => return TickOutcome::Drained,
                Err(e) => {
                    self.metrics.record_claim_error();
                    error!("认领扫描任务失败，放弃本轮轮询: {}", e);
                    return TickOutcome::Drained;
                }
            };
            self.metrics.record_claimed();
            debug!(job_id = %job.job_id, scan_id = %job.scan_id, "投递扫描任务");

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    self.abandon(job, SHUTDOWN_REASON).await;
                    return TickOutcome::Stopped;
                }
                sent = sender.send(job) => {
                    if sent.is_err() {
                        warn!("工作池已关闭，停止分发");
                        self.abandon(job, "工作池已关闭，任务未被执行").await;
                        return TickOutcome::Stopped;
                    }
                }
            }
        }
    }

    /// 已认领但未投递的任务写为失败，避免停留在运行中
    async fn abandon(&self, job: ClaimedJob, reason: &str) {
        warn!(job_id = %job.job_id, scan_id = %job.scan_id, "{}", reason);
        if let Err(e) = self.jobs.mark_failed(job.job_id, reason).await {
            error!(job_id = %job.job_id, "放弃任务时写入失败状态出错: {}", e);
        }
    }
}
