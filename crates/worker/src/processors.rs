use std::time::Duration;

use async_trait::async_trait;
use scanner_core::{ScannerError, ScannerResult, WorkerConfig};
use tracing::debug;

use crate::work_unit::{ExecutionContext, WorkUnit};

/// 默认的扫描处理器：按固定步数推进进度，每步之间等待固定间隔
///
/// 上报顺序为 `0, 1/n, ..., (n-1)/n`，最后上报 `1.0`。
#[derive(Debug, Clone)]
pub struct SteppedWorkUnit {
    steps: u32,
    step_interval: Duration,
}

impl SteppedWorkUnit {
    pub fn new(steps: u32, step_interval: Duration) -> Self {
        Self {
            steps: steps.max(1),
            step_interval,
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self::new(config.steps, config.step_interval())
    }

    /// 不被取消时一次执行的总耗时
    pub fn total_duration(&self) -> Duration {
        self.step_interval * self.steps
    }
}

impl Default for SteppedWorkUnit {
    fn default() -> Self {
        Self::from_config(&WorkerConfig::default())
    }
}

#[async_trait]
impl WorkUnit for SteppedWorkUnit {
    fn name(&self) -> &str {
        "stepped"
    }

    async fn execute(&self, ctx: &ExecutionContext) -> ScannerResult<()> {
        for step in 0..self.steps {
            ctx.report_progress(f64::from(step) / f64::from(self.steps))
                .await?;

            tokio::select! {
                _ = ctx.cancellation_token().cancelled() => {
                    debug!("扫描 {} 在第 {} 步被取消", ctx.scan_id(), step);
                    return Err(ScannerError::Cancelled);
                }
                _ = tokio::time::sleep(self.step_interval) => {}
            }
        }

        ctx.report_progress(1.0).await
    }
}
