use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 后台扫描处理配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Worker数量，同时也是分发通道容量；为0时不启动后台处理
    pub concurrency: usize,
    pub poll_interval_ms: u64,
    /// 默认扫描处理器每一步之间的间隔
    pub step_interval_ms: u64,
    pub steps: u32,
    /// 后台执行单个任务的超时时间，不设置则只受进程关闭信号约束
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_timeout_seconds: Option<u64>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 0,
            poll_interval_ms: 500,
            step_interval_ms: 150,
            steps: 4,
            job_timeout_seconds: None,
        }
    }
}

impl WorkerConfig {
    pub fn is_enabled(&self) -> bool {
        self.concurrency > 0
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn step_interval(&self) -> Duration {
        Duration::from_millis(self.step_interval_ms)
    }

    pub fn job_timeout(&self) -> Option<Duration> {
        self.job_timeout_seconds.map(Duration::from_secs)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(anyhow::anyhow!("任务轮询间隔必须大于0"));
        }

        if self.steps == 0 {
            return Err(anyhow::anyhow!("扫描步数必须大于0"));
        }

        if self.job_timeout_seconds == Some(0) {
            return Err(anyhow::anyhow!("任务超时时间必须大于0"));
        }

        Ok(())
    }
}
