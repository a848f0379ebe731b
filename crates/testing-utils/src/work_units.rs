//! Scripted work units for exercising the execution paths

use async_trait::async_trait;
use scanner_core::{ScannerError, ScannerResult};
use scanner_worker::work_unit::{ExecutionContext, WorkUnit};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Behaviour {
    Succeed,
    Fail,
    /// 忽略取消信号，只能被超时丢弃
    Hang,
}

#[derive(Debug, Default)]
struct Record {
    executed: Vec<Uuid>,
    failing_scans: HashSet<Uuid>,
}

/// A work unit whose progress reports and outcome are fixed up front
#[derive(Debug, Clone)]
pub struct ScriptedWorkUnit {
    progress: Vec<f64>,
    step_delay: Duration,
    behaviour: Behaviour,
    error_message: String,
    record: Arc<Mutex<Record>>,
}

impl ScriptedWorkUnit {
    pub fn succeeding() -> Self {
        Self {
            progress: vec![0.25, 0.5, 0.75],
            step_delay: Duration::from_millis(10),
            behaviour: Behaviour::Succeed,
            error_message: String::new(),
            record: Arc::default(),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            behaviour: Behaviour::Fail,
            error_message: message.to_string(),
            ..Self::succeeding()
        }
    }

    pub fn hanging() -> Self {
        Self {
            behaviour: Behaviour::Hang,
            ..Self::succeeding()
        }
    }

    pub fn with_progress(mut self, progress: Vec<f64>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    /// 只对指定扫描返回错误，其余扫描按原行为执行
    pub fn fail_for(self, scan_id: Uuid, message: &str) -> Self {
        self.lock().failing_scans.insert(scan_id);
        Self {
            error_message: message.to_string(),
            ..self
        }
    }

    pub fn executed(&self) -> Vec<Uuid> {
        self.lock().executed.clone()
    }

    pub fn execution_count(&self) -> usize {
        self.lock().executed.len()
    }

    fn lock(&self) -> MutexGuard<'_, Record> {
        self.record.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl WorkUnit for ScriptedWorkUnit {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn execute(&self, ctx: &ExecutionContext) -> ScannerResult<()> {
        let should_fail = {
            let mut record = self.lock();
            record.executed.push(ctx.scan_id());
            self.behaviour == Behaviour::Fail || record.failing_scans.contains(&ctx.scan_id())
        };

        for value in &self.progress {
            ctx.report_progress(*value).await?;

            if self.behaviour == Behaviour::Hang {
                tokio::time::sleep(self.step_delay).await;
                continue;
            }

            tokio::select! {
                _ = ctx.cancellation_token().cancelled() => return Err(ScannerError::Cancelled),
                _ = tokio::time::sleep(self.step_delay) => {}
            }
        }

        if self.behaviour == Behaviour::Hang {
            std::future::pending::<()>().await;
        }

        if should_fail {
            return Err(ScannerError::work_unit(self.error_message.clone()));
        }
        Ok(())
    }
}
