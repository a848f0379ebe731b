use thiserror::Error;
use uuid::Uuid;

/// 扫描服务错误类型定义
#[derive(Debug, Error)]
pub enum ScannerError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("数据库操作错误: {0}")]
    DatabaseOperation(String),

    #[error("扫描未找到: {id}")]
    ScanNotFound { id: Uuid },

    #[error("扫描任务未找到: {id}")]
    JobNotFound { id: Uuid },

    /// 该扫描的任务当前不处于排队状态（已被其他执行者认领或已终结）
    #[error("扫描 {scan_id} 的任务当前不可认领")]
    NotClaimable { scan_id: Uuid },

    #[error("扫描任务 {job_id} 状态转换无效: 期望状态为 {expected}")]
    InvalidTransition { job_id: Uuid, expected: String },

    #[error("扫描执行超时: {timeout_ms}ms")]
    ExecutionTimeout { timeout_ms: u64 },

    #[error("扫描执行已取消")]
    Cancelled,

    #[error("扫描执行失败: {0}")]
    WorkUnit(String),

    #[error("无效的扫描目标: {0}")]
    InvalidTarget(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 统一的Result类型
pub type ScannerResult<T> = std::result::Result<T, ScannerError>;

impl ScannerError {
    pub fn database_error<S: Into<String>>(msg: S) -> Self {
        Self::DatabaseOperation(msg.into())
    }
    pub fn scan_not_found(id: Uuid) -> Self {
        Self::ScanNotFound { id }
    }
    pub fn job_not_found(id: Uuid) -> Self {
        Self::JobNotFound { id }
    }
    pub fn not_claimable(scan_id: Uuid) -> Self {
        Self::NotClaimable { scan_id }
    }
    pub fn invalid_transition<S: Into<String>>(job_id: Uuid, expected: S) -> Self {
        Self::InvalidTransition {
            job_id,
            expected: expected.into(),
        }
    }
    pub fn work_unit<S: Into<String>>(msg: S) -> Self {
        Self::WorkUnit(msg.into())
    }
    pub fn invalid_target<S: Into<String>>(msg: S) -> Self {
        Self::InvalidTarget(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }

    /// 调用方超时，与扫描本身失败区分开
    pub fn is_timeout(&self) -> bool {
        matches!(self, ScannerError::ExecutionTimeout { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ScannerError::Cancelled)
    }

    /// 认领竞争不是真正的错误
    pub fn is_contention(&self) -> bool {
        matches!(self, ScannerError::NotClaimable { .. })
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ScannerError::Database(_)
                | ScannerError::DatabaseOperation(_)
                | ScannerError::NotClaimable { .. }
        )
    }

    pub fn user_message(&self) -> &str {
        match self {
            ScannerError::ScanNotFound { .. } => "请求的扫描不存在",
            ScannerError::JobNotFound { .. } => "请求的扫描任务不存在",
            ScannerError::NotClaimable { .. } => "扫描正在执行或已结束，当前无法启动",
            ScannerError::ExecutionTimeout { .. } => "扫描在限定时间内未完成",
            ScannerError::Cancelled => "扫描已被取消",
            ScannerError::WorkUnit(_) => "扫描执行失败",
            ScannerError::InvalidTarget(_) => "扫描目标URL无效",
            _ => "系统繁忙，请稍后重试",
        }
    }
}

impl From<serde_json::Error> for ScannerError {
    fn from(err: serde_json::Error) -> Self {
        ScannerError::Serialization(err.to_string())
    }
}

impl From<anyhow::Error> for ScannerError {
    fn from(err: anyhow::Error) -> Self {
        ScannerError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_distinct_from_work_unit_failure() {
        let timeout = ScannerError::ExecutionTimeout { timeout_ms: 100 };
        let failure = ScannerError::work_unit("抓取失败");

        assert!(timeout.is_timeout());
        assert!(!failure.is_timeout());
        assert_eq!(failure.to_string(), "扫描执行失败: 抓取失败");
    }

    #[test]
    fn test_not_claimable_is_contention() {
        let err = ScannerError::not_claimable(Uuid::nil());
        assert!(err.is_contention());
        assert!(err.is_retryable());
        assert!(!ScannerError::Cancelled.is_contention());
    }
}
