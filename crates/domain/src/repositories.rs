//! 领域仓储抽象
//!
//! 作业存储是唯一持有扫描与任务状态的组件，调度器、工作池和内联执行器只持有 ID。

use async_trait::async_trait;
use uuid::Uuid;

use crate::entities::{ClaimedJob, Scan, ScanJob, ScanSnapshot};
use scanner_core::ScannerResult;

/// 可注册域名仓储抽象
#[async_trait]
pub trait DomainRepository: Send + Sync {
    /// 按规范化域名查找或创建，返回域名 ID
    async fn get_or_create(&self, registrable_domain: &str) -> ScannerResult<Uuid>;
}

/// 扫描仓储抽象
#[async_trait]
pub trait ScanRepository: Send + Sync {
    /// 存储连通性检查
    async fn health_check(&self) -> ScannerResult<()>;

    /// 在同一事务内创建排队中的扫描及其任务
    async fn create(&self, domain_id: Uuid, url: &str) -> ScannerResult<Scan>;
    async fn status(&self, scan_id: Uuid) -> ScannerResult<Option<ScanSnapshot>>;
    async fn find_by_id(&self, scan_id: Uuid) -> ScannerResult<Option<Scan>>;
    async fn find_job_for_scan(&self, scan_id: Uuid) -> ScannerResult<Option<ScanJob>>;
}

/// 任务仓储抽象，状态转换全部在存储侧原子完成
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// 认领最早排队的任务；没有可认领任务时返回 `Ok(None)`
    async fn claim_next(&self) -> ScannerResult<Option<ClaimedJob>>;

    /// 认领指定扫描的任务；任务不处于排队状态时返回 `NotClaimable`，从不阻塞
    async fn start_job_for_scan(&self, scan_id: Uuid) -> ScannerResult<ClaimedJob>;

    async fn mark_running(&self, job_id: Uuid) -> ScannerResult<()>;

    /// 覆盖写入进度，值会被收敛到 `[0, 1]`；扫描不在运行中时静默忽略
    async fn update_progress(&self, scan_id: Uuid, progress: f64) -> ScannerResult<()>;

    async fn mark_completed(&self, job_id: Uuid) -> ScannerResult<()>;

    async fn mark_failed(&self, job_id: Uuid, reason: &str) -> ScannerResult<()>;
}

/// 同时提供三类仓储的存储实现
pub trait ScanStore: DomainRepository + ScanRepository + JobRepository {}

impl<T> ScanStore for T where T: DomainRepository + ScanRepository + JobRepository {}
