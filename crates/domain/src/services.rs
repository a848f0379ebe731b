//! # 领域服务模块
//!
//! 扫描的入队与查询。入队时完成目标 URL 的校验与域名规范化，
//! 执行相关的状态转换不在这里，而是由工作池与内联执行器通过 [`JobRepository`](crate::repositories::JobRepository) 完成。

use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::entities::{ScanDetails, ScanSnapshot};
use crate::repositories::{DomainRepository, ScanRepository};
use crate::value_objects::RegistrableDomain;
use scanner_core::{ScannerError, ScannerResult};

pub struct ScanService {
    domains: Arc<dyn DomainRepository>,
    scans: Arc<dyn ScanRepository>,
}

impl ScanService {
    pub fn new(domains: Arc<dyn DomainRepository>, scans: Arc<dyn ScanRepository>) -> Self {
        Self { domains, scans }
    }

    /// 为目标 URL 创建一个排队中的扫描，返回扫描 ID
    #[instrument(skip(self))]
    pub async fn enqueue(&self, url: &str) -> ScannerResult<Uuid> {
        let (parsed, domain) = RegistrableDomain::from_url(url)?;
        debug!("目标 {} 的可注册域名: {}", parsed, domain);

        let domain_id = self.domains.get_or_create(domain.as_str()).await?;
        let scan = self.scans.create(domain_id, parsed.as_str()).await?;

        info!(scan_id = %scan.id, domain = %domain, "扫描已入队");
        Ok(scan.id)
    }

    pub async fn health_check(&self) -> ScannerResult<()> {
        self.scans.health_check().await
    }

    pub async fn status(&self, scan_id: Uuid) -> ScannerResult<ScanSnapshot> {
        self.scans
            .status(scan_id)
            .await?
            .ok_or_else(|| ScannerError::scan_not_found(scan_id))
    }

    /// 扫描的完整快照，包含任务的尝试次数与失败原因
    pub async fn scan(&self, scan_id: Uuid) -> ScannerResult<ScanDetails> {
        let scan = self
            .scans
            .find_by_id(scan_id)
            .await?
            .ok_or_else(|| ScannerError::scan_not_found(scan_id))?;
        let job = self.scans.find_job_for_scan(scan_id).await?;

        Ok(ScanDetails { scan, job })
    }
}
