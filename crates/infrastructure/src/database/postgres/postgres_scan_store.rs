use async_trait::async_trait;
use scanner_domain::{
    entities::{ClaimedJob, Scan, ScanJob, ScanSnapshot, ScanStatus},
    repositories::{DomainRepository, JobRepository, ScanRepository},
    value_objects::clamp_progress,
};
use scanner_core::{ScannerError, ScannerResult};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::observability::{ScanMetrics, StructuredLogger};

const SCAN_COLUMNS: &str =
    "id, domain_id, url, status, progress, created_at, started_at, finished_at";
const JOB_COLUMNS: &str =
    "id, scan_id, status, attempts, queued_at, started_at, finished_at, last_error";

/// PostgreSQL 作业存储，认领使用 `FOR UPDATE SKIP LOCKED`
#[derive(Clone)]
pub struct PostgresScanStore {
    pool: PgPool,
    metrics: ScanMetrics,
}

impl PostgresScanStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            metrics: ScanMetrics::new(),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_scan(row: &sqlx::postgres::PgRow) -> ScannerResult<Scan> {
        Ok(Scan {
            id: row.try_get("id")?,
            domain_id: row.try_get("domain_id")?,
            url: row.try_get("url")?,
            status: row.try_get("status")?,
            progress: row.try_get("progress")?,
            created_at: row.try_get("created_at")?,
            started_at: row.try_get("started_at")?,
            finished_at: row.try_get("finished_at")?,
        })
    }

    fn row_to_job(row: &sqlx::postgres::PgRow) -> ScannerResult<ScanJob> {
        Ok(ScanJob {
            id: row.try_get("id")?,
            scan_id: row.try_get("scan_id")?,
            status: row.try_get("status")?,
            attempts: row.try_get("attempts")?,
            queued_at: row.try_get("queued_at")?,
            started_at: row.try_get("started_at")?,
            finished_at: row.try_get("finished_at")?,
            last_error: row.try_get("last_error")?,
        })
    }

    fn row_to_claimed(row: &sqlx::postgres::PgRow) -> ScannerResult<ClaimedJob> {
        Ok(ClaimedJob {
            job_id: row.try_get("id")?,
            scan_id: row.try_get("scan_id")?,
            attempts: row.try_get("attempts")?,
        })
    }

    /// 扫描状态镜像任务状态，`started_at` 只在首次进入运行时写入
    async fn mirror_running(
        tx: &mut Transaction<'_, Postgres>,
        scan_id: Uuid,
    ) -> ScannerResult<()> {
        sqlx::query(
            "UPDATE scans SET status = 'running', started_at = COALESCE(started_at, now()) WHERE id = $1",
        )
        .bind(scan_id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// 条件更新没有命中时，区分任务不存在与状态不符
    async fn transition_error(
        tx: &mut Transaction<'_, Postgres>,
        job_id: Uuid,
        expected: &str,
    ) -> ScannerError {
        let status: Result<Option<ScanStatus>, sqlx::Error> =
            sqlx::query_scalar("SELECT status FROM scan_jobs WHERE id = $1")
                .bind(job_id)
                .fetch_optional(&mut **tx)
                .await;

        match status {
            Ok(None) => ScannerError::job_not_found(job_id),
            Ok(Some(current)) => {
                warn!("任务 {} 当前状态为 {}，拒绝转换", job_id, current);
                ScannerError::invalid_transition(job_id, expected)
            }
            Err(e) => ScannerError::Database(e),
        }
    }
}

#[async_trait]
impl DomainRepository for PostgresScanStore {
    #[instrument(skip(self))]
    async fn get_or_create(&self, registrable_domain: &str) -> ScannerResult<Uuid> {
        let normalized = registrable_domain.trim().to_ascii_lowercase();

        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO domains (id, registrable_domain)
            VALUES ($1, $2)
            ON CONFLICT (registrable_domain)
            DO UPDATE SET registrable_domain = EXCLUDED.registrable_domain
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&normalized)
        .fetch_one(&self.pool)
        .await?;

        debug!("域名 {} 对应 ID: {}", normalized, id);
        Ok(id)
    }
}

#[async_trait]
impl ScanRepository for PostgresScanStore {
    async fn health_check(&self) -> ScannerResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(domain_id = %domain_id))]
    async fn create(&self, domain_id: Uuid, url: &str) -> ScannerResult<Scan> {
        let scan = Scan::new(domain_id, url.to_string());
        let job = ScanJob::new(scan.id);

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO scans (id, domain_id, url, status, progress, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(scan.id)
        .bind(scan.domain_id)
        .bind(&scan.url)
        .bind(scan.status)
        .bind(scan.progress)
        .bind(scan.created_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO scan_jobs (id, scan_id, status, attempts, queued_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(job.id)
        .bind(job.scan_id)
        .bind(job.status)
        .bind(job.attempts)
        .bind(job.queued_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        StructuredLogger::log_scan_enqueued(scan.id, job.id, &scan.url);
        self.metrics.record_enqueued();
        Ok(scan)
    }

    #[instrument(skip(self), fields(scan_id = %scan_id))]
    async fn status(&self, scan_id: Uuid) -> ScannerResult<Option<ScanSnapshot>> {
        let row = sqlx::query("SELECT id, status, progress FROM scans WHERE id = $1")
            .bind(scan_id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| {
            Ok(ScanSnapshot {
                id: row.try_get("id")?,
                status: row.try_get("status")?,
                progress: row.try_get("progress")?,
            })
        })
        .transpose()
    }

    #[instrument(skip(self), fields(scan_id = %scan_id))]
    async fn find_by_id(&self, scan_id: Uuid) -> ScannerResult<Option<Scan>> {
        let row = sqlx::query(&format!("SELECT {SCAN_COLUMNS} FROM scans WHERE id = $1"))
            .bind(scan_id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_scan).transpose()
    }

    #[instrument(skip(self), fields(scan_id = %scan_id))]
    async fn find_job_for_scan(&self, scan_id: Uuid) -> ScannerResult<Option<ScanJob>> {
        let row = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM scan_jobs WHERE scan_id = $1"
        ))
        .bind(scan_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_job).transpose()
    }
}

#[async_trait]
impl JobRepository for PostgresScanStore {
    #[instrument(skip(self))]
    async fn claim_next(&self) -> ScannerResult<Option<ClaimedJob>> {
        let mut tx = self.pool.begin().await?;

        // 被其他认领者锁住的行直接跳过，不等待
        let candidate: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM scan_jobs
            WHERE status = 'queued'
            ORDER BY queued_at
            LIMIT 1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .fetch_optional(&mut *tx)
        .await?;

        let Some(job_id) = candidate else {
            tx.rollback().await?;
            return Ok(None);
        };

        let row = sqlx::query(
            r#"
            UPDATE scan_jobs
            SET status = 'running', started_at = now(), attempts = attempts + 1
            WHERE id = $1
            RETURNING id, scan_id, attempts
            "#,
        )
        .bind(job_id)
        .fetch_one(&mut *tx)
        .await?;
        let claimed = Self::row_to_claimed(&row)?;

        Self::mirror_running(&mut tx, claimed.scan_id).await?;
        tx.commit().await?;

        StructuredLogger::log_job_claimed(claimed.job_id, claimed.scan_id, claimed.attempts);
        Ok(Some(claimed))
    }

    #[instrument(skip(self), fields(scan_id = %scan_id))]
    async fn start_job_for_scan(&self, scan_id: Uuid) -> ScannerResult<ClaimedJob> {
        let mut tx = self.pool.begin().await?;

        let candidate: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM scan_jobs
            WHERE scan_id = $1 AND status = 'queued'
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(scan_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(job_id) = candidate else {
            let exists: Option<i32> =
                sqlx::query_scalar("SELECT 1 FROM scan_jobs WHERE scan_id = $1")
                    .bind(scan_id)
                    .fetch_optional(&mut *tx)
                    .await?;
            tx.rollback().await?;

            return Err(match exists {
                Some(_) => ScannerError::not_claimable(scan_id),
                None => ScannerError::scan_not_found(scan_id),
            });
        };

        let row = sqlx::query(
            r#"
            UPDATE scan_jobs
            SET status = 'running', started_at = now(), attempts = attempts + 1
            WHERE id = $1
            RETURNING id, scan_id, attempts
            "#,
        )
        .bind(job_id)
        .fetch_one(&mut *tx)
        .await?;
        let claimed = Self::row_to_claimed(&row)?;

        Self::mirror_running(&mut tx, scan_id).await?;
        tx.commit().await?;

        StructuredLogger::log_job_claimed(claimed.job_id, claimed.scan_id, claimed.attempts);
        Ok(claimed)
    }

    #[instrument(skip(self), fields(job_id = %job_id))]
    async fn mark_running(&self, job_id: Uuid) -> ScannerResult<()> {
        let mut tx = self.pool.begin().await?;

        let scan_id: Option<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE scan_jobs
            SET status = 'running', started_at = COALESCE(started_at, now())
            WHERE id = $1 AND status IN ('queued', 'running')
            RETURNING scan_id
            "#,
        )
        .bind(job_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(scan_id) = scan_id else {
            let err = Self::transition_error(&mut tx, job_id, "queued 或 running").await;
            tx.rollback().await?;
            return Err(err);
        };

        Self::mirror_running(&mut tx, scan_id).await?;
        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip(self), fields(scan_id = %scan_id))]
    async fn update_progress(&self, scan_id: Uuid, progress: f64) -> ScannerResult<()> {
        let value = clamp_progress(progress);

        let result =
            sqlx::query("UPDATE scans SET progress = $2 WHERE id = $1 AND status = 'running'")
                .bind(scan_id)
                .bind(value)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            debug!("扫描 {} 不在运行中，忽略进度更新 {}", scan_id, value);
        }
        Ok(())
    }

    #[instrument(skip(self), fields(job_id = %job_id))]
    async fn mark_completed(&self, job_id: Uuid) -> ScannerResult<()> {
        let mut tx = self.pool.begin().await?;

        let scan_id: Option<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE scan_jobs
            SET status = 'completed', finished_at = now()
            WHERE id = $1 AND status = 'running'
            RETURNING scan_id
            "#,
        )
        .bind(job_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(scan_id) = scan_id else {
            let err = Self::transition_error(&mut tx, job_id, "running").await;
            tx.rollback().await?;
            return Err(err);
        };

        sqlx::query(
            "UPDATE scans SET status = 'completed', progress = 1.0, finished_at = now() WHERE id = $1",
        )
        .bind(scan_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        StructuredLogger::log_job_completed(job_id, scan_id);
        Ok(())
    }

    #[instrument(skip(self, reason), fields(job_id = %job_id))]
    async fn mark_failed(&self, job_id: Uuid, reason: &str) -> ScannerResult<()> {
        let mut tx = self.pool.begin().await?;

        let scan_id: Option<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE scan_jobs
            SET status = 'failed', finished_at = now(), last_error = $2
            WHERE id = $1 AND status = 'running'
            RETURNING scan_id
            "#,
        )
        .bind(job_id)
        .bind(reason)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(scan_id) = scan_id else {
            let err = Self::transition_error(&mut tx, job_id, "running").await;
            tx.rollback().await?;
            return Err(err);
        };

        // 失败时保留最后一次上报的进度
        sqlx::query("UPDATE scans SET status = 'failed', finished_at = now() WHERE id = $1")
            .bind(scan_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        StructuredLogger::log_job_failed(job_id, scan_id, reason);
        Ok(())
    }
}
