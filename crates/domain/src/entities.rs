use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use scanner_core::{ScannerError, ScannerResult};

use crate::value_objects::clamp_progress;

/// 扫描与扫描任务共用的生命周期状态
///
/// `queued → running → {completed, failed}`，`completed` 与 `failed` 为终态。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ScanStatus {
    #[serde(rename = "queued")]
    Queued,
    #[serde(rename = "running")]
    Running,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "failed")]
    Failed,
}

/// 任务行与扫描行使用同一套状态
pub type JobStatus = ScanStatus;

impl ScanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanStatus::Queued => "queued",
            ScanStatus::Running => "running",
            ScanStatus::Completed => "completed",
            ScanStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ScanStatus::Completed | ScanStatus::Failed)
    }

    /// `running → running` 允许，对应幂等的 mark_running
    pub fn can_transition_to(&self, next: ScanStatus) -> bool {
        use ScanStatus::*;
        matches!(
            (self, next),
            (Queued, Running) | (Running, Running) | (Running, Completed) | (Running, Failed)
        )
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanStatus {
    type Err = ScannerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(ScanStatus::Queued),
            "running" => Ok(ScanStatus::Running),
            "completed" => Ok(ScanStatus::Completed),
            "failed" => Ok(ScanStatus::Failed),
            _ => Err(ScannerError::DatabaseOperation(format!(
                "Invalid scan status: {s}"
            ))),
        }
    }
}

impl sqlx::Type<sqlx::Postgres> for ScanStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        sqlx::postgres::PgTypeInfo::with_name("TEXT")
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <&str as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

impl sqlx::Type<sqlx::Sqlite> for ScanStatus {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <str as sqlx::Type<sqlx::Sqlite>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for ScanStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(s.parse::<ScanStatus>()?)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for ScanStatus {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(s.parse::<ScanStatus>()?)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for ScanStatus {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode(self.as_str(), buf)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for ScanStatus {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Sqlite>>::encode(self.as_str(), buf)
    }
}

/// 规范化后的可注册域名记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Domain {
    pub id: Uuid,
    pub registrable_domain: String,
    pub first_seen_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scan {
    pub id: Uuid,
    pub domain_id: Uuid,
    pub url: String,
    pub status: ScanStatus,
    pub progress: f64,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Scan {
    pub fn new(domain_id: Uuid, url: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            domain_id,
            url,
            status: ScanStatus::Queued,
            progress: 0.0,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    pub fn snapshot(&self) -> ScanSnapshot {
        ScanSnapshot {
            id: self.id,
            status: self.status,
            progress: self.progress,
        }
    }

    /// 仅在运行中时接受进度；终态扫描的进度保持冻结
    pub fn record_progress(&mut self, value: f64) -> bool {
        if self.status != ScanStatus::Running {
            return false;
        }
        self.progress = clamp_progress(value);
        true
    }

    pub fn entity_description(&self) -> String {
        format!("扫描 (ID: {}, URL: {})", self.id, self.url)
    }
}

/// 一个扫描对应的唯一一条可变任务记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanJob {
    pub id: Uuid,
    pub scan_id: Uuid,
    pub status: JobStatus,
    pub attempts: i32,
    pub queued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl ScanJob {
    pub fn new(scan_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            scan_id,
            status: ScanStatus::Queued,
            attempts: 0,
            queued_at: Utc::now(),
            started_at: None,
            finished_at: None,
            last_error: None,
        }
    }

    fn transition(&mut self, next: JobStatus, expected: &str) -> ScannerResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(ScannerError::invalid_transition(self.id, expected));
        }
        self.status = next;
        Ok(())
    }

    /// queued → running，尝试次数加一
    pub fn claim(&mut self, now: DateTime<Utc>) -> ScannerResult<ClaimedJob> {
        if self.status != ScanStatus::Queued {
            return Err(ScannerError::not_claimable(self.scan_id));
        }
        self.transition(ScanStatus::Running, "queued")?;
        self.attempts += 1;
        self.started_at = Some(now);
        Ok(self.claimed())
    }

    pub fn mark_running(&mut self, now: DateTime<Utc>) -> ScannerResult<()> {
        self.transition(ScanStatus::Running, "queued 或 running")?;
        self.started_at.get_or_insert(now);
        Ok(())
    }

    pub fn complete(&mut self, now: DateTime<Utc>) -> ScannerResult<()> {
        self.transition(ScanStatus::Completed, "running")?;
        self.finished_at = Some(now);
        Ok(())
    }

    pub fn fail(&mut self, now: DateTime<Utc>, reason: &str) -> ScannerResult<()> {
        self.transition(ScanStatus::Failed, "running")?;
        self.finished_at = Some(now);
        self.last_error = Some(reason.to_string());
        Ok(())
    }

    pub fn claimed(&self) -> ClaimedJob {
        ClaimedJob {
            job_id: self.id,
            scan_id: self.scan_id,
            attempts: self.attempts,
        }
    }
}

/// 认领成功后交给执行路径的任务引用，只携带标识，不缓存状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClaimedJob {
    pub job_id: Uuid,
    pub scan_id: Uuid,
    pub attempts: i32,
}

/// 对外暴露的扫描状态与进度
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanSnapshot {
    pub id: Uuid,
    pub status: ScanStatus,
    pub progress: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanDetails {
    pub scan: Scan,
    pub job: Option<ScanJob>,
}
