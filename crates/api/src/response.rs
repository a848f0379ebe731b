use scanner_domain::entities::{ScanDetails, ScanSnapshot, ScanStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `POST /scan` 异步入队的响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanAccepted {
    pub scan_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResponse {
    pub id: Uuid,
    pub status: ScanStatus,
    pub progress: f64,
}

impl From<ScanSnapshot> for ScanResponse {
    fn from(snapshot: ScanSnapshot) -> Self {
        Self {
            id: snapshot.id,
            status: snapshot.status,
            progress: snapshot.progress,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanDetailsResponse {
    pub id: Uuid,
    pub url: String,
    pub status: ScanStatus,
    pub progress: f64,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<ScanDetails> for ScanDetailsResponse {
    fn from(details: ScanDetails) -> Self {
        let (attempts, last_error) = details
            .job
            .map(|job| (job.attempts, job.last_error))
            .unwrap_or((0, None));

        Self {
            id: details.scan.id,
            url: details.scan.url,
            status: details.scan.status,
            progress: details.scan.progress,
            attempts,
            last_error,
            created_at: details.scan.created_at,
            started_at: details.scan.started_at,
            finished_at: details.scan.finished_at,
        }
    }
}
