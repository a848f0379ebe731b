pub mod config;
pub mod errors;

pub use config::{ApiConfig, AppConfig, DatabaseConfig, ObservabilityConfig, WorkerConfig};
pub use errors::*;
