//! Observability module
//!
//! Metrics for the claim and execution paths, plus structured lifecycle
//! logging with a stable `event` field.

pub mod metrics_collector;
pub mod structured_logger;

use std::net::SocketAddr;

use anyhow::Result;
use tracing::info;

pub use metrics_collector::{ExecutionPath, ScanMetrics};
pub use structured_logger::StructuredLogger;

/// Install the Prometheus recorder and its scrape listener
///
/// Must be called from inside a tokio runtime.
pub fn init_metrics(bind_address: &str) -> Result<()> {
    let addr: SocketAddr = bind_address
        .parse()
        .map_err(|e| anyhow::anyhow!("无效的指标监听地址 {}: {}", bind_address, e))?;

    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus exporter: {}", e))?;

    info!("Prometheus metrics exporter listening on {}", addr);
    Ok(())
}
