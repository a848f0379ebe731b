use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    api_observability::{ApiConfig, ObservabilityConfig},
    database::DatabaseConfig,
    worker::WorkerConfig,
};

/// System configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Load configuration from config file and environment variables
    ///
    /// Load order:
    /// 1. Default configuration
    /// 2. Config file (TOML format)
    /// 3. Environment variable overrides (prefix: SCANNER_, nesting: __)
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let defaults = ConfigBuilder::try_from(&AppConfig::default()).context("构建默认配置失败")?;
        let mut builder = ConfigBuilder::builder().add_source(defaults);

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else {
            let default_paths = [
                "config/scanner.toml",
                "scanner.toml",
                "/etc/scanner/config.toml",
            ];

            if let Some(path) = default_paths.iter().find(|p| Path::new(p).exists()) {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("SCANNER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    pub fn validate(&self) -> Result<()> {
        self.database.validate().context("数据库配置验证失败")?;
        self.worker.validate().context("Worker配置验证失败")?;
        self.api.validate().context("API配置验证失败")?;
        self.observability
            .validate()
            .context("可观测性配置验证失败")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.worker.is_enabled());
        assert_eq!(config.worker.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.worker.step_interval(), Duration::from_millis(150));
    }

    #[test]
    fn test_from_toml_partial_sections() {
        let config = AppConfig::from_toml(
            r#"
            [database]
            url = "sqlite:scanner.db"
            max_connections = 4
            min_connections = 1
            connection_timeout_seconds = 5
            idle_timeout_seconds = 60

            [worker]
            concurrency = 3
            poll_interval_ms = 200
            step_interval_ms = 10
            steps = 8
            job_timeout_seconds = 120
            "#,
        )
        .unwrap();

        assert!(config.database.is_sqlite());
        assert_eq!(config.worker.concurrency, 3);
        assert_eq!(config.worker.job_timeout(), Some(Duration::from_secs(120)));
        assert_eq!(config.api.inline_default_timeout_seconds, 30);
    }

    #[test]
    fn test_invalid_database_url_rejected() {
        let result = AppConfig::from_toml(
            r#"
            [database]
            url = "mysql://localhost/scanner"
            max_connections = 4
            min_connections = 1
            connection_timeout_seconds = 5
            idle_timeout_seconds = 60
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let mut config = AppConfig::default();
        config.worker.poll_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
            [worker]
            concurrency = 2
            poll_interval_ms = 250
            step_interval_ms = 150
            steps = 4

            [api]
            enabled = true
            bind_address = "127.0.0.1:18080"
            request_timeout_seconds = 60
            inline_default_timeout_seconds = 10
            inline_max_timeout_seconds = 30
            "#
        )
        .unwrap();

        let config = AppConfig::load(file.path().to_str()).unwrap();
        assert_eq!(config.worker.concurrency, 2);
        assert_eq!(config.worker.poll_interval_ms, 250);
        assert_eq!(config.api.bind_address, "127.0.0.1:18080");
        assert_eq!(config.database.max_connections, 10);
    }

    #[test]
    fn test_load_missing_file_fails() {
        assert!(AppConfig::load(Some("/nonexistent/scanner.toml")).is_err());
    }

    #[test]
    fn test_inline_timeout_is_clamped() {
        let api = ApiConfig::default();
        assert_eq!(api.inline_timeout(None), Duration::from_secs(30));
        assert_eq!(api.inline_timeout(Some(0)), Duration::from_secs(30));
        assert_eq!(api.inline_timeout(Some(5)), Duration::from_secs(5));
        assert_eq!(api.inline_timeout(Some(10_000)), Duration::from_secs(300));
    }

    #[test]
    fn test_toml_round_trip_keeps_worker_settings() {
        let mut config = AppConfig::default();
        config.worker.concurrency = 6;
        let text = config.to_toml().unwrap();
        let parsed = AppConfig::from_toml(&text).unwrap();
        assert_eq!(parsed.worker.concurrency, 6);
    }
}
