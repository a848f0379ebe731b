use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enabled: bool,
    pub bind_address: String,
    pub request_timeout_seconds: u64,
    /// `POST /scan?wait=true` 未指定超时时使用
    pub inline_default_timeout_seconds: u64,
    pub inline_max_timeout_seconds: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_seconds: 330,
            inline_default_timeout_seconds: 30,
            inline_max_timeout_seconds: 300,
        }
    }
}

impl ApiConfig {
    pub fn inline_default_timeout(&self) -> Duration {
        Duration::from_secs(self.inline_default_timeout_seconds)
    }

    /// 把请求中的超时秒数限制在允许范围内
    pub fn inline_timeout(&self, requested_seconds: Option<u64>) -> Duration {
        match requested_seconds {
            Some(secs) if secs > 0 => {
                Duration::from_secs(secs.min(self.inline_max_timeout_seconds))
            }
            _ => self.inline_default_timeout(),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bind_address.is_empty() {
            return Err(anyhow::anyhow!("绑定地址不能为空"));
        }
        if !self.bind_address.contains(':') {
            return Err(anyhow::anyhow!("绑定地址格式无效，应为 host:port"));
        }

        if self.request_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("请求超时时间必须大于0"));
        }

        if self.inline_default_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("同步扫描默认超时时间必须大于0"));
        }

        if self.inline_default_timeout_seconds > self.inline_max_timeout_seconds {
            return Err(anyhow::anyhow!("同步扫描默认超时时间不能大于最大超时时间"));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,
    /// Prometheus抓取端口监听地址
    pub metrics_bind_address: String,
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_bind_address: "0.0.0.0:9090".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl ObservabilityConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.as_str()) {
            return Err(anyhow::anyhow!(
                "无效的日志级别: {}，支持的级别: {:?}",
                self.log_level,
                valid_levels
            ));
        }

        if self.metrics_enabled && !self.metrics_bind_address.contains(':') {
            return Err(anyhow::anyhow!(
                "指标监听地址格式无效: {}",
                self.metrics_bind_address
            ));
        }

        Ok(())
    }
}
