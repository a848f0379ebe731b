use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use url::{Host, Url};

use scanner_core::{ScannerError, ScannerResult};

/// 将任意进度值收敛到 `[0, 1]`，NaN 视为 0
pub fn clamp_progress(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// 扫描目标的可注册域名 (eTLD+1)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegistrableDomain(String);

impl RegistrableDomain {
    /// 解析并校验目标 URL，返回规范化的 URL 与其可注册域名
    pub fn from_url(raw: &str) -> ScannerResult<(Url, Self)> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ScannerError::invalid_target("url 不能为空"));
        }

        let url = Url::parse(trimmed)
            .map_err(|e| ScannerError::invalid_target(format!("无法解析 URL '{trimmed}': {e}")))?;

        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(ScannerError::invalid_target(format!(
                    "不支持的协议: {other}"
                )))
            }
        }

        let domain = match url.host() {
            Some(Host::Domain(host)) => Self::from_host(host),
            Some(Host::Ipv4(ip)) => Self(IpAddr::V4(ip).to_string()),
            Some(Host::Ipv6(ip)) => Self(IpAddr::V6(ip).to_string()),
            None => {
                return Err(ScannerError::invalid_target(format!(
                    "URL 缺少主机名: {trimmed}"
                )))
            }
        };

        Ok((url, domain))
    }

    /// 按公共后缀列表推导 eTLD+1；主机本身就是公共后缀或只有一段时退回整个主机名
    pub fn from_host(host: &str) -> Self {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        match psl::domain_str(&host) {
            Some(domain) => Self(domain.to_string()),
            None => Self(host),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegistrableDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_progress() {
        assert_eq!(clamp_progress(-0.5), 0.0);
        assert_eq!(clamp_progress(0.25), 0.25);
        assert_eq!(clamp_progress(3.0), 1.0);
        assert_eq!(clamp_progress(f64::NAN), 0.0);
        assert_eq!(clamp_progress(f64::INFINITY), 1.0);
    }

    #[test]
    fn test_registrable_domain_from_url() {
        let cases = [
            ("https://example.com", "example.com"),
            ("https://www.Example.COM/path?q=1", "example.com"),
            ("http://a.b.c.example.org:8080/", "example.org"),
            ("https://shop.bbc.co.uk", "bbc.co.uk"),
            ("https://news.example.com.au/x", "example.com.au"),
            ("http://localhost:3000", "localhost"),
            ("http://192.168.1.10/admin", "192.168.1.10"),
            ("https://alice.github.io/blog", "alice.github.io"),
            ("https://www.example.ac.nz", "example.ac.nz"),
            ("https://shop.example.com.pl/cart", "example.com.pl"),
            ("https://Example.COM./", "example.com"),
        ];

        for (input, expected) in cases {
            let (_, domain) = RegistrableDomain::from_url(input).unwrap();
            assert_eq!(domain.as_str(), expected, "输入: {input}");
        }
    }

    #[test]
    fn test_unrelated_sites_on_shared_suffix_stay_distinct() {
        let alice = RegistrableDomain::from_host("alice.github.io");
        let bob = RegistrableDomain::from_host("bob.github.io");
        assert_ne!(alice, bob);
        assert_eq!(RegistrableDomain::from_host("github.io").as_str(), "github.io");
    }

    #[test]
    fn test_registrable_domain_rejects_invalid_targets() {
        for input in ["", "   ", "not a url", "ftp://example.com", "mailto:a@b.com"] {
            let err = RegistrableDomain::from_url(input).unwrap_err();
            assert!(matches!(err, ScannerError::InvalidTarget(_)), "输入: {input}");
        }
    }
}
