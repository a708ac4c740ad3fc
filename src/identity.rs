//! ==============================================================================
//! identity.rs - best-effort device label and public ip detection
//! ==============================================================================
//!
//! purpose:
//!     convenience defaults for the name and ip fields of the recorder.
//!     neither value is authoritative and neither lookup gates anything:
//!     - label: host name + os version when available, else a generic
//!       "platform agent" string, normalized and bounded
//!     - public ip: asks an ip echo service for `{"ip": "..."}`; a 2xx
//!       echo without an address yields an empty string
//!
//! relationships:
//!     - used by: recorder.rs (name fallback), dashboard.rs (detect buttons),
//!       main.rs (prefill)
//!
//! ==============================================================================

use crate::error::IdentityError;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use sysinfo::System;

/// what the platform tells us about itself
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlatformInfo {
    /// structured identification (host name, distribution)
    pub brands: Vec<String>,
    pub platform: Option<String>,
    /// generic fallback signal
    pub generic_platform: String,
    pub agent: String,
}

pub trait LabelProvider: Send + Sync {
    fn detect(&self) -> String;
}

/// reads host identification through sysinfo
#[derive(Debug, Clone)]
pub struct SystemLabelProvider {
    fallback: String,
    max_len: usize,
}

impl SystemLabelProvider {
    pub fn new(fallback: impl Into<String>, max_len: usize) -> Self {
        Self { fallback: fallback.into(), max_len }
    }

    pub fn platform_info() -> PlatformInfo {
        PlatformInfo {
            brands: System::host_name().into_iter().collect(),
            platform: System::long_os_version().or_else(System::name),
            generic_platform: format!("{} {}", std::env::consts::OS, std::env::consts::ARCH),
            agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
        }
    }
}

impl LabelProvider for SystemLabelProvider {
    fn detect(&self) -> String {
        derive_label(&Self::platform_info(), &self.fallback, self.max_len)
    }
}

/// prefer the structured signal, else the generic one; collapse whitespace,
/// keep at most `max_len` characters, substitute `fallback` when empty
pub fn derive_label(info: &PlatformInfo, fallback: &str, max_len: usize) -> String {
    let structured = format!(
        "{} {}",
        info.brands.join(" "),
        info.platform.as_deref().unwrap_or("")
    );
    let mut label = collapse_whitespace(&structured);
    if label.is_empty() {
        label = collapse_whitespace(&format!("{} {}", info.generic_platform, info.agent));
    }

    let label: String = label.chars().take(max_len).collect();
    let label = label.trim_end();
    if label.is_empty() {
        fallback.to_string()
    } else {
        label.to_string()
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[async_trait]
pub trait IpLookup: Send + Sync {
    async fn public_ip(&self) -> Result<String, IdentityError>;
}

#[derive(Debug, Clone)]
pub struct HttpIpLookup {
    client: Client,
    url: String,
}

#[derive(Deserialize)]
struct IpEcho {
    #[serde(default)]
    ip: Option<String>,
}

impl HttpIpLookup {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, IdentityError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IdentityError::Client(e.to_string()))?;
        Ok(Self { client, url: url.into() })
    }
}

#[async_trait]
impl IpLookup for HttpIpLookup {
    async fn public_ip(&self) -> Result<String, IdentityError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| IdentityError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(IdentityError::Status(response.status().as_u16()));
        }

        let echo: IpEcho = response
            .json()
            .await
            .map_err(|e| IdentityError::Request(e.to_string()))?;

        Ok(echo.ip.map(|ip| ip.trim().to_string()).unwrap_or_default())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::{Json, Router};

    /// always returns the same label
    pub(crate) struct FixedLabel(pub String);

    impl LabelProvider for FixedLabel {
        fn detect(&self) -> String {
            self.0.clone()
        }
    }

    fn info(brands: &[&str], platform: Option<&str>) -> PlatformInfo {
        PlatformInfo {
            brands: brands.iter().map(|s| s.to_string()).collect(),
            platform: platform.map(String::from),
            generic_platform: "linux   aarch64".into(),
            agent: "iot-status/0.1.0".into(),
        }
    }

    #[test]
    fn structured_signal_wins() {
        let label = derive_label(&info(&["greenhouse-pi"], Some("Linux 12 Debian")), "Panel", 60);
        assert_eq!(label, "greenhouse-pi Linux 12 Debian");
    }

    #[test]
    fn generic_signal_when_structured_missing() {
        let label = derive_label(&info(&[], None), "Panel", 60);
        assert_eq!(label, "linux aarch64 iot-status/0.1.0");
    }

    #[test]
    fn whitespace_collapsed_and_truncated_by_chars() {
        let long = "ñ".repeat(80);
        let label = derive_label(&info(&["  a\t\tb  "], Some(&long)), "Panel", 60);
        assert_eq!(label.chars().count(), 60);
        assert!(label.starts_with("a b ñ"));
    }

    #[test]
    fn fallback_when_everything_is_blank() {
        let blank = PlatformInfo::default();
        assert_eq!(derive_label(&blank, "IoT Web Panel", 60), "IoT Web Panel");
        assert_eq!(derive_label(&info(&["x"], None), "IoT Web Panel", 0), "IoT Web Panel");
    }

    #[test]
    fn system_provider_never_returns_empty() {
        let label = SystemLabelProvider::new("fallback", 60).detect();
        assert!(!label.is_empty());
        assert!(label.chars().count() <= 60);
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn public_ip_is_read_from_echo() {
        let app = Router::new()
            .route("/ok", get(|| async { Json(serde_json::json!({"ip": "203.0.113.9"})) }))
            .route("/blank", get(|| async { Json(serde_json::json!({"ip": ""})) }))
            .route("/absent", get(|| async { Json(serde_json::json!({})) }))
            .route("/down", get(|| async { StatusCode::SERVICE_UNAVAILABLE }));
        let base = serve(app).await;
        let timeout = Duration::from_secs(5);

        let ok = HttpIpLookup::new(format!("{base}/ok"), timeout).unwrap();
        assert_eq!(ok.public_ip().await.unwrap(), "203.0.113.9");

        let blank = HttpIpLookup::new(format!("{base}/blank"), timeout).unwrap();
        assert_eq!(blank.public_ip().await.unwrap(), "");

        let absent = HttpIpLookup::new(format!("{base}/absent"), timeout).unwrap();
        assert_eq!(absent.public_ip().await.unwrap(), "");

        let down = HttpIpLookup::new(format!("{base}/down"), timeout).unwrap();
        assert!(matches!(down.public_ip().await, Err(IdentityError::Status(503))));
    }
}
