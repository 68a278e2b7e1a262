//! HTTP access to the plotter firmware
//!
//! [`DeviceApi`] is the seam the poller, the diagnostics cache and the job
//! session talk through; [`DeviceClient`] implements it over `reqwest`.

use std::time::Duration;

use async_trait::async_trait;
use muralkit_core::NetworkError;
use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL};
use tracing::{debug, trace};

use crate::diag::{decode_diagnostics, DeviceDiagnostics};
use crate::status::DeviceStatus;

/// Telemetry endpoint
pub const STATUS_ENDPOINT: &str = "/status";
/// Diagnostics endpoint
pub const DIAG_ENDPOINT: &str = "/diag";
/// Command stream endpoint
pub const COMMANDS_ENDPOINT: &str = "/downloadCommands";

/// Operations the application needs from a device
#[async_trait]
pub trait DeviceApi: Send + Sync {
    /// Fetch and decode one `/status` response
    async fn fetch_status(&self) -> Result<DeviceStatus, NetworkError>;

    /// Fetch and decode `/diag`
    async fn fetch_diagnostics(&self) -> Result<DeviceDiagnostics, NetworkError>;

    /// Download the stored command stream as text
    async fn download_commands(&self, timeout: Duration) -> Result<String, NetworkError>;
}

/// `reqwest`-backed device client
#[derive(Debug, Clone)]
pub struct DeviceClient {
    base_url: String,
    http: reqwest::Client,
}

impl DeviceClient {
    /// Create a client for the device at `base_url` (`http://` or `https://`).
    pub fn new(base_url: &str) -> Result<Self, NetworkError> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let invalid = |reason: &str| NetworkError::InvalidUrl {
            url: base_url.to_string(),
            reason: reason.to_string(),
        };

        let host = trimmed
            .strip_prefix("http://")
            .or_else(|| trimmed.strip_prefix("https://"))
            .ok_or_else(|| invalid("scheme must be http or https"))?;
        if host.is_empty() {
            return Err(invalid("missing host"));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| invalid(&e.to_string()))?;

        debug!("Device client for {}", trimmed);
        Ok(Self {
            base_url: trimmed.to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for an endpoint path
    pub fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    async fn get_text(&self, endpoint: &str, timeout: Option<Duration>) -> Result<String, NetworkError> {
        let mut request = self.http.get(self.url(endpoint));
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }

        let map_err = |e: reqwest::Error| map_reqwest_error(endpoint, timeout, e);
        let response = request.send().await.map_err(map_err)?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(map_err)?;
        trace!("GET {} -> {} bytes", endpoint, body.len());
        Ok(body)
    }
}

fn map_reqwest_error(endpoint: &str, timeout: Option<Duration>, e: reqwest::Error) -> NetworkError {
    if e.is_timeout() {
        NetworkError::Timeout {
            endpoint: endpoint.to_string(),
            timeout_ms: timeout.map(|t| t.as_millis() as u64).unwrap_or(0),
        }
    } else if e.is_decode() {
        NetworkError::Decode {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        }
    } else {
        NetworkError::Transport {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl DeviceApi for DeviceClient {
    async fn fetch_status(&self) -> Result<DeviceStatus, NetworkError> {
        let body = self.get_text(STATUS_ENDPOINT, None).await?;
        DeviceStatus::from_body(&body).map_err(|e| NetworkError::Decode {
            endpoint: STATUS_ENDPOINT.to_string(),
            reason: e.to_string(),
        })
    }

    async fn fetch_diagnostics(&self) -> Result<DeviceDiagnostics, NetworkError> {
        let body = self.get_text(DIAG_ENDPOINT, None).await?;
        decode_diagnostics(DIAG_ENDPOINT, &body)
    }

    async fn download_commands(&self, timeout: Duration) -> Result<String, NetworkError> {
        let body = self.get_text(COMMANDS_ENDPOINT, Some(timeout)).await?;
        debug!("Downloaded {} bytes of commands", body.len());
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_normalized() {
        let client = DeviceClient::new("http://192.168.4.1/").unwrap();
        assert_eq!(client.base_url(), "http://192.168.4.1");
        assert_eq!(client.url(STATUS_ENDPOINT), "http://192.168.4.1/status");
    }

    #[test]
    fn test_rejects_bad_urls() {
        assert!(matches!(
            DeviceClient::new("ftp://plotter"),
            Err(NetworkError::InvalidUrl { .. })
        ));
        assert!(matches!(
            DeviceClient::new("http://"),
            Err(NetworkError::InvalidUrl { .. })
        ));
        assert!(DeviceClient::new("https://mural.local").is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_device_is_transport_error() {
        // Port 9 on localhost refuses connections on typical hosts
        let client = DeviceClient::new("http://127.0.0.1:9").unwrap();
        let err = client.fetch_status().await.unwrap_err();
        assert!(matches!(
            err,
            NetworkError::Transport { .. } | NetworkError::Timeout { .. }
        ));
    }
}
