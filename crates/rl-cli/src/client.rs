//! HTTP client for the server's control surface

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{RequestBuilder, Response};

use rl_protocol::api::ADMIN_SECRET_HEADER;
use rl_protocol::{ApiError, ApiResponse, DeviceInfo, DevicesResponse, LockState, MessageRequest};

/// Default request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for one remote-lock server
pub struct LockClient {
    http: reqwest::Client,
    base_url: String,
    secret: Option<String>,
}

impl LockClient {
    /// Create a client; `secret` is only needed for admin calls
    pub fn new(server: &str, secret: Option<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: server.trim_end_matches('/').to_string(),
            secret,
        })
    }

    /// Server base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Current lock state (no credential needed)
    pub async fn status(&self) -> Result<LockState> {
        let response = self.send(self.http.get(self.url("/api/status"))).await?;
        response
            .json::<LockState>()
            .await
            .context("Invalid status response")
    }

    /// Lock, optionally replacing the lock message
    pub async fn lock(&self, message: Option<String>) -> Result<LockState> {
        let request = self
            .admin(self.http.post(self.url("/api/lock")))?
            .json(&MessageRequest { message });
        self.mutate(request).await
    }

    pub async fn unlock(&self) -> Result<LockState> {
        let request = self.admin(self.http.post(self.url("/api/unlock")))?;
        self.mutate(request).await
    }

    /// Replace the lock message without locking
    pub async fn set_message(&self, message: &str) -> Result<LockState> {
        let request = self
            .admin(self.http.post(self.url("/api/message")))?
            .json(&MessageRequest {
                message: Some(message.to_string()),
            });
        self.mutate(request).await
    }

    /// Open device channels
    pub async fn devices(&self) -> Result<Vec<DeviceInfo>> {
        let request = self.admin(self.http.get(self.url("/api/devices")))?;
        let response = self.send(request).await?;
        let body = response
            .json::<DevicesResponse>()
            .await
            .context("Invalid devices response")?;
        Ok(body.devices)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn admin(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let secret = self
            .secret
            .as_deref()
            .context("Admin secret required. Pass --secret or set LOCK_SECRET.")?;
        Ok(request.header(ADMIN_SECRET_HEADER, secret))
    }

    async fn mutate(&self, request: RequestBuilder) -> Result<LockState> {
        let response = self.send(request).await?;
        let body = response
            .json::<ApiResponse>()
            .await
            .context("Invalid response body")?;
        Ok(body.state)
    }

    /// Send a request; non-success statuses become errors carrying the
    /// server's message
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await.with_context(|| {
            format!("Failed to reach server at {}. Is it running?", self.base_url)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        match response.json::<ApiError>().await {
            Ok(error) => anyhow::bail!("{} ({})", error.error, status),
            Err(_) => anyhow::bail!("Server returned {}", status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash() {
        let client = LockClient::new("http://localhost:8000/", None).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert_eq!(client.url("/api/status"), "http://localhost:8000/api/status");
    }

    #[tokio::test]
    async fn test_admin_call_without_secret() {
        let client = LockClient::new("http://127.0.0.1:9", None).unwrap();
        let err = client.unlock().await.unwrap_err();
        assert!(err.to_string().contains("Admin secret required"));
    }
}
