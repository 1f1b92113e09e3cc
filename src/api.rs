//! The scan service seam.
//!
//! The controller only talks to the backend through [`ScanService`], so the
//! HTTP client can be swapped for an in-memory fake in tests.

use std::path::Path;

use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::types::{ErrorBody, ScanRequest, ScanResult, ScanStarted, ScanStatus};

/// Result of asking the backend to abort a running scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The backend acknowledged the cancellation.
    Cancelled,
    /// No cancellation endpoint is known; the backend scan keeps running.
    Unsupported,
}

/// A file produced by the backend export endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Operations the remote scan service offers.
#[async_trait]
pub trait ScanService: Send + Sync + 'static {
    /// Ask the backend to start scanning `request.network`.
    async fn start_scan(&self, request: &ScanRequest) -> Result<ScanStarted>;

    /// Abort the running scan, if the backend supports it.
    async fn cancel_scan(&self) -> Result<CancelOutcome> {
        Ok(CancelOutcome::Unsupported)
    }

    /// Drop every stored result.
    async fn clear_results(&self) -> Result<()>;

    /// Current progress of the active scan.
    async fn status(&self) -> Result<ScanStatus>;

    /// All stored results, oldest first.
    async fn results(&self) -> Result<Vec<ScanResult>>;

    /// One stored result.
    async fn result(&self, id: u64) -> Result<ScanResult>;

    /// The backend's downloadable export for one result.
    async fn export(&self, id: u64) -> Result<ExportFile>;
}

/// [`ScanService`] over the NetScan HTTP API.
#[derive(Debug, Clone)]
pub struct HttpScanService {
    client: Client,
    base: Url,
    cancel_path: Option<String>,
}

impl HttpScanService {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut raw = config.server.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        let base = Url::parse(&raw).map_err(|e| ClientError::InvalidUrl {
            url: config.server.clone(),
            details: e.to_string(),
        })?;
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ClientError::transport(config.server.clone(), e))?;
        Ok(Self {
            client,
            base,
            cancel_path: config.cancel_path.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| ClientError::InvalidUrl {
                url: path.to_string(),
                details: e.to_string(),
            })
    }

    /// Send a request and turn non-2xx answers into [`ClientError::Backend`].
    async fn send(&self, req: RequestBuilder, endpoint: &str) -> Result<Response> {
        debug!(endpoint, "sending request");
        let resp = req
            .send()
            .await
            .map_err(|e| ClientError::transport(endpoint, e))?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.bytes().await.unwrap_or_default();
        let message = serde_json::from_slice::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.error);
        debug!(endpoint, status = status.as_u16(), ?message, "backend rejected request");
        Err(ClientError::Backend {
            status: status.as_u16(),
            message,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path)?;
        let resp = self.send(self.client.get(url), path).await?;
        decode(resp, path).await
    }
}

async fn decode<T: DeserializeOwned>(resp: Response, endpoint: &str) -> Result<T> {
    let body = resp
        .bytes()
        .await
        .map_err(|e| ClientError::transport(endpoint, e))?;
    serde_json::from_slice(&body).map_err(|e| ClientError::Decode {
        endpoint: endpoint.to_string(),
        details: e.to_string(),
    })
}

/// Pull `filename=` out of a `Content-Disposition` value, keeping only the final
/// path component.
pub fn attachment_file_name(disposition: &str) -> Option<String> {
    let raw = disposition
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))?;
    let name = raw.trim_matches('"');
    Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl ScanService for HttpScanService {
    async fn start_scan(&self, request: &ScanRequest) -> Result<ScanStarted> {
        let path = "api/scan";
        let resp = self
            .send(self.client.post(self.url(path)?).json(request), path)
            .await?;
        decode(resp, path).await
    }

    async fn cancel_scan(&self) -> Result<CancelOutcome> {
        let Some(path) = self.cancel_path.as_deref() else {
            return Ok(CancelOutcome::Unsupported);
        };
        self.send(self.client.post(self.url(path)?), path).await?;
        Ok(CancelOutcome::Cancelled)
    }

    async fn clear_results(&self) -> Result<()> {
        let path = "api/clear";
        self.send(self.client.post(self.url(path)?), path).await?;
        Ok(())
    }

    async fn status(&self) -> Result<ScanStatus> {
        self.get_json("api/status").await
    }

    async fn results(&self) -> Result<Vec<ScanResult>> {
        self.get_json("api/results").await
    }

    async fn result(&self, id: u64) -> Result<ScanResult> {
        self.get_json(&format!("api/results/{id}")).await
    }

    async fn export(&self, id: u64) -> Result<ExportFile> {
        let path = format!("api/export/{id}");
        let resp = self.send(self.client.get(self.url(&path)?), &path).await?;
        let file_name = resp
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(attachment_file_name)
            .unwrap_or_else(|| crate::export::json_file_name(id));
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ClientError::transport(path.as_str(), e))?;
        Ok(ExportFile {
            file_name,
            bytes: bytes.to_vec(),
        })
    }
}
