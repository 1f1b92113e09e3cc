use std::io;
use thiserror::Error;

/// Errors raised while talking to the scan service or writing exports.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never produced a response (connect failure, timeout, reset).
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The backend answered with a non-2xx status.
    #[error("{}", backend_text(.status, .message))]
    Backend { status: u16, message: Option<String> },

    /// The configured server address, or a path joined onto it, is not a URL.
    #[error("invalid URL {url}: {details}")]
    InvalidUrl { url: String, details: String },

    /// The response body did not match the expected shape.
    #[error("unexpected response from {endpoint}: {details}")]
    Decode { endpoint: String, details: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

fn backend_text(status: &u16, message: &Option<String>) -> String {
    match message {
        Some(m) => m.clone(),
        None => format!("backend returned status {status}"),
    }
}

impl ClientError {
    pub fn transport(
        endpoint: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ClientError::Transport {
            endpoint: endpoint.into(),
            source: Box::new(source),
        }
    }

    /// Text shown to the user: the backend's own message when it sent one,
    /// otherwise the caller's fallback.
    pub fn message_or(&self, fallback: &str) -> String {
        match self {
            ClientError::Backend {
                message: Some(m), ..
            } => m.clone(),
            _ => fallback.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
