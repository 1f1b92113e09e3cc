use std::path::PathBuf;
use std::time::Duration;

/// Where the NetScan web service listens unless told otherwise.
pub const DEFAULT_SERVER: &str = "http://127.0.0.1:5000";

/// Timings that drive one controller session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Period between status polls while a scan is active.
    pub poll_interval: Duration,
    /// Pause between detecting completion and fetching results, so the backend
    /// has stored the finished scan.
    pub settle_delay: Duration,
    /// How long a notification stays in the tray.
    pub toast_ttl: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            settle_delay: Duration::from_secs(1),
            toast_ttl: Duration::from_secs(5),
        }
    }
}

/// Full client configuration, assembled from command-line flags.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server: String,
    pub request_timeout: Duration,
    /// Optional backend path that aborts a running scan (e.g. `/api/stop`).
    /// When unset, stopping only disengages the client.
    pub cancel_path: Option<String>,
    pub export_dir: PathBuf,
    pub session: SessionConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            request_timeout: Duration::from_secs(10),
            cancel_path: None,
            export_dir: PathBuf::from("."),
            session: SessionConfig::default(),
        }
    }
}
