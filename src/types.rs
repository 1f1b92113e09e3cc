use serde::{Deserialize, Serialize};

/// Body of `POST /api/scan`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub network: String,
}

impl ScanRequest {
    /// Build a request from raw user input. Only surrounding whitespace is removed;
    /// an empty network is passed through and left for the backend to resolve.
    pub fn new(raw: &str) -> Self {
        Self {
            network: raw.trim().to_string(),
        }
    }
}

/// Success body of `POST /api/scan`. The backend echoes the network it resolved.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct ScanStarted {
    #[serde(default)]
    pub network: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Live progress as reported by `GET /api/status`.
///
/// `progress` and `total_hosts` are signed: the backend derives the host count
/// from the network size minus two, which goes negative for /32 targets and
/// stays that way after the scan finishes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct ScanStatus {
    #[serde(default)]
    pub running: bool,
    #[serde(default)]
    pub progress: i64,
    #[serde(default)]
    pub current_scan: Option<String>,
    #[serde(default)]
    pub scanned_hosts: u64,
    #[serde(default)]
    pub found_hosts: u64,
    #[serde(default)]
    pub total_hosts: Option<i64>,
}

/// One discovered host, normalized at deserialization time.
///
/// Older backends report hosts as bare address strings; newer ones send objects
/// with identification metadata. Both shapes end up here.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(from = "WireHost")]
pub struct Host {
    pub ip: String,
    pub hostname: Option<String>,
    pub device_type: Option<String>,
    pub mac_address: Option<String>,
    pub vendor: Option<String>,
}

impl Host {
    pub fn bare(ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            ..Self::default()
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum WireHost {
    Bare(String),
    Detailed {
        ip: String,
        #[serde(default)]
        hostname: Option<String>,
        #[serde(default)]
        device_type: Option<String>,
        #[serde(default)]
        mac_address: Option<String>,
        #[serde(default)]
        vendor: Option<String>,
    },
}

impl From<WireHost> for Host {
    fn from(wire: WireHost) -> Self {
        match wire {
            WireHost::Bare(ip) => Host::bare(ip),
            WireHost::Detailed {
                ip,
                hostname,
                device_type,
                mac_address,
                vendor,
            } => Host {
                ip,
                hostname: non_empty(hostname),
                device_type: non_empty(device_type),
                mac_address: non_empty(mac_address),
                vendor: non_empty(vendor),
            },
        }
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}

/// A stored scan as returned by `GET /api/results` and `GET /api/results/{id}`.
///
/// Failed scans are stored as stubs carrying `error` and no `hosts`, so every
/// field except `id` is optional on the wire.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct ScanResult {
    pub id: u64,
    #[serde(default)]
    pub network: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hosts: Option<Vec<Host>>,
    #[serde(default)]
    pub total_found: u64,
    #[serde(default)]
    pub total_scanned: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScanResult {
    /// Failed entries are the ones the backend stored without a host list.
    pub fn is_failed(&self) -> bool {
        self.hosts.is_none()
    }

    pub fn host_list(&self) -> &[Host] {
        self.hosts.as_deref().unwrap_or(&[])
    }
}

/// Error body the backend sends alongside a non-2xx status.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}
