use std::io;
use std::path::{Path, PathBuf};

use csv::Writer;
use tracing::info;

use crate::error::{ClientError, Result};
use crate::render::{HostRow, ONLINE};
use crate::types::ScanResult;

/// Output format of an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ExportFormat {
    /// The backend's own JSON document.
    #[default]
    Json,
    /// Host table synthesized locally.
    Csv,
}

pub const CSV_HEADER: [&str; 6] = [
    "IP Address",
    "Hostname",
    "Device Type",
    "MAC Address",
    "Vendor",
    "Status",
];

pub fn json_file_name(id: u64) -> String {
    format!("netscan_{id}.json")
}

pub fn csv_file_name(id: u64) -> String {
    format!("netscan_{id}.csv")
}

/// Render the hosts of one result as CSV. Unresolved fields read `Unknown`.
pub fn hosts_csv(result: &ScanResult) -> Result<String> {
    let mut writer = Writer::from_writer(vec![]);
    writer.write_record(CSV_HEADER)?;

    for (i, host) in result.host_list().iter().enumerate() {
        let row = HostRow::from_host(i + 1, host);
        writer.write_record([
            row.ip.as_str(),
            row.hostname.as_str(),
            row.device_type.as_str(),
            row.mac_address.as_str(),
            row.vendor.as_str(),
            ONLINE,
        ])?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| ClientError::Io(e.into_error()))?;
    String::from_utf8(bytes).map_err(|e| ClientError::Decode {
        endpoint: format!("result {}", result.id),
        details: e.to_string(),
    })
}

/// Write `bytes` to `dir/name`, creating `dir` when missing.
pub async fn write_export(dir: &Path, name: &str, bytes: &[u8]) -> Result<PathBuf> {
    let file_name = Path::new(name)
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty export file name"))?;
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(file_name);
    tokio::fs::write(&path, bytes).await?;
    info!(path = %path.display(), size = bytes.len(), "export written");
    Ok(path)
}
