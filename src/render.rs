//! Pure mapping from scan data to display structures, plus their text form.

use std::fmt;

use crate::types::{Host, ScanResult, ScanStatus};

/// Placeholder for any host field the backend did not resolve.
pub const UNKNOWN: &str = "Unknown";
/// Hostnames longer than this are cut and suffixed with `...`.
pub const HOSTNAME_MAX: usize = 20;
/// Number of entries the history panel shows.
pub const HISTORY_LIMIT: usize = 5;
/// Only live hosts are ever reported, so every row reads the same.
pub const ONLINE: &str = "Online";

const UNIDENTIFIED_DEVICE: &str = "Unknown Device";

/// What the results panel shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultsView {
    /// Nothing loaded yet, or results were cleared.
    NoResults,
    /// The scan itself failed on the backend.
    Failed { message: String },
    /// The scan ran but found nobody.
    NoDevices {
        network: String,
        total_scanned: u64,
        duration: String,
    },
    Table { summary: Summary, rows: Vec<HostRow> },
}

impl ResultsView {
    /// Summary cards are only shown alongside a host table.
    pub fn summary(&self) -> Option<&Summary> {
        match self {
            ResultsView::Table { summary, .. } => Some(summary),
            _ => None,
        }
    }

    pub fn rows(&self) -> &[HostRow] {
        match self {
            ResultsView::Table { rows, .. } => rows,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub total_found: u64,
    /// Hosts whose device type the backend could classify.
    pub identified: usize,
    pub duration: String,
    pub coverage_percent: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRow {
    /// 1-based position in the table.
    pub index: usize,
    pub ip: String,
    pub status: &'static str,
    pub device_type: String,
    pub hostname: String,
    /// `hostname` cut to [`HOSTNAME_MAX`] characters for the table cell.
    pub hostname_short: String,
    pub mac_address: String,
    pub vendor: String,
}

impl HostRow {
    pub fn from_host(index: usize, host: &Host) -> Self {
        let hostname = or_unknown(&host.hostname);
        Self {
            index,
            ip: host.ip.clone(),
            status: ONLINE,
            device_type: or_unknown(&host.device_type),
            hostname_short: truncate_hostname(&hostname),
            hostname,
            mac_address: or_unknown(&host.mac_address),
            vendor: or_unknown(&host.vendor),
        }
    }
}

/// What the history panel shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryView {
    Empty,
    Entries(Vec<HistoryEntry>),
}

impl HistoryView {
    pub fn entries(&self) -> &[HistoryEntry] {
        match self {
            HistoryView::Entries(e) => e,
            HistoryView::Empty => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub id: u64,
    pub network: String,
    pub timestamp: String,
    /// Absent for failed scans.
    pub device_count: Option<u64>,
    pub action: HistoryAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryAction {
    /// Load the result with this id into the results panel.
    View(u64),
    /// The scan failed; nothing to view.
    Failed,
}

/// The progress section shown while a scan runs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProgressView {
    pub visible: bool,
    pub title: String,
    pub percent: u32,
    pub found: u64,
    pub scanned: u64,
    pub total: Option<u64>,
}

impl ProgressView {
    pub fn hidden() -> Self {
        Self::default()
    }

    /// Freshly shown section, before the first status arrives.
    pub fn started(network: &str) -> Self {
        Self {
            visible: true,
            title: scanning_title(Some(network)),
            ..Self::default()
        }
    }

    pub fn from_status(status: &ScanStatus) -> Self {
        Self {
            visible: true,
            title: scanning_title(status.current_scan.as_deref()),
            percent: status.progress.clamp(0, 100) as u32,
            found: status.found_hosts,
            scanned: status.scanned_hosts,
            total: status.total_hosts.and_then(|t| u64::try_from(t).ok()),
        }
    }
}

fn scanning_title(network: Option<&str>) -> String {
    match network.filter(|n| !n.is_empty()) {
        Some(n) => format!("Scanning {n}"),
        None => "Scanning Network".to_string(),
    }
}

/// Map one result to the results panel.
pub fn render_result(result: &ScanResult) -> ResultsView {
    if let Some(message) = &result.error {
        return ResultsView::Failed {
            message: message.clone(),
        };
    }

    let hosts = result.host_list();
    if hosts.is_empty() {
        return ResultsView::NoDevices {
            network: result.network.clone(),
            total_scanned: result.total_scanned,
            duration: duration_or_zero(result),
        };
    }

    let summary = Summary {
        total_found: result.total_found,
        identified: hosts
            .iter()
            .filter(|h| {
                h.device_type
                    .as_deref()
                    .is_some_and(|t| t != UNIDENTIFIED_DEVICE)
            })
            .count(),
        duration: duration_or_zero(result),
        coverage_percent: coverage_percent(result.total_found, result.total_scanned),
    };
    let rows = hosts
        .iter()
        .enumerate()
        .map(|(i, h)| HostRow::from_host(i + 1, h))
        .collect();
    ResultsView::Table { summary, rows }
}

/// Map the full result list (oldest first) to the history panel.
pub fn render_history(results: &[ScanResult]) -> HistoryView {
    if results.is_empty() {
        return HistoryView::Empty;
    }
    let start = results.len().saturating_sub(HISTORY_LIMIT);
    let entries = results[start..]
        .iter()
        .rev()
        .map(|r| HistoryEntry {
            id: r.id,
            network: r.network.clone(),
            timestamp: r.timestamp.clone(),
            device_count: (!r.is_failed()).then_some(r.total_found),
            action: if r.is_failed() {
                HistoryAction::Failed
            } else {
                HistoryAction::View(r.id)
            },
        })
        .collect();
    HistoryView::Entries(entries)
}

/// Share of scanned addresses that answered, rounded to a whole percent.
pub fn coverage_percent(found: u64, scanned: u64) -> u64 {
    if scanned == 0 {
        return 0;
    }
    (found as f64 / scanned as f64 * 100.0).round() as u64
}

pub fn truncate_hostname(name: &str) -> String {
    if name.chars().count() > HOSTNAME_MAX {
        let mut cut: String = name.chars().take(HOSTNAME_MAX).collect();
        cut.push_str("...");
        cut
    } else {
        name.to_string()
    }
}

fn or_unknown(field: &Option<String>) -> String {
    field.clone().unwrap_or_else(|| UNKNOWN.to_string())
}

fn duration_or_zero(result: &ScanResult) -> String {
    result.duration.clone().unwrap_or_else(|| "0s".to_string())
}

impl fmt::Display for ResultsView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultsView::NoResults => {
                writeln!(f, "No Scan Results")?;
                writeln!(f, "Start a network scan to discover devices (command: start)")
            }
            ResultsView::Failed { message } => {
                writeln!(f, "Scan Error")?;
                writeln!(f, "{message}")?;
                writeln!(f, "Try again with: start")
            }
            ResultsView::NoDevices {
                network,
                total_scanned,
                duration,
            } => {
                writeln!(f, "No Devices Found")?;
                writeln!(f, "No active devices were discovered on network {network}")?;
                writeln!(f, "Scanned {total_scanned} addresses in {duration}")
            }
            ResultsView::Table { summary, rows } => {
                write!(f, "{summary}")?;
                write_host_table(f, rows)
            }
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Devices: {}  Identified: {}  Duration: {}  Coverage: {}%",
            self.total_found, self.identified, self.duration, self.coverage_percent
        )
    }
}

fn write_host_table(f: &mut fmt::Formatter<'_>, rows: &[HostRow]) -> fmt::Result {
    let headers = ["#", "IP Address", "Status", "Device Type", "Hostname", "MAC Address"];
    let cells: Vec<[String; 6]> = rows
        .iter()
        .map(|r| {
            [
                r.index.to_string(),
                r.ip.clone(),
                r.status.to_string(),
                r.device_type.clone(),
                r.hostname_short.clone(),
                r.mac_address.clone(),
            ]
        })
        .collect();

    let mut widths = headers.map(|h| h.chars().count());
    for row in &cells {
        for (w, c) in widths.iter_mut().zip(row.iter()) {
            *w = (*w).max(c.chars().count());
        }
    }

    write_row(f, &headers.map(str::to_string), &widths)?;
    let rule = widths.map(|w| "-".repeat(w));
    write_row(f, &rule, &widths)?;
    for row in &cells {
        write_row(f, row, &widths)?;
    }
    Ok(())
}

fn write_row(f: &mut fmt::Formatter<'_>, cells: &[String; 6], widths: &[usize; 6]) -> fmt::Result {
    let line = cells
        .iter()
        .zip(widths.iter())
        .map(|(c, w)| format!("{c:<w$}", w = *w))
        .collect::<Vec<_>>()
        .join("  ");
    writeln!(f, "{}", line.trim_end())
}

impl fmt::Display for HistoryView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = match self {
            HistoryView::Empty => return writeln!(f, "No scan history available"),
            HistoryView::Entries(e) => e,
        };
        let net_w = entries
            .iter()
            .map(|e| e.network.chars().count())
            .max()
            .unwrap_or(0)
            .max("network".len());
        for e in entries {
            let detail = match (e.action, e.device_count) {
                (HistoryAction::View(id), Some(n)) => format!("{n} devices  [view {id}]"),
                (HistoryAction::View(id), None) => format!("[view {id}]"),
                (HistoryAction::Failed, _) => "[error]".to_string(),
            };
            writeln!(
                f,
                "#{:<4} {:<net_w$}  {}  {}",
                e.id,
                e.network,
                e.timestamp,
                detail,
                net_w = net_w
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for ProgressView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.visible {
            return Ok(());
        }
        const BAR: usize = 30;
        let filled = (self.percent.min(100) as usize * BAR) / 100;
        let total = self
            .total
            .map(|t| format!("/{t}"))
            .unwrap_or_default();
        writeln!(
            f,
            "{} [{}{}] {:>3}%  found {}  scanned {}{}",
            self.title,
            "#".repeat(filled),
            ".".repeat(BAR - filled),
            self.percent,
            self.found,
            self.scanned,
            total
        )
    }
}
