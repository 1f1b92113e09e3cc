use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};

use netscan_console::api::HttpScanService;
use netscan_console::config::{ClientConfig, SessionConfig, DEFAULT_SERVER};
use netscan_console::console;
use netscan_console::controller::ScanController;
use netscan_console::export::ExportFormat;
use netscan_console::logging::init_logging;
use netscan_console::netdetect;
use netscan_console::notify::Notifier;

/// netscan-console — terminal client for the NetScan network discovery service.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "netscan-console",
    version,
    about = "Terminal client for the NetScan network discovery service.",
    long_about = None
)]
struct Cli {
    /// Base URL of the NetScan web service.
    #[arg(long, default_value = DEFAULT_SERVER)]
    server: String,

    /// Per-request timeout in milliseconds.
    #[arg(long = "timeout-ms", default_value_t = 10_000)]
    timeout_ms: u64,

    /// Status polling period in milliseconds while a scan runs.
    #[arg(long = "poll-ms", default_value_t = 1_000)]
    poll_ms: u64,

    /// Delay between scan completion and loading its results, in milliseconds.
    #[arg(long = "settle-ms", default_value_t = 1_000)]
    settle_ms: u64,

    /// Seconds a notification stays visible.
    #[arg(long = "toast-secs", default_value_t = 5)]
    toast_secs: u64,

    /// Backend path that aborts a running scan (e.g. /api/stop). Without it,
    /// stopping only detaches the client.
    #[arg(long = "cancel-path")]
    cancel_path: Option<String>,

    /// Directory export files are written to.
    #[arg(long = "export-dir", default_value = ".")]
    export_dir: PathBuf,

    /// Debug logging (RUST_LOG overrides).
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Interactive console (default).
    Console,
    /// Start a scan and follow it to completion. Ctrl+C stops following.
    Scan {
        /// CIDR or range; omitted means the backend's local subnet.
        network: Option<String>,
    },
    /// Show the latest result and recent history.
    Results,
    /// Show one stored result.
    Show { id: u64 },
    /// Export one stored result.
    Export {
        id: u64,
        #[arg(long, value_enum, default_value_t = ExportFormat::Json)]
        format: ExportFormat,
    },
    /// Delete all stored results.
    Clear,
    /// Print the local network the backend would scan by default.
    Suggest,
}

impl Cli {
    fn client_config(&self) -> ClientConfig {
        ClientConfig {
            server: self.server.clone(),
            request_timeout: Duration::from_millis(self.timeout_ms),
            cancel_path: self.cancel_path.clone(),
            export_dir: self.export_dir.clone(),
            session: SessionConfig {
                poll_interval: Duration::from_millis(self.poll_ms.max(1)),
                settle_delay: Duration::from_millis(self.settle_ms),
                toast_ttl: Duration::from_secs(self.toast_secs),
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let config = cli.client_config();
    let command = cli.command.clone().unwrap_or(Command::Console);

    if let Command::Suggest = command {
        return suggest();
    }

    let service = HttpScanService::new(&config)?;
    tracing::debug!(server = %service.base_url(), "using scan service");
    let notifier = Notifier::new(config.session.toast_ttl);
    let controller = ScanController::new(service, notifier, config.session.clone());

    match command {
        Command::Console => {
            if let Some(net) = netdetect::suggest_network() {
                println!("Suggested network: {net} ({} hosts)", netdetect::usable_hosts(net));
            }
            console::run(controller, &config.export_dir).await?;
        }
        Command::Scan { network } => {
            follow_scan(&controller, network.as_deref().unwrap_or("")).await?;
        }
        Command::Results => {
            controller.refresh_results().await;
            flush_toasts(&controller);
            let screen = controller.screen().await;
            print!("{}", screen.results);
            println!();
            print!("{}", screen.history);
        }
        Command::Show { id } => {
            let loaded = controller.load_scan_result(id).await;
            flush_toasts(&controller);
            if loaded.is_none() {
                bail!("could not load scan {id}");
            }
            print!("{}", controller.screen().await.results);
        }
        Command::Export { id, format } => {
            let path = match format {
                ExportFormat::Json => controller.export_results(id, &config.export_dir).await,
                ExportFormat::Csv => controller.export_csv(id, &config.export_dir).await,
            };
            flush_toasts(&controller);
            if path.is_none() {
                bail!("export of scan {id} failed");
            }
        }
        Command::Clear => {
            let cleared = controller.clear_results().await;
            flush_toasts(&controller);
            if !cleared {
                bail!("clearing results failed");
            }
        }
        Command::Suggest => {}
    }

    Ok(())
}

fn suggest() -> Result<()> {
    let nets = netdetect::detect_local_networks()?;
    if nets.is_empty() {
        println!("No local IPv4 networks detected");
    }
    for net in nets {
        println!("{net} ({} hosts)", netdetect::usable_hosts(net));
    }
    Ok(())
}

/// Print whatever is in the notification tray, for one-shot commands.
fn flush_toasts(controller: &ScanController<HttpScanService>) {
    for toast in controller.notifier().visible() {
        eprintln!("{toast}");
    }
}

async fn follow_scan(controller: &ScanController<HttpScanService>, network: &str) -> Result<()> {
    let mut toasts = controller.notifier().subscribe();
    let mut progress = controller.watch_progress();
    let mut done = controller.completions();

    if controller.start_scan(network).await.is_none() {
        flush_toasts(controller);
        bail!("scan did not start");
    }

    loop {
        tokio::select! {
            changed = done.changed() => {
                changed?;
                break;
            }
            Ok(toast) = toasts.recv() => eprintln!("{toast}"),
            Ok(()) = progress.changed() => {
                let view = progress.borrow_and_update().clone();
                print!("{view}");
            }
            _ = tokio::signal::ctrl_c() => {
                controller.stop_scan().await;
                flush_toasts(controller);
                return Ok(());
            }
        }
    }

    while let Ok(toast) = toasts.try_recv() {
        eprintln!("{toast}");
    }
    let screen = controller.screen().await;
    print!("{}", screen.results);
    Ok(())
}
