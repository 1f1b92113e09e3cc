//! Interactive console: reads commands from stdin and prints the session.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{anyhow, bail, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::api::ScanService;
use crate::controller::{ScanController, Screen};
use crate::export::ExportFormat;

/// One line typed at the console prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Start a scan; an empty network lets the backend pick the local subnet.
    Start(String),
    Stop,
    Clear,
    Refresh,
    View(u64),
    /// Export a result; without an id the result on screen is used.
    Export {
        id: Option<u64>,
        format: ExportFormat,
    },
    Status,
    Help,
    Quit,
}

pub const HELP: &str = "\
commands:
  start [network]          start a scan (empty = backend default subnet)
  stop                     stop following the active scan
  clear                    delete all stored results
  refresh                  reload results and history
  view <id>                show one result from history
  export [id] [json|csv]   save a result to the export directory
  status                   print the whole screen
  help                     show this help
  quit                     leave the console";

/// Parse one console line.
pub fn parse_command(line: &str) -> Result<ConsoleCommand> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        bail!("empty command");
    };
    let rest: Vec<&str> = words.collect();

    let cmd = match verb.to_ascii_lowercase().as_str() {
        "start" | "scan" => ConsoleCommand::Start(rest.join(" ")),
        "stop" => ConsoleCommand::Stop,
        "clear" => ConsoleCommand::Clear,
        "refresh" | "results" => ConsoleCommand::Refresh,
        "view" | "show" => {
            let id = rest
                .first()
                .ok_or_else(|| anyhow!("usage: view <id>"))?;
            ConsoleCommand::View(parse_id(id)?)
        }
        "export" => {
            let mut id = None;
            let mut format = ExportFormat::default();
            for arg in rest {
                match arg.to_ascii_lowercase().as_str() {
                    "json" => format = ExportFormat::Json,
                    "csv" => format = ExportFormat::Csv,
                    other => id = Some(parse_id(other)?),
                }
            }
            ConsoleCommand::Export { id, format }
        }
        "status" => ConsoleCommand::Status,
        "help" | "?" => ConsoleCommand::Help,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => bail!("unknown command: {other} (try: help)"),
    };
    Ok(cmd)
}

fn parse_id(s: &str) -> Result<u64> {
    s.parse::<u64>()
        .map_err(|_| anyhow!("invalid scan id: {s}"))
}

/// Text form of the whole screen.
pub fn render_screen(screen: &Screen, loading: bool) -> String {
    let mut out = String::new();
    let state = |on: bool| if on { "enabled" } else { "disabled" };
    let _ = writeln!(
        out,
        "start: {}  stop: {}{}",
        state(screen.controls.start_enabled),
        state(screen.controls.stop_enabled),
        if loading { "  (working...)" } else { "" }
    );
    let _ = write!(out, "{}", screen.progress);
    let _ = writeln!(out, "\n== Results ==");
    let _ = write!(out, "{}", screen.results);
    let _ = writeln!(out, "\n== Recent Scans ==");
    let _ = write!(out, "{}", screen.history);
    out
}

async fn dispatch<S: ScanService>(
    controller: &ScanController<S>,
    cmd: ConsoleCommand,
    export_dir: &Path,
) {
    match cmd {
        ConsoleCommand::Start(network) => {
            controller.start_scan(&network).await;
        }
        ConsoleCommand::Stop => controller.stop_scan().await,
        ConsoleCommand::Clear => {
            if controller.clear_results().await {
                print_screen(controller).await;
            }
        }
        ConsoleCommand::Refresh => {
            controller.refresh_results().await;
            print_screen(controller).await;
        }
        ConsoleCommand::View(id) => {
            if controller.load_scan_result(id).await.is_some() {
                print!("{}", controller.screen().await.results);
            }
        }
        ConsoleCommand::Export { id, format } => {
            let id = match id {
                Some(id) => id,
                None => match controller.current_result().await {
                    Some(r) => r.id,
                    None => {
                        eprintln!("no result on screen; use: export <id>");
                        return;
                    }
                },
            };
            match format {
                ExportFormat::Json => controller.export_results(id, export_dir).await,
                ExportFormat::Csv => controller.export_csv(id, export_dir).await,
            };
        }
        ConsoleCommand::Status => print_screen(controller).await,
        ConsoleCommand::Help => println!("{HELP}"),
        ConsoleCommand::Quit => {}
    }
}

async fn print_screen<S: ScanService>(controller: &ScanController<S>) {
    let screen = controller.screen().await;
    print!("{}", render_screen(&screen, controller.is_loading()));
}

/// Run the console until `quit` or end of input.
pub async fn run<S: ScanService>(controller: ScanController<S>, export_dir: &Path) -> Result<()> {
    let mut toasts = controller.notifier().subscribe();
    let mut progress = controller.watch_progress();
    let mut completions = controller.completions();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    controller.load_initial_data().await;
    println!("{HELP}");
    print_screen(&controller).await;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_command(&line) {
                    Ok(ConsoleCommand::Quit) => break,
                    Ok(cmd) => {
                        debug!(?cmd, "console command");
                        dispatch(&controller, cmd, export_dir).await;
                    }
                    Err(e) => eprintln!("{e}"),
                }
            }
            Ok(toast) = toasts.recv() => println!("{toast}"),
            Ok(()) = progress.changed() => {
                let view = progress.borrow_and_update().clone();
                print!("{view}");
            }
            Ok(()) = completions.changed() => {
                completions.borrow_and_update();
                print_screen(&controller).await;
            }
        }
    }

    controller.shutdown().await;
    Ok(())
}
