use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber.
///
/// Logs go to stderr so stdout carries only rendered output. `RUST_LOG` wins
/// when set; otherwise `verbose` picks between `info` and `debug` for this
/// crate and `warn` for everything else.
pub fn init_logging(verbose: bool) -> anyhow::Result<()> {
    let default = if verbose {
        "warn,netscan_console=debug"
    } else {
        "warn,netscan_console=info"
    };
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(default))?;

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    let init_result = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .try_init();

    if let Err(e) = init_result {
        // Another subscriber (e.g. from a test harness) is already installed.
        if e.to_string().contains("already been set") {
            return Ok(());
        }
        return Err(e.into());
    }
    Ok(())
}
