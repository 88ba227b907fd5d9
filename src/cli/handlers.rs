//! CLI command handler: load settings, install Ctrl+C, run until interrupted.

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::cli::arg_parser::Cli;
use crate::pipeline::Shutdown;
use crate::run_ingestor;
use crate::utils::{Settings, setup_logging};

fn load_settings(cli: &Cli) -> Result<Settings> {
    setup_logging(cli.verbose());
    let settings = Settings::load(cli.config.as_deref(), &cli.overrides())?;
    debug!(
        "{} CONFIG:{:#?}",
        env!("CARGO_PKG_NAME").to_uppercase(),
        settings
    );
    Ok(settings)
}

/// Run the ingestor until Ctrl+C. Returns an error only for startup failures.
pub fn handle_run(cli: &Cli) -> Result<()> {
    let settings = load_settings(cli)?;
    let shutdown = Shutdown::new();
    let handler_shutdown = shutdown.clone();
    ctrlc::set_handler(move || {
        handler_shutdown.trigger();
    })
    .context("set Ctrl+C handler")?;

    let summary = run_ingestor(&settings, shutdown)?;
    info!("Shut down after finalizing {} files", summary.files_finalized);
    if !summary.left_claimed.is_empty() {
        warn!(
            "{} files remain claimed without being finalized: {}",
            summary.left_claimed.len(),
            summary.left_claimed.join(", ")
        );
    }
    Ok(())
}
