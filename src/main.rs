#![forbid(unsafe_code)]

use anyhow::Result;
use clap::Parser;

use stateguard::cli::{commands, Cli, Commands};
use stateguard::daemon::config::DaemonConfiguration;
use stateguard::daemon::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The daemon logs at its configured level; one-shot commands only surface warnings
    let level = match &cli.command {
        Commands::Daemon { .. } => DaemonConfiguration::load_or_default(cli.config.as_deref())
            .map(|config| config.daemon.log_level)
            .unwrap_or_else(|_| "info".to_string()),
        _ => "warn".to_string(),
    };
    init_logging(&level);

    let code = commands::run(cli).await?;
    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}
