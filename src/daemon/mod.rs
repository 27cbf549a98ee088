//! Daemon module for continuous reconciliation
//!
//! This module runs stateguard as a long-lived foreground process:
//! - Configuration loading and validation
//! - Structured event logging
//! - The state reconciliation and resource drift loops as independent tasks

pub mod config;
pub mod logging;

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::signal;

use crate::daemon::config::DaemonConfiguration;
use crate::daemon::logging::{level_from_str, DaemonLogger};
use crate::fetch::FsObjectStore;
use crate::monitor::drift::run_drift_loop;
use crate::monitor::state_loop::{run_state_loop, StateChecker, SweepScheduler};
use crate::monitor::ResourceRegistry;
use crate::notify::SlackNotifier;
use crate::store::JsonStore;
use crate::tooling::ToolInvoker;

/// Run both reconciliation loops until a shutdown signal arrives
pub async fn run_daemon(config: DaemonConfiguration, config_path: Option<&Path>) -> Result<()> {
    config.validate().context("Invalid configuration")?;
    let data_dir = config
        .ensure_directories()
        .context("Failed to create required directories")?;

    let logger = DaemonLogger::new(level_from_str(&config.daemon.log_level)?);
    logger.log_startup(config_path, &data_dir);

    let store = Arc::new(JsonStore::new(&data_dir));
    let objects = Arc::new(FsObjectStore::new(&config.objects.root));
    let tools = ToolInvoker::new(config.tool_settings());

    let mut checker = StateChecker::new(store.clone(), objects, tools, config.empty_run_policy())
        .with_logger(logger.clone());
    if let Some(webhook) = &config.notifications.slack_webhook_url {
        checker = checker.with_notifier(Arc::new(SlackNotifier::new(
            webhook.clone(),
            config.notifications.panel_url.clone(),
        )));
    }

    let state_task = tokio::spawn(run_state_loop(
        Arc::new(checker),
        SweepScheduler::new(config.full_sweep_duration()),
        config.forced_poll_duration(),
    ));

    let registry = ResourceRegistry::from_sources(&config.resources, config.tool_settings().timeout);
    let drift_task = if registry.is_empty() {
        log::info!("No resource sources configured; drift detection disabled");
        None
    } else {
        Some(tokio::spawn(run_drift_loop(
            store,
            registry,
            config.drift_duration(),
            logger.clone(),
        )))
    };

    let reason = tokio::select! {
        _ = shutdown_signal() => "Received shutdown signal",
        _ = state_task => "State loop ended",
        _ = async {
            match drift_task {
                Some(task) => {
                    let _ = task.await;
                }
                None => std::future::pending::<()>().await,
            }
        } => "Drift loop ended",
    };

    logger.log_shutdown(reason);
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix
async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                log::warn!("Can't install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
