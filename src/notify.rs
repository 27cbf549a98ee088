//! Failure notifications
//!
//! After a state check whose result has failing features, a short message
//! linking to the log entry is posted to a Slack incoming webhook.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::models::{TrackedState, ValidationLogEntry};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Can't serialize notification: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Webhook request failed: {0}")]
    Request(String),

    #[error("Notification task failed: {0}")]
    Join(String),
}

/// Receives reports of failed state validations
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_failure(&self, state: &TrackedState, entry: &ValidationLogEntry) -> Result<(), NotifyError>;
}

#[derive(Debug, Serialize)]
struct SlackMessage {
    text: String,
}

/// Posts to a Slack incoming webhook
#[derive(Debug, Clone)]
pub struct SlackNotifier {
    webhook_url: String,
    panel_url: String,
}

impl SlackNotifier {
    pub fn new(webhook_url: impl Into<String>, panel_url: impl Into<String>) -> Self {
        Self {
            webhook_url: webhook_url.into(),
            panel_url: panel_url.into(),
        }
    }

    /// Link to the log entry on the web panel
    pub fn log_url(&self, entry: &ValidationLogEntry) -> String {
        format!("{}/logs/{}", self.panel_url.trim_end_matches('/'), entry.id)
    }

    pub fn failure_text(&self, state: &TrackedState, entry: &ValidationLogEntry) -> String {
        format!(
            "Automatic state validation failed for state at {}. See details at {}.",
            state.location(),
            self.log_url(entry)
        )
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn notify_failure(&self, state: &TrackedState, entry: &ValidationLogEntry) -> Result<(), NotifyError> {
        let payload = serde_json::to_string(&SlackMessage {
            text: self.failure_text(state, entry),
        })?;
        let webhook_url = self.webhook_url.clone();

        // ureq is synchronous, so wrap in spawn_blocking
        tokio::task::spawn_blocking(move || post_form(&webhook_url, &payload))
            .await
            .map_err(|e| NotifyError::Join(e.to_string()))?
    }
}

fn post_form(url: &str, payload: &str) -> Result<(), NotifyError> {
    let agent = ureq::Agent::new_with_defaults();
    agent
        .post(url)
        .send_form([("payload", payload)])
        .map_err(|e| NotifyError::Request(e.to_string()))?;
    Ok(())
}
