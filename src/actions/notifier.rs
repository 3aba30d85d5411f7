//! Notification sinks: the gotify CLI, and a log-only fallback.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::config::types::{NotifierBackend, NotifierSettings};
use crate::monitor::actions::{ActionError, NotificationSink};
use crate::system::executor::{Executor, ToolCommand};

/// Pushes messages with `gotify push --title=<title> <message>`.
pub struct GotifyNotifier {
    gotify: ToolCommand,
    exec: Executor,
}

impl GotifyNotifier {
    pub fn new(gotify: ToolCommand, exec: Executor) -> Self {
        Self { gotify, exec }
    }
}

#[async_trait]
impl NotificationSink for GotifyNotifier {
    async fn send(&self, title: &str, message: &str) -> Result<(), ActionError> {
        let title_arg = format!("--title={}", title);
        debug!("Sending gotify notification: {} / {}", title, message);
        self.exec
            .run_tool_checked(&self.gotify, &["push", &title_arg, message])
            .await
            .map(|_| ())
            .map_err(|e| ActionError::NotificationFailed(e.to_string()))
    }
}

/// Writes notifications to the log only.
pub struct LogNotifier;

#[async_trait]
impl NotificationSink for LogNotifier {
    async fn send(&self, title: &str, message: &str) -> Result<(), ActionError> {
        warn!("[{}] {}", title, message);
        Ok(())
    }
}

pub fn build_notifier(settings: &NotifierSettings, exec: Executor) -> Arc<dyn NotificationSink> {
    match settings.backend {
        NotifierBackend::Gotify => {
            Arc::new(GotifyNotifier::new(ToolCommand::new(&settings.gotify_bin), exec))
        }
        NotifierBackend::Log => Arc::new(LogNotifier),
    }
}
