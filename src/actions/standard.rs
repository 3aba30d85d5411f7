//! The action set shared by all monitor kinds: notify, run a hook command,
//! stop/start dependent workloads, and remediate.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::monitor::actions::{ActionError, ActionSet, NotificationSink, WorkloadController};
use crate::monitor::signal::Signal;
use crate::system::executor::{Executor, ToolCommand};

/// Notification title and body with `{{HOSTNAME}}`, `{{SUBJECT}}`,
/// `{{VALUE}}` and `{{THRESHOLD}}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTemplate {
    pub title: String,
    pub body: String,
}

impl MessageTemplate {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
        }
    }

    pub fn render(
        &self,
        hostname: &str,
        subject: &str,
        signal: &Signal,
        threshold: Option<f64>,
    ) -> (String, String) {
        let value = signal.to_string();
        let threshold = threshold.map(|t| format!("{:.1}", t)).unwrap_or_default();
        let fill = |template: &str| {
            template
                .replace("{{HOSTNAME}}", hostname)
                .replace("{{SUBJECT}}", subject)
                .replace("{{VALUE}}", &value)
                .replace("{{THRESHOLD}}", &threshold)
        };
        (fill(&self.title), fill(&self.body))
    }
}

struct Workloads {
    controller: Arc<dyn WorkloadController>,
    ids: Vec<String>,
}

pub struct MonitorActions {
    notifier: Arc<dyn NotificationSink>,
    exec: Executor,
    hostname: String,
    threshold: Option<f64>,
    alert: MessageTemplate,
    recovery: Option<MessageTemplate>,
    alert_command: Option<String>,
    remediation: Option<ToolCommand>,
    workloads: Option<Workloads>,
}

impl MonitorActions {
    pub fn new(
        notifier: Arc<dyn NotificationSink>,
        exec: Executor,
        hostname: impl Into<String>,
        alert: MessageTemplate,
    ) -> Self {
        Self {
            notifier,
            exec,
            hostname: hostname.into(),
            threshold: None,
            alert,
            recovery: None,
            alert_command: None,
            remediation: None,
            workloads: None,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_recovery_message(mut self, template: MessageTemplate) -> Self {
        self.recovery = Some(template);
        self
    }

    /// Shell command run on every alert.
    pub fn with_alert_command(mut self, command: Option<String>) -> Self {
        self.alert_command = command.filter(|c| !c.trim().is_empty());
        self
    }

    pub fn with_remediation(mut self, command: ToolCommand) -> Self {
        self.remediation = Some(command);
        self
    }

    /// Workloads stopped on alert and started again on recovery.
    pub fn with_workloads(
        mut self,
        controller: Arc<dyn WorkloadController>,
        ids: Vec<String>,
    ) -> Self {
        if !ids.is_empty() {
            self.workloads = Some(Workloads { controller, ids });
        }
        self
    }

    async fn notify(&self, template: &MessageTemplate, subject: &str, signal: &Signal) {
        let (title, message) = template.render(&self.hostname, subject, signal, self.threshold);
        info!("{}", message);
        if let Err(e) = self.notifier.send(&title, &message).await {
            warn!("Notification failed: {}", e);
        }
    }
}

#[async_trait]
impl ActionSet for MonitorActions {
    async fn on_alert(&self, subject: &str, signal: &Signal) {
        self.notify(&self.alert, subject, signal).await;

        if let Some(command) = &self.alert_command {
            info!("Running alert command: {}", command);
            if let Err(e) = self.exec.run_shell(command).await {
                warn!("{}", ActionError::CommandFailed(e.to_string()));
            }
        }

        if let Some(workloads) = &self.workloads {
            for id in &workloads.ids {
                if let Err(e) = workloads.controller.stop(id).await {
                    warn!("{}", e);
                }
            }
        }
    }

    fn has_recovery(&self) -> bool {
        self.recovery.is_some() || self.workloads.is_some()
    }

    async fn on_recover(&self, subject: &str, signal: &Signal) {
        if let Some(workloads) = &self.workloads {
            for id in &workloads.ids {
                if let Err(e) = workloads.controller.start(id).await {
                    warn!("{}", e);
                }
            }
        }

        if let Some(template) = &self.recovery {
            self.notify(template, subject, signal).await;
        }
    }

    fn suppresses_workloads(&self) -> bool {
        self.workloads.is_some()
    }

    async fn remediate(&self) {
        if let Some(command) = &self.remediation {
            info!("Attempting remediation: {} {}", command.program, command.base_args.join(" "));
            if let Err(e) = self.exec.run_tool_checked(command, &[]).await {
                warn!("{}", ActionError::RemediationFailed(e.to_string()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn send(&self, title: &str, message: &str) -> Result<(), ActionError> {
            self.sent.lock().unwrap().push((title.to_string(), message.to_string()));
            if self.fail {
                return Err(ActionError::NotificationFailed("transport down".to_string()));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingWorkloads {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl WorkloadController for RecordingWorkloads {
        async fn start(&self, workload: &str) -> Result<(), ActionError> {
            self.calls.lock().unwrap().push(format!("start {}", workload));
            Ok(())
        }

        async fn stop(&self, workload: &str) -> Result<(), ActionError> {
            self.calls.lock().unwrap().push(format!("stop {}", workload));
            if workload == "broken" {
                return Err(ActionError::WorkloadFailed {
                    verb: "stop",
                    workload: workload.to_string(),
                    reason: "exit 1".to_string(),
                });
            }
            Ok(())
        }
    }

    fn exec() -> Executor {
        Executor::new(Duration::from_secs(5))
    }

    #[test]
    fn template_fills_every_placeholder() {
        let template = MessageTemplate::new(
            "{{HOSTNAME}}",
            "{{SUBJECT}} is at {{VALUE}}°C (limit {{THRESHOLD}}°C)",
        );
        let (title, body) =
            template.render("nas", "coretemp-isa-0000", &Signal::Numeric(81.5), Some(80.0));
        assert_eq!(title, "nas");
        assert_eq!(body, "coretemp-isa-0000 is at 81.50°C (limit 80.0°C)");
    }

    #[tokio::test]
    async fn alert_stops_workloads_in_order_and_recovery_restarts_them() {
        let sink = Arc::new(RecordingSink::default());
        let workloads = Arc::new(RecordingWorkloads::default());
        let actions = MonitorActions::new(
            sink.clone(),
            exec(),
            "nas",
            MessageTemplate::new("{{HOSTNAME}}", "{{SUBJECT}} is disconnected."),
        )
        .with_recovery_message(MessageTemplate::new("{{HOSTNAME}}", "{{SUBJECT}} reconnected."))
        .with_workloads(workloads.clone(), vec!["sabnzbd".to_string(), "sonarr".to_string()]);

        assert!(actions.has_recovery());
        assert!(actions.suppresses_workloads());

        actions.on_alert("/mnt/media", &Signal::Mounted(false)).await;
        actions.on_recover("/mnt/media", &Signal::Mounted(true)).await;

        assert_eq!(
            *workloads.calls.lock().unwrap(),
            ["stop sabnzbd", "stop sonarr", "start sabnzbd", "start sonarr"]
        );
        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent[0], ("nas".to_string(), "/mnt/media is disconnected.".to_string()));
        assert_eq!(sent[1], ("nas".to_string(), "/mnt/media reconnected.".to_string()));
    }

    #[tokio::test]
    async fn failures_do_not_stop_remaining_actions() {
        let sink = Arc::new(RecordingSink {
            fail: true,
            ..Default::default()
        });
        let workloads = Arc::new(RecordingWorkloads::default());
        let ids = vec!["broken".to_string(), "radarr".to_string()];
        let actions =
            MonitorActions::new(sink.clone(), exec(), "nas", MessageTemplate::new("t", "b"))
                .with_workloads(workloads.clone(), ids);

        actions.on_alert("/", &Signal::Numeric(97.0)).await;

        assert_eq!(sink.sent.lock().unwrap().len(), 1);
        assert_eq!(*workloads.calls.lock().unwrap(), ["stop broken", "stop radarr"]);
    }

    #[tokio::test]
    async fn plain_notifier_has_no_recovery_hook() {
        let sink = Arc::new(RecordingSink::default());
        let actions = MonitorActions::new(
            sink,
            exec(),
            "nas",
            MessageTemplate::new("Drive Failure Alert", "{{SUBJECT}} is failing!"),
        )
        .with_workloads(Arc::new(RecordingWorkloads::default()), Vec::new());
        assert!(!actions.has_recovery());
        assert!(!actions.suppresses_workloads());
    }

    #[tokio::test]
    async fn alert_command_and_remediation_run() {
        let dir = tempfile::tempdir().unwrap();
        let hook = dir.path().join("hook");
        let remount = dir.path().join("remount");
        let actions = MonitorActions::new(
            Arc::new(RecordingSink::default()),
            exec(),
            "nas",
            MessageTemplate::new("t", "b"),
        )
        .with_alert_command(Some(format!("touch '{}'", hook.display())))
        .with_remediation(ToolCommand::shell(format!("touch '{}'", remount.display())));

        actions.on_alert("coretemp", &Signal::Numeric(90.0)).await;
        actions.remediate().await;

        assert!(hook.exists());
        assert!(remount.exists());
    }

    #[test]
    fn blank_alert_command_is_ignored() {
        let actions = MonitorActions::new(
            Arc::new(RecordingSink::default()),
            exec(),
            "nas",
            MessageTemplate::new("t", "b"),
        )
        .with_alert_command(Some("   ".to_string()));
        assert!(actions.alert_command.is_none());
    }
}
