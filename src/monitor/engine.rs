//! Polling threshold monitor: per-signal state machine, debounce, remediation sub-loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::actions::ActionSet;
use super::signal::{Condition, Evaluation, Signal, SignalSource};
use crate::daemon::shutdown::Shutdown;

/// How often an ongoing alert is repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Debounce {
    /// Alert once per episode.
    Once,
    /// Repeat while the condition holds, at most once per interval.
    Every(Duration),
}

impl Debounce {
    /// `None` means alert once; `Some(n)` repeats every `n` seconds.
    pub fn from_seconds(seconds: Option<u64>) -> Self {
        match seconds {
            Some(n) => Debounce::Every(Duration::from_secs(n)),
            None => Debounce::Once,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MonitorSettings {
    pub poll_interval: Duration,
    pub debounce: Debounce,
    /// When set, an alert blocks this monitor in a remediation sub-loop
    /// polled at this interval until the condition clears.
    pub remediation_interval: Option<Duration>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorState {
    pub last_alert_time: Option<Instant>,
    pub currently_alerting: bool,
    pub suppressed_actions_active: bool,
}

/// Outcome of a single poll.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transition {
    /// Normal -> Alerting.
    Raised(Signal),
    /// Alerting -> Alerting with the alert re-sent.
    Repeated(Signal),
    /// Alerting -> Normal.
    Recovered(Signal),
    /// No state change.
    Unchanged(Signal),
    /// The reading failed or could not be classified; state untouched.
    Indeterminate,
}

pub struct ThresholdMonitor {
    source: Box<dyn SignalSource>,
    condition: Condition,
    actions: Arc<dyn ActionSet>,
    settings: MonitorSettings,
    state: MonitorState,
}

impl ThresholdMonitor {
    pub fn new(
        source: Box<dyn SignalSource>,
        condition: Condition,
        actions: Arc<dyn ActionSet>,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            source,
            condition,
            actions,
            settings,
            state: MonitorState::default(),
        }
    }

    pub fn subject(&self) -> &str {
        self.source.subject()
    }

    #[cfg(test)]
    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    /// Take one reading and apply the resulting transition.
    pub async fn poll_once(&mut self, now: Instant) -> Transition {
        let signal = match self.source.read().await {
            Ok(signal) => signal,
            Err(e) => {
                warn!("{}: reading failed: {}", self.subject(), e);
                return Transition::Indeterminate;
            }
        };

        match self.condition.evaluate(&signal) {
            Evaluation::Indeterminate => {
                warn!("{}: status unknown ({})", self.subject(), signal);
                Transition::Indeterminate
            }
            Evaluation::Alert if !self.state.currently_alerting => {
                info!("{}: alert condition entered ({})", self.subject(), signal);
                self.fire_alert(&signal, now).await;
                self.state.currently_alerting = true;
                Transition::Raised(signal)
            }
            Evaluation::Alert => {
                if self.repeat_due(now) {
                    info!("{}: alert condition persists ({})", self.subject(), signal);
                    self.fire_alert(&signal, now).await;
                    Transition::Repeated(signal)
                } else {
                    debug!("{}: still alerting ({}), repeat suppressed", self.subject(), signal);
                    Transition::Unchanged(signal)
                }
            }
            Evaluation::Clear if self.state.currently_alerting => {
                info!("{}: alert condition cleared ({})", self.subject(), signal);
                if self.actions.has_recovery() {
                    self.actions.on_recover(self.source.subject(), &signal).await;
                }
                self.state.currently_alerting = false;
                self.state.suppressed_actions_active = false;
                self.state.last_alert_time = None;
                Transition::Recovered(signal)
            }
            Evaluation::Clear => {
                debug!("{}: ok ({})", self.subject(), signal);
                Transition::Unchanged(signal)
            }
            Evaluation::Hold => {
                debug!(
                    "{}: {} is between the resume level and the threshold",
                    self.subject(),
                    signal
                );
                Transition::Unchanged(signal)
            }
        }
    }

    /// One scheduled poll, followed by the remediation sub-loop when this
    /// monitor remediates and the condition holds.
    pub async fn tick(&mut self, shutdown: &mut Shutdown) -> Transition {
        let transition = self.poll_once(Instant::now()).await;

        let Some(interval) = self.settings.remediation_interval else {
            return transition;
        };

        let mut last = transition;
        while self.state.currently_alerting {
            if shutdown.is_triggered() {
                info!("{}: shutdown requested during remediation", self.subject());
                break;
            }
            self.actions.remediate().await;
            if shutdown.sleep(interval).await {
                break;
            }
            last = self.poll_once(Instant::now()).await;
        }
        last
    }

    /// Poll until shutdown is requested.
    pub async fn run(mut self, mut shutdown: Shutdown) {
        info!(
            "Monitoring {} every {}s",
            self.subject(),
            self.settings.poll_interval.as_secs()
        );
        loop {
            self.tick(&mut shutdown).await;
            if shutdown.sleep(self.settings.poll_interval).await {
                break;
            }
        }
        info!("Stopped monitoring {}", self.subject());
    }

    fn repeat_due(&self, now: Instant) -> bool {
        match (self.settings.debounce, self.state.last_alert_time) {
            (Debounce::Once, _) => false,
            (Debounce::Every(_), None) => true,
            (Debounce::Every(interval), Some(last)) => {
                now.saturating_duration_since(last) >= interval
            }
        }
    }

    async fn fire_alert(&mut self, signal: &Signal, now: Instant) {
        self.actions.on_alert(self.source.subject(), signal).await;
        // Counted as delivered even if the notification transport failed.
        self.state.last_alert_time = Some(now);
        if self.actions.suppresses_workloads() {
            self.state.suppressed_actions_active = true;
        }
    }
}

/// Lists the subjects of a group again before every cycle, for subjects
/// that can appear and disappear while the process runs (hot-plugged disks).
#[async_trait]
pub trait SubjectDiscovery: Send + Sync {
    /// Subjects present right now. An empty list is not an error.
    async fn discover(&self) -> Vec<String>;

    /// A fresh monitor for a subject seen for the first time.
    fn monitor_for(&self, subject: &str) -> ThresholdMonitor;
}

/// Monitors of one kind, polled one after another on a shared interval.
pub struct MonitorGroup {
    monitors: Vec<ThresholdMonitor>,
    discovery: Option<Box<dyn SubjectDiscovery>>,
    poll_interval: Duration,
}

impl MonitorGroup {
    pub fn new(monitors: Vec<ThresholdMonitor>, poll_interval: Duration) -> Self {
        Self {
            monitors,
            discovery: None,
            poll_interval,
        }
    }

    /// A group whose subjects are rediscovered on every cycle.
    pub fn discovering(discovery: Box<dyn SubjectDiscovery>, poll_interval: Duration) -> Self {
        Self {
            monitors: Vec::new(),
            discovery: Some(discovery),
            poll_interval,
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    #[cfg(test)]
    pub fn subjects(&self) -> Vec<&str> {
        self.monitors.iter().map(|m| m.subject()).collect()
    }

    /// True when there is nothing to watch now and nothing can show up later.
    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty() && self.discovery.is_none()
    }

    /// Rediscover (when discovering), then tick every monitor once.
    pub async fn cycle(&mut self, shutdown: &mut Shutdown) {
        self.refresh().await;
        for monitor in self.monitors.iter_mut() {
            if shutdown.is_triggered() {
                break;
            }
            monitor.tick(shutdown).await;
        }
    }

    pub async fn run(mut self, mut shutdown: Shutdown) {
        if self.monitors.len() == 1 && self.discovery.is_none() {
            if let Some(monitor) = self.monitors.pop() {
                return monitor.run(shutdown).await;
            }
        }

        if self.discovery.is_some() {
            info!("Monitoring discovered subjects every {}s", self.poll_interval.as_secs());
        } else {
            info!(
                "Monitoring {} subjects every {}s",
                self.monitors.len(),
                self.poll_interval.as_secs()
            );
        }
        loop {
            self.cycle(&mut shutdown).await;
            if shutdown.sleep(self.poll_interval).await {
                break;
            }
        }
        info!("Monitor group stopped");
    }

    /// Known subjects keep their monitor (and its alert state); new ones get a
    /// fresh monitor; vanished ones are dropped.
    async fn refresh(&mut self) {
        let Some(discovery) = &self.discovery else {
            return;
        };
        let subjects = discovery.discover().await;

        let mut known: HashMap<String, ThresholdMonitor> = self
            .monitors
            .drain(..)
            .map(|monitor| (monitor.subject().to_string(), monitor))
            .collect();
        for subject in &subjects {
            let monitor = match known.remove(subject) {
                Some(monitor) => monitor,
                None => {
                    info!("Now monitoring {}", subject);
                    discovery.monitor_for(subject)
                }
            };
            self.monitors.push(monitor);
        }
        for subject in known.keys() {
            info!("{} is no longer present", subject);
        }
    }
}
