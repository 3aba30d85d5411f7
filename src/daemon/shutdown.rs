//! Cooperative shutdown: SIGINT/SIGTERM stop the monitors after their current iteration.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info};

/// Sending half; dropping it does not trigger shutdown.
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }
}

/// Receiving half held by each long-running loop.
#[derive(Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new() -> (ShutdownTrigger, Shutdown) {
        let (tx, rx) = watch::channel(false);
        (ShutdownTrigger { tx }, Shutdown { rx })
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Sleep for `duration`, waking early on shutdown.
    /// Returns true if shutdown was requested.
    pub async fn sleep(&mut self, duration: Duration) -> bool {
        if self.is_triggered() {
            return true;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => false,
            _ = Self::wait(&mut self.rx) => true,
        }
    }

    async fn wait(rx: &mut watch::Receiver<bool>) {
        loop {
            if rx.changed().await.is_err() {
                // Trigger dropped without firing: never resolve.
                std::future::pending::<()>().await;
            }
            if *rx.borrow() {
                return;
            }
        }
    }
}

/// Fire the trigger on Ctrl+C or SIGTERM.
pub fn spawn_signal_listener(trigger: ShutdownTrigger) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    error!("Failed to set up SIGTERM handler: {}", e);
                    tokio::signal::ctrl_c().await.ok();
                    info!("Shutdown signal received (Ctrl+C)");
                    trigger.trigger();
                    return;
                }
            };
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("Shutdown signal received (Ctrl+C)"),
                _ = sigterm.recv() => info!("Shutdown signal received (SIGTERM)"),
            }
        }

        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutdown signal received (Ctrl+C)");
        }

        trigger.trigger();
    });
}
