//! runtipi application workloads, driven through `runtipi-cli`.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::info;

use crate::monitor::actions::{ActionError, WorkloadController};
use crate::system::executor::{Executor, ToolCommand};

/// Workload id that stands for the whole runtipi stack.
pub const STACK_WORKLOAD: &str = "runtipi";

/// Runs `<runtipi_dir>/runtipi-cli app start|stop <app>` from the runtipi directory.
/// The id `runtipi` maps to `runtipi-cli start|stop` for the whole stack.
pub struct RuntipiWorkloads {
    runtipi_dir: PathBuf,
    cli: ToolCommand,
    exec: Executor,
}

impl RuntipiWorkloads {
    pub fn new(runtipi_dir: impl Into<PathBuf>, exec: Executor) -> Self {
        let runtipi_dir = runtipi_dir.into();
        let cli = ToolCommand::new(runtipi_dir.join("runtipi-cli").to_string_lossy());
        Self::with_cli(runtipi_dir, cli, exec)
    }

    pub fn with_cli(runtipi_dir: impl Into<PathBuf>, cli: ToolCommand, exec: Executor) -> Self {
        Self {
            runtipi_dir: runtipi_dir.into(),
            cli,
            exec,
        }
    }

    async fn invoke(&self, verb: &'static str, workload: &str) -> Result<(), ActionError> {
        let args: Vec<&str> = if workload == STACK_WORKLOAD {
            vec![verb]
        } else {
            vec!["app", verb, workload]
        };

        info!("Running runtipi-cli {} for {}", verb, workload);
        self.exec
            .run_tool_checked_in(&self.cli, &args, Some(&self.runtipi_dir))
            .await
            .map(|_| ())
            .map_err(|e| ActionError::WorkloadFailed {
                verb,
                workload: workload.to_string(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl WorkloadController for RuntipiWorkloads {
    async fn start(&self, workload: &str) -> Result<(), ActionError> {
        self.invoke("start", workload).await
    }

    async fn stop(&self, workload: &str) -> Result<(), ActionError> {
        self.invoke("stop", workload).await
    }
}
