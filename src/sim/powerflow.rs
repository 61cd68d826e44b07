//! Optional post-event hook that asks an external solver to recompute flows.

use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use chrono::Local;
use serde_json::Value;
use tracing::{error, info};

use crate::error::PowerFlowError;
use crate::network::NetworkDirectory;

use super::notifier::{Notification, panic_message};

/// Default directory for power-flow artifacts.
pub const DEFAULT_OUTPUT_DIR: &str = "data/historicos/fluxo_potencia";

/// External numeric collaborator computing flows over the current network.
///
/// The result is opaque to the engine and persisted as JSON.
pub trait PowerFlowSolver: Send {
    fn solve(&mut self, network: &NetworkDirectory) -> Result<Value, PowerFlowError>;
}

impl<F> PowerFlowSolver for F
where
    F: FnMut(&NetworkDirectory) -> Result<Value, PowerFlowError> + Send,
{
    fn solve(&mut self, network: &NetworkDirectory) -> Result<Value, PowerFlowError> {
        self(network)
    }
}

/// Runs the solver after each event and persists its result.
pub struct PowerFlowTrigger {
    solver: Box<dyn PowerFlowSolver>,
    output_dir: PathBuf,
}

impl PowerFlowTrigger {
    pub fn new(solver: impl PowerFlowSolver + 'static, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            solver: Box::new(solver),
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Solves, writes `fluxo_<timestamp>.json`, and returns the notification
    /// to emit. Returns `None` on any failure (logged).
    pub fn run(&mut self, network: &NetworkDirectory) -> Option<Notification> {
        match self.try_run(network) {
            Ok(notification) => Some(notification),
            Err(e) => {
                error!(%e, "power-flow run failed");
                None
            }
        }
    }

    fn try_run(&mut self, network: &NetworkDirectory) -> Result<Notification, PowerFlowError> {
        let solver = &mut self.solver;
        let results = panic::catch_unwind(AssertUnwindSafe(|| solver.solve(network)))
            .map_err(|payload| PowerFlowError::Solver(panic_message(payload.as_ref())))??;

        fs::create_dir_all(&self.output_dir)?;
        let path = self.artifact_path();
        fs::write(&path, serde_json::to_vec_pretty(&results)?)?;
        info!(path = %path.display(), "power-flow result saved");

        Ok(Notification::PowerFlow {
            artifact: path.display().to_string(),
            results,
        })
    }

    fn artifact_path(&self) -> PathBuf {
        let ts = Local::now().format("%Y%m%d_%H%M%S_%3f");
        self.output_dir.join(format!("fluxo_{ts}.json"))
    }
}
