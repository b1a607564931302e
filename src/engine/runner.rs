// src/engine/runner.rs

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::errors::{EngineError, Result};

/// The capability every pipeline member exposes to the runner.
///
/// Concrete processes ([`crate::process::ShellProcess`], the helper
/// processes, or user-defined generators) are driven purely through this
/// interface: a connectivity sanity check before launch, and a run method
/// that consumes the process.
#[async_trait]
pub trait PipelineProcess: Send {
    fn name(&self) -> &str;

    /// True when every declared port has been connected. Implementations
    /// log each offending port at error level.
    fn is_connected(&self) -> bool;

    /// Drive the process to completion. Called on its own tokio task; the
    /// process must close its out-ports before returning, on success and on
    /// failure alike.
    async fn run(self: Box<Self>) -> Result<()>;
}

/// Owns a set of processes, validates their wiring, launches each on its
/// own worker, and blocks until all have terminated.
pub struct PipelineRunner {
    processes: Vec<Box<dyn PipelineProcess>>,
}

impl PipelineRunner {
    pub fn new() -> Self {
        Self {
            processes: Vec::new(),
        }
    }

    pub fn add_process(&mut self, process: impl PipelineProcess + 'static) {
        self.processes.push(Box::new(process));
    }

    pub fn add_boxed(&mut self, process: Box<dyn PipelineProcess>) {
        self.processes.push(process);
    }

    /// Run the pipeline to completion.
    ///
    /// Refuses to start if any process reports an unconnected port (the
    /// offending ports have already been logged by `is_connected`). After
    /// all workers drain, the first process error in registration order is
    /// surfaced.
    pub async fn run(self) -> Result<()> {
        let unconnected: Vec<&str> = self
            .processes
            .iter()
            .filter(|p| !p.is_connected())
            .map(|p| p.name())
            .collect();
        if !unconnected.is_empty() {
            return Err(EngineError::config(format!(
                "refusing to start pipeline: unconnected ports in processes: {}",
                unconnected.join(", ")
            )));
        }

        info!(processes = self.processes.len(), "pipeline starting");

        let mut handles = Vec::new();
        for process in self.processes {
            let name = process.name().to_string();
            debug!(process = %name, "launching process worker");
            handles.push((name, tokio::spawn(process.run())));
        }

        let mut first_err: Option<EngineError> = None;
        for (name, handle) in handles {
            match handle.await {
                Ok(Ok(())) => {
                    debug!(process = %name, "process worker finished");
                }
                Ok(Err(err)) => {
                    error!(process = %name, error = %err, "process worker failed");
                    first_err.get_or_insert(err);
                }
                Err(join_err) => {
                    error!(process = %name, error = %join_err, "process worker panicked");
                    first_err.get_or_insert(EngineError::protocol(format!(
                        "worker for process '{name}' panicked: {join_err}"
                    )));
                }
            }
        }

        match first_err {
            Some(err) => Err(err),
            None => {
                info!("pipeline finished");
                Ok(())
            }
        }
    }
}

impl Default for PipelineRunner {
    fn default() -> Self {
        Self::new()
    }
}
