// src/process/helpers.rs

//! Minimal producer and consumer processes used to terminate graph edges
//! and to inject file paths into a pipeline.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, error};

use crate::engine::PipelineProcess;
use crate::errors::Result;
use crate::flow::{connect, FileInPort, FileOutPort, FileTarget};

/// Consumes and drops every target sent to it. Any number of upstream
/// out-ports can be attached via [`Sink::connect_from`].
pub struct Sink {
    name: String,
    in_ports: Vec<FileInPort>,
}

impl Sink {
    pub fn new() -> Self {
        Self {
            name: "sink".to_string(),
            in_ports: Vec::new(),
        }
    }

    /// Attach an upstream out-port; the sink grows one in-port per call.
    pub fn connect_from(&mut self, out: &mut FileOutPort, capacity: usize) -> Result<()> {
        let mut port = FileInPort::new();
        connect(out, &mut port, capacity)?;
        self.in_ports.push(port);
        Ok(())
    }
}

impl Default for Sink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PipelineProcess for Sink {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_connected(&self) -> bool {
        // In-ports only exist once connected.
        true
    }

    async fn run(self: Box<Self>) -> Result<()> {
        // Drain each port on its own worker; draining sequentially could
        // stall an upstream that feeds this sink on more than one port.
        let name = self.name;
        let mut handles = Vec::new();
        for mut port in self.in_ports {
            let name = name.clone();
            handles.push(tokio::spawn(async move {
                while let Some(target) = port.recv().await {
                    debug!(process = %name, path = %target.path().display(), "sink consumed target");
                }
            }));
        }
        for handle in handles {
            if handle.await.is_err() {
                debug!(process = %name, "sink drain worker panicked");
            }
        }
        Ok(())
    }
}

/// Emits one plain [`FileTarget`] per configured path, in order, then
/// closes its out-port.
pub struct FileQueue {
    name: String,
    paths: Vec<PathBuf>,
    out: FileOutPort,
}

impl FileQueue {
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            name: "file_queue".to_string(),
            paths: paths.into_iter().map(Into::into).collect(),
            out: FileOutPort::new(),
        }
    }

    pub fn out_mut(&mut self) -> &mut FileOutPort {
        &mut self.out
    }
}

#[async_trait]
impl PipelineProcess for FileQueue {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_connected(&self) -> bool {
        if !self.out.is_connected() {
            error!(process = %self.name, "out-port is not connected; check the pipeline wiring");
            return false;
        }
        true
    }

    async fn run(mut self: Box<Self>) -> Result<()> {
        for path in std::mem::take(&mut self.paths) {
            debug!(process = %self.name, path = %path.display(), "enqueueing file target");
            self.out.send(FileTarget::new(path)).await?;
        }
        self.out.close();
        Ok(())
    }
}
