// src/flow/port.rs

use tokio::sync::mpsc;
use tracing::debug;

use crate::errors::{EngineError, Result};
use crate::flow::target::FileTarget;

/// Default bounded-channel capacity for port connections.
pub const DEFAULT_BUFFER_SIZE: usize = 16;

/// Sending half of a port connection, held by the producing process.
///
/// A port starts unconnected; [`connect`] gives it the sender side of a
/// bounded channel shared with exactly one [`InPort`]. Closing the port
/// (dropping the sender) is how a process signals end-of-stream downstream.
#[derive(Debug)]
pub struct OutPort<T> {
    tx: Option<mpsc::Sender<T>>,
    connected: bool,
}

/// Receiving half of a port connection, held by the consuming process.
#[derive(Debug)]
pub struct InPort<T> {
    rx: Option<mpsc::Receiver<T>>,
    connected: bool,
}

pub type FileOutPort = OutPort<FileTarget>;
pub type FileInPort = InPort<FileTarget>;
pub type ParamOutPort = OutPort<String>;
pub type ParamInPort = InPort<String>;

impl<T> OutPort<T> {
    pub fn new() -> Self {
        Self {
            tx: None,
            connected: false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Send one value to the peer, suspending while the channel is full.
    pub async fn send(&self, value: T) -> Result<()> {
        let tx = self
            .tx
            .as_ref()
            .ok_or_else(|| EngineError::protocol("send on an unconnected or closed out-port"))?;
        tx.send(value)
            .await
            .map_err(|_| EngineError::protocol("send on a port whose receiver is gone"))
    }

    /// Drop the sender. The peer's `recv` will drain buffered values and
    /// then return `None`.
    pub fn close(&mut self) {
        self.tx = None;
    }
}

impl<T> InPort<T> {
    pub fn new() -> Self {
        Self {
            rx: None,
            connected: false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Receive one value, or `None` once the producer has closed and the
    /// buffer is drained. An unconnected port reads as immediately closed.
    pub async fn recv(&mut self) -> Option<T> {
        match self.rx.as_mut() {
            Some(rx) => rx.recv().await,
            None => None,
        }
    }
}

impl<T> Default for OutPort<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Default for InPort<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Bind an out-port to an in-port over a fresh bounded channel.
///
/// Each port has at most one peer; connecting an already-connected port is a
/// configuration error.
pub fn connect<T>(out: &mut OutPort<T>, inp: &mut InPort<T>, capacity: usize) -> Result<()> {
    if out.connected {
        return Err(EngineError::config("out-port is already connected"));
    }
    if inp.connected {
        return Err(EngineError::config("in-port is already connected"));
    }

    let capacity = capacity.max(1);
    let (tx, rx) = mpsc::channel(capacity);
    out.tx = Some(tx);
    out.connected = true;
    inp.rx = Some(rx);
    inp.connected = true;

    debug!(capacity, "connected port pair");
    Ok(())
}
