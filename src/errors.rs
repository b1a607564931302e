// src/errors.rs

//! Crate-wide error types.
//!
//! The engine core reports everything through [`EngineError`]; the config
//! loader and CLI layers wrap these in `anyhow` with extra context.

use std::io;

use thiserror::Error;

/// Errors produced by the pipeline engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Problems with the pipeline description itself: an unbound placeholder,
    /// a missing path formatter, an unconnected port. Detected before or
    /// while instantiating tasks, never mid-execution.
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem-level failures: creating a FIFO, renaming a staged output,
    /// reading a directory for glob expansion.
    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },

    /// The shell command exited nonzero, or the child could not be started.
    #[error("shell command failed with status {status:?}: {command}")]
    Execution {
        command: String,
        status: Option<i32>,
        #[source]
        source: Option<io::Error>,
    },

    /// Conditions that indicate a bug in the engine rather than in the
    /// pipeline: a send on a channel whose peer vanished, a lost completion
    /// signal.
    #[error("protocol violation: {0}")]
    Protocol(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    pub fn config(msg: impl Into<String>) -> Self {
        EngineError::Config(msg.into())
    }

    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        EngineError::Io {
            context: context.into(),
            source,
        }
    }

    /// Shell exited with a nonzero (or signal-terminated) status.
    pub fn exec_status(command: impl Into<String>, status: Option<i32>) -> Self {
        EngineError::Execution {
            command: command.into(),
            status,
            source: None,
        }
    }

    /// The child process could not be started at all.
    pub fn exec_spawn(command: impl Into<String>, source: io::Error) -> Self {
        EngineError::Execution {
            command: command.into(),
            status: None,
            source: Some(source),
        }
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        EngineError::Protocol(msg.into())
    }
}
