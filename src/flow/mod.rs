// src/flow/mod.rs

//! Channels and values that move between processes.
//!
//! A pipeline's processes exchange exactly two payload types: [`FileTarget`]
//! on file ports and `String` on parameter ports. Ports are one-to-one
//! bounded channels; all cross-process synchronization in the engine happens
//! through them.

pub mod port;
pub mod target;

pub use port::{
    connect, FileInPort, FileOutPort, InPort, OutPort, ParamInPort, ParamOutPort,
    DEFAULT_BUFFER_SIZE,
};
pub use target::FileTarget;
