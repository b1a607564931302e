// src/engine/mod.rs

//! Pipeline orchestration.
//!
//! The runner validates that every declared port of every process is
//! connected, launches each process as an independent worker, and waits for
//! all of them. Everything else — task scheduling, ordering, streaming —
//! happens inside the processes themselves via their port channels.

pub mod runner;

pub use runner::{PipelineProcess, PipelineRunner};
