// src/config/mod.rs

//! Pipeline descriptions in TOML: data model, loading, semantic validation,
//! and construction of a runnable pipeline.

pub mod build;
pub mod loader;
pub mod model;
pub mod validate;

pub use build::build_pipeline;
pub use loader::{default_pipeline_path, load_and_validate, load_from_path};
pub use model::{
    Connection, Endpoint, PathSpec, PipelineFile, PipelineSection, PortDecls, ProcessConfig,
};
pub use validate::validate_pipeline;
