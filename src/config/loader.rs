// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config::model::PipelineFile;
use crate::config::validate::validate_pipeline;

/// Load a pipeline description from a given path.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation (port coverage, DAG correctness, etc.). Use
/// [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<PipelineFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .with_context(|| format!("reading pipeline file at {:?}", path))?;

    let pipeline: PipelineFile = toml::from_str(&contents)
        .with_context(|| format!("parsing TOML pipeline from {:?}", path))?;

    Ok(pipeline)
}

/// Load a pipeline description and run semantic validation.
///
/// This is the recommended entry point for the rest of the application:
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks port references, formatter coverage, connection consistency,
///   and DAG acyclicity.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<PipelineFile> {
    let pipeline = load_from_path(&path)?;
    validate_pipeline(&pipeline)?;
    Ok(pipeline)
}

/// Default pipeline file location: `Sciflow.toml` in the current working
/// directory.
pub fn default_pipeline_path() -> PathBuf {
    PathBuf::from("Sciflow.toml")
}
