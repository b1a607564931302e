// src/process/formatter.rs

use std::path::PathBuf;

use crate::errors::{EngineError, Result};
use crate::process::task::Task;

/// Computes an output file's final path from task context.
///
/// Formatters close over process-level configuration (extensions, literals)
/// and receive the task, giving them access to all bound inputs and params.
pub type PathFormatter = Box<dyn Fn(&Task) -> Result<PathBuf> + Send + Sync>;

/// Formatter returning a fixed literal path.
pub fn path_static(path: impl Into<PathBuf>) -> PathFormatter {
    let path = path.into();
    Box::new(move |_task: &Task| Ok(path.clone()))
}

/// Formatter extending an input target's path with a suffix.
pub fn path_extend(in_port: impl Into<String>, extension: impl Into<String>) -> PathFormatter {
    let in_port = in_port.into();
    let extension = extension.into();
    Box::new(move |task: &Task| {
        let base = task.in_path(&in_port).ok_or_else(|| {
            EngineError::config(format!(
                "extend formatter references in-port '{in_port}' which has no bound target"
            ))
        })?;
        let mut s = base.as_os_str().to_os_string();
        s.push(&extension);
        Ok(PathBuf::from(s))
    })
}

/// Formatter rewriting an input target's path, replacing every
/// non-overlapping occurrence of `old` with `new`.
pub fn path_replace(
    in_port: impl Into<String>,
    old: impl Into<String>,
    new: impl Into<String>,
) -> PathFormatter {
    let in_port = in_port.into();
    let old = old.into();
    let new = new.into();
    Box::new(move |task: &Task| {
        let base = task.in_path(&in_port).ok_or_else(|| {
            EngineError::config(format!(
                "replace formatter references in-port '{in_port}' which has no bound target"
            ))
        })?;
        let replaced = base.to_string_lossy().replace(&old, &new);
        Ok(PathBuf::from(replaced))
    })
}
