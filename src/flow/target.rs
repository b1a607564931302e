// src/flow/target.rs

use std::path::{Path, PathBuf};

/// A file produced (or about to be produced) by a task.
///
/// The target names three filesystem locations derived from one final path:
///
/// - `path` — where the finished file lives,
/// - `temp_path()` — the `.tmp` staging file the shell writes to, renamed
///   into place on success,
/// - `fifo_path()` — the `.fifo` named pipe used instead of staging when the
///   target streams.
///
/// Receiving a `FileTarget` on a port means the file is ready to read — or,
/// for a streaming target, that the FIFO has been created and the producer
/// is about to write into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTarget {
    path: PathBuf,
    do_stream: bool,
}

impl FileTarget {
    /// A plain (non-streaming) target.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            do_stream: false,
        }
    }

    /// A target whose bytes flow through a named pipe.
    pub fn streamed(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            do_stream: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn do_stream(&self) -> bool {
        self.do_stream
    }

    /// Staging path: `<path>.tmp`.
    pub fn temp_path(&self) -> PathBuf {
        append_suffix(&self.path, ".tmp")
    }

    /// Named-pipe path: `<path>.fifo`.
    pub fn fifo_path(&self) -> PathBuf {
        append_suffix(&self.path, ".fifo")
    }

    /// Whether the final file is present on disk. Skip-if-exists is based
    /// solely on presence, never on content or timestamps.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// The path a consuming shell command should read this target from:
    /// the FIFO while streaming, the final path otherwise.
    pub fn read_path(&self) -> PathBuf {
        if self.do_stream {
            self.fifo_path()
        } else {
            self.path.clone()
        }
    }

    /// The path the producing shell command should write this target to:
    /// the FIFO while streaming, the staging file otherwise.
    pub fn write_path(&self) -> PathBuf {
        if self.do_stream {
            self.fifo_path()
        } else {
            self.temp_path()
        }
    }
}

fn append_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(suffix);
    PathBuf::from(s)
}
