// src/process/task.rs

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::{debug, error};

use crate::errors::{EngineError, Result};
use crate::flow::FileTarget;
use crate::template;

/// What a task reports on its completion signal.
#[derive(Debug)]
pub enum TaskOutcome {
    Success,
    Failed(EngineError),
}

/// User-supplied replacement for the shell-execution body of a task. The
/// hook is responsible for producing every expected output file itself.
pub type CustomExecute = Arc<dyn Fn(&Task) -> Result<()> + Send + Sync>;

/// A single invocation of a process's command: concrete inputs, outputs, and
/// parameters, plus a one-shot completion signal fired exactly once whether
/// the task ran, failed, or was skipped.
pub struct Task {
    process: String,
    command: String,
    resolved_command: String,
    in_targets: HashMap<String, FileTarget>,
    out_targets: HashMap<String, FileTarget>,
    params: HashMap<String, String>,
    prepend: Option<String>,
    glob_ports: HashSet<String>,
    custom_execute: Option<CustomExecute>,
    done: Option<oneshot::Sender<TaskOutcome>>,
}

impl Task {
    /// A task with inputs and params bound but no outputs yet. The owning
    /// process binds outputs via its path formatters, then calls
    /// [`Task::resolve`] before handing the task off for execution.
    pub(crate) fn new(
        process: impl Into<String>,
        command: impl Into<String>,
        in_targets: HashMap<String, FileTarget>,
        params: HashMap<String, String>,
        prepend: Option<String>,
        custom_execute: Option<CustomExecute>,
    ) -> (Self, oneshot::Receiver<TaskOutcome>) {
        let (done_tx, done_rx) = oneshot::channel();
        let task = Self {
            process: process.into(),
            command: command.into(),
            resolved_command: String::new(),
            in_targets,
            out_targets: HashMap::new(),
            params,
            prepend,
            glob_ports: HashSet::new(),
            custom_execute,
            done: Some(done_tx),
        };
        (task, done_rx)
    }

    pub fn process_name(&self) -> &str {
        &self.process
    }

    /// The raw command template this task was instantiated from.
    pub fn template(&self) -> &str {
        &self.command
    }

    /// The command after placeholder substitution.
    pub fn resolved_command(&self) -> &str {
        &self.resolved_command
    }

    pub fn in_targets(&self) -> &HashMap<String, FileTarget> {
        &self.in_targets
    }

    pub fn out_targets(&self) -> &HashMap<String, FileTarget> {
        &self.out_targets
    }

    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    /// Final path of the input target bound to a port, if any.
    pub fn in_path(&self, port: &str) -> Option<&Path> {
        self.in_targets.get(port).map(|t| t.path())
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(|s| s.as_str())
    }

    pub(crate) fn bind_output(&mut self, port: &str, path: PathBuf, do_stream: bool) {
        let target = if do_stream {
            FileTarget::streamed(path)
        } else {
            FileTarget::new(path)
        };
        self.out_targets.insert(port.to_string(), target);
    }

    /// Bind a glob-produced output port. The pattern itself stands in as the
    /// bound path so that a template reference to the port still substitutes
    /// deterministically; the real targets are discovered after execution.
    pub(crate) fn bind_glob_output(&mut self, port: &str, pattern: &str) {
        self.glob_ports.insert(port.to_string());
        self.out_targets
            .insert(port.to_string(), FileTarget::new(pattern));
    }

    /// Compute the resolved command from the template and the bound targets.
    /// Every surviving placeholder must resolve; a missing binding is fatal.
    ///
    /// Inputs substitute the path the consumer should read (the FIFO for a
    /// streaming upstream), outputs the path the producer should write (the
    /// staging file, or the FIFO when streaming). Glob-produced ports
    /// substitute their pattern verbatim.
    pub(crate) fn resolve(&mut self) -> Result<()> {
        let in_paths: HashMap<String, String> = self
            .in_targets
            .iter()
            .map(|(name, t)| (name.clone(), t.read_path().to_string_lossy().into_owned()))
            .collect();
        let out_paths: HashMap<String, String> = self
            .out_targets
            .iter()
            .map(|(name, t)| {
                let path = if self.glob_ports.contains(name) {
                    t.path().to_path_buf()
                } else {
                    t.write_path()
                };
                (name.clone(), path.to_string_lossy().into_owned())
            })
            .collect();

        self.resolved_command =
            template::resolve_command(&self.command, &in_paths, &out_paths, &self.params)?;
        Ok(())
    }

    /// Plain outputs: written via staging and renamed into place. Streaming
    /// and glob-produced ports are excluded.
    fn plain_outputs(&self) -> impl Iterator<Item = (&String, &FileTarget)> {
        self.out_targets
            .iter()
            .filter(|(name, target)| !target.do_stream() && !self.glob_ports.contains(*name))
    }

    /// Skip-if-exists check: true when the task has at least one plain
    /// output and every plain output's final file is present.
    pub fn outputs_already_exist(&self) -> bool {
        let mut any = false;
        for (_, target) in self.plain_outputs() {
            any = true;
            if !target.exists() {
                return false;
            }
        }
        any
    }

    /// True if any streaming output's FIFO is already on disk, implying a
    /// peer run has initiated this task before.
    pub fn any_fifos_exist(&self) -> bool {
        self.out_targets
            .values()
            .any(|t| t.do_stream() && t.fifo_path().exists())
    }

    /// Create the named pipe for every streaming output that lacks one.
    pub fn create_fifos(&self) -> Result<()> {
        for target in self.out_targets.values().filter(|t| t.do_stream()) {
            let fifo = target.fifo_path();
            if fifo.exists() {
                continue;
            }
            debug!(process = %self.process, fifo = %fifo.display(), "creating FIFO");
            make_fifo(&fifo)?;
        }
        Ok(())
    }

    /// Run the task to completion and fire the completion signal.
    pub async fn execute(mut self) {
        let outcome = match self.run_body().await {
            Ok(()) => TaskOutcome::Success,
            Err(err) => {
                error!(
                    process = %self.process,
                    cmd = %self.resolved_command,
                    error = %err,
                    "task execution failed"
                );
                TaskOutcome::Failed(err)
            }
        };
        self.signal_done(outcome);
    }

    /// Fire the completion signal without executing anything. Used when
    /// pre-existing FIFOs indicate the task is already in flight elsewhere.
    pub async fn complete_without_execute(mut self) {
        self.signal_done(TaskOutcome::Success);
    }

    fn signal_done(&mut self, outcome: TaskOutcome) {
        if let Some(done) = self.done.take() {
            if done.send(outcome).is_err() {
                debug!(
                    process = %self.process,
                    "completion receiver dropped before the task signalled"
                );
            }
        }
    }

    async fn run_body(&self) -> Result<()> {
        if self.outputs_already_exist() {
            debug!(
                process = %self.process,
                cmd = %self.resolved_command,
                "all outputs already exist; skipping execution"
            );
            return Ok(());
        }

        if let Some(hook) = &self.custom_execute {
            debug!(process = %self.process, "running custom execute hook");
            return hook(self);
        }

        self.run_shell().await?;
        self.finalize_outputs().await
    }

    /// The full shell string: the process prepend, if any, then the
    /// resolved command.
    fn shell_command(&self) -> String {
        match self.prepend.as_deref() {
            Some(prepend) if !prepend.is_empty() => {
                format!("{prepend} {}", self.resolved_command)
            }
            _ => self.resolved_command.clone(),
        }
    }

    async fn run_shell(&self) -> Result<()> {
        let shell_cmd = self.shell_command();
        debug!(process = %self.process, cmd = %shell_cmd, "starting shell command");

        // Platform shell dispatch; the command is passed as one string and
        // substituted paths are not quoted.
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&shell_cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&shell_cmd);
            c
        };

        cmd.stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| EngineError::exec_spawn(&shell_cmd, e))?;

        // Drain both pipes so OS buffers never fill; log at debug.
        if let Some(stdout) = child.stdout.take() {
            let process = self.process.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(process = %process, "stdout: {}", line);
                }
            });
        }
        if let Some(stderr) = child.stderr.take() {
            let process = self.process.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(process = %process, "stderr: {}", line);
                }
            });
        }

        let status = child.wait().await.map_err(|e| {
            EngineError::io(format!("waiting for shell command '{shell_cmd}'"), e)
        })?;

        if !status.success() {
            return Err(EngineError::exec_status(shell_cmd, status.code()));
        }

        debug!(process = %self.process, cmd = %shell_cmd, "shell command succeeded");
        Ok(())
    }

    /// Atomically move every plain output from its staging path into place.
    async fn finalize_outputs(&self) -> Result<()> {
        for (name, target) in self.plain_outputs() {
            let temp = target.temp_path();
            debug!(
                process = %self.process,
                port = %name,
                from = %temp.display(),
                to = %target.path().display(),
                "renaming staged output into place"
            );
            tokio::fs::rename(&temp, target.path()).await.map_err(|e| {
                EngineError::io(
                    format!(
                        "renaming staged output {} to {}",
                        temp.display(),
                        target.path().display()
                    ),
                    e,
                )
            })?;
        }
        Ok(())
    }
}

#[cfg(unix)]
fn make_fifo(path: &Path) -> Result<()> {
    use nix::sys::stat::Mode;

    nix::unistd::mkfifo(path, Mode::from_bits_truncate(0o644)).map_err(|errno| {
        EngineError::io(
            format!("creating FIFO at {}", path.display()),
            std::io::Error::from_raw_os_error(errno as i32),
        )
    })
}

#[cfg(not(unix))]
fn make_fifo(path: &Path) -> Result<()> {
    Err(EngineError::config(format!(
        "streaming outputs require named pipes, which this platform does not support ({})",
        path.display()
    )))
}
