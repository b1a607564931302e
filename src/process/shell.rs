// src/process/shell.rs

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use globset::Glob;
use tokio::sync::oneshot;
use tracing::{debug, error, warn};

use crate::engine::PipelineProcess;
use crate::errors::{EngineError, Result};
use crate::flow::{FileInPort, FileOutPort, FileTarget, ParamInPort};
use crate::process::formatter::{self, PathFormatter};
use crate::process::task::{CustomExecute, Task, TaskOutcome};
use crate::template::{self, PlaceholderKind};

/// A process wrapping a shell command template.
///
/// Ports are discovered from the template's placeholders: `{i:name}` becomes
/// an input file port, `{o:name}` an output file port, `{os:name}` a
/// streaming output file port, and `{p:name}` a parameter port. The run loop
/// reads one value per open input/param port per iteration and instantiates
/// one task per iteration.
pub struct ShellProcess {
    name: String,
    command: String,
    prepend: Option<String>,
    in_ports: HashMap<String, FileInPort>,
    out_ports: HashMap<String, FileOutPort>,
    param_ports: HashMap<String, ParamInPort>,
    out_streams: HashSet<String>,
    out_globs: HashMap<String, String>,
    formatters: HashMap<String, PathFormatter>,
    custom_execute: Option<CustomExecute>,
}

/// Bookkeeping for a launched task: the targets to forward once it
/// completes, and the receiving half of its completion signal.
struct PendingTask {
    out_targets: HashMap<String, FileTarget>,
    done_rx: oneshot::Receiver<TaskOutcome>,
}

impl ShellProcess {
    /// Build a process from a command template, declaring one port per
    /// distinct placeholder.
    pub fn from_shell(name: impl Into<String>, cmd: impl Into<String>) -> Self {
        let mut p = Self::bare(name, cmd);
        p.init_ports_from_pattern();
        p
    }

    /// Build a process from a template after static expansion: placeholders
    /// with a value in the corresponding map are replaced with that literal
    /// and induce no port.
    pub fn from_shell_expand(
        name: impl Into<String>,
        cmd: &str,
        in_paths: &HashMap<String, String>,
        out_paths: &HashMap<String, String>,
        params: &HashMap<String, String>,
    ) -> Self {
        let expanded = template::expand_command(cmd, in_paths, out_paths, params);
        if expanded != cmd {
            debug!(original = %cmd, expanded = %expanded, "statically expanded command template");
        }
        let mut p = Self::bare(name, expanded);
        p.init_ports_from_pattern();
        p
    }

    fn bare(name: impl Into<String>, cmd: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: cmd.into(),
            prepend: None,
            in_ports: HashMap::new(),
            out_ports: HashMap::new(),
            param_ports: HashMap::new(),
            out_streams: HashSet::new(),
            out_globs: HashMap::new(),
            formatters: HashMap::new(),
            custom_execute: None,
        }
    }

    fn init_ports_from_pattern(&mut self) {
        for ph in template::parse_placeholders(&self.command) {
            match ph.kind {
                PlaceholderKind::Input => {
                    self.in_ports.entry(ph.name).or_default();
                }
                PlaceholderKind::Output => {
                    self.out_ports.entry(ph.name).or_default();
                }
                PlaceholderKind::StreamedOutput => {
                    self.out_streams.insert(ph.name.clone());
                    self.out_ports.entry(ph.name).or_default();
                }
                PlaceholderKind::Param => {
                    self.param_ports.entry(ph.name).or_default();
                }
            }
        }
    }

    /// String prepended to every shell invocation (e.g. a scheduler call or
    /// an environment wrapper).
    pub fn set_prepend(&mut self, prepend: impl Into<String>) {
        self.prepend = Some(prepend.into());
    }

    /// Replace the shell-execution body of every task with a user function.
    pub fn set_custom_execute(
        &mut self,
        hook: impl Fn(&Task) -> Result<()> + Send + Sync + 'static,
    ) {
        self.custom_execute = Some(std::sync::Arc::new(hook));
    }

    /// Register a formatter returning a fixed path for an output port.
    pub fn set_path_static(&mut self, out_port: &str, path: impl Into<PathBuf>) -> Result<()> {
        self.set_formatter(out_port, formatter::path_static(path))
    }

    /// Register a formatter extending an input target's path.
    pub fn set_path_extend(
        &mut self,
        in_port: &str,
        out_port: &str,
        extension: impl Into<String>,
    ) -> Result<()> {
        self.require_in_port(in_port)?;
        self.set_formatter(out_port, formatter::path_extend(in_port, extension))
    }

    /// Register a formatter rewriting an input target's path.
    pub fn set_path_replace(
        &mut self,
        in_port: &str,
        out_port: &str,
        old: impl Into<String>,
        new: impl Into<String>,
    ) -> Result<()> {
        self.require_in_port(in_port)?;
        self.set_formatter(out_port, formatter::path_replace(in_port, old, new))
    }

    /// Register an arbitrary formatter closure for an output port.
    pub fn set_path_custom(
        &mut self,
        out_port: &str,
        f: impl Fn(&Task) -> Result<PathBuf> + Send + Sync + 'static,
    ) -> Result<()> {
        self.set_formatter(out_port, Box::new(f))
    }

    /// Mark an output port as glob-produced: after each task's command
    /// completes, filesystem entries matching `pattern` are emitted as one
    /// target per match, in lexical order. The port needs no formatter.
    ///
    /// The pattern may match files left over from earlier runs; keeping the
    /// matched namespace clean between runs is the pipeline author's
    /// responsibility.
    pub fn glob_outputs(&mut self, out_port: &str, pattern: impl Into<String>) -> Result<()> {
        self.require_out_port(out_port)?;
        self.out_globs.insert(out_port.to_string(), pattern.into());
        Ok(())
    }

    pub fn in_port_mut(&mut self, name: &str) -> Result<&mut FileInPort> {
        let process = self.name.clone();
        self.in_ports.get_mut(name).ok_or_else(|| {
            EngineError::config(format!("process '{process}' has no in-port '{name}'"))
        })
    }

    pub fn out_port_mut(&mut self, name: &str) -> Result<&mut FileOutPort> {
        let process = self.name.clone();
        self.out_ports.get_mut(name).ok_or_else(|| {
            EngineError::config(format!("process '{process}' has no out-port '{name}'"))
        })
    }

    pub fn param_port_mut(&mut self, name: &str) -> Result<&mut ParamInPort> {
        let process = self.name.clone();
        self.param_ports.get_mut(name).ok_or_else(|| {
            EngineError::config(format!("process '{process}' has no param-port '{name}'"))
        })
    }

    fn set_formatter(&mut self, out_port: &str, f: PathFormatter) -> Result<()> {
        self.require_out_port(out_port)?;
        self.formatters.insert(out_port.to_string(), f);
        Ok(())
    }

    fn require_out_port(&self, name: &str) -> Result<()> {
        if self.out_ports.contains_key(name) {
            return Ok(());
        }
        Err(EngineError::config(format!(
            "process '{}' has no out-port '{name}'",
            self.name
        )))
    }

    fn require_in_port(&self, name: &str) -> Result<()> {
        if self.in_ports.contains_key(name) {
            return Ok(());
        }
        Err(EngineError::config(format!(
            "process '{}' has no in-port '{name}'",
            self.name
        )))
    }

    fn out_port(&self, name: &str) -> Result<&FileOutPort> {
        self.out_ports.get(name).ok_or_else(|| {
            EngineError::protocol(format!(
                "process '{}' forwarded to unknown out-port '{name}'",
                self.name
            ))
        })
    }

    /// One value per open input port. Returns the received targets and
    /// whether every input port was still open.
    async fn receive_inputs(&mut self) -> (HashMap<String, FileTarget>, bool) {
        let mut open = true;
        let mut in_targets = HashMap::new();
        for (name, port) in self.in_ports.iter_mut() {
            debug!(process = %self.name, port = %name, "receiving on in-port");
            match port.recv().await {
                Some(target) => {
                    debug!(
                        process = %self.name,
                        port = %name,
                        path = %target.path().display(),
                        "received input target"
                    );
                    in_targets.insert(name.clone(), target);
                }
                None => open = false,
            }
        }
        (in_targets, open)
    }

    /// One value per open parameter port.
    async fn receive_params(&mut self) -> (HashMap<String, String>, bool) {
        let mut open = true;
        let mut params = HashMap::new();
        for (name, port) in self.param_ports.iter_mut() {
            match port.recv().await {
                Some(value) => {
                    debug!(process = %self.name, param = %name, value = %value, "received param");
                    params.insert(name.clone(), value);
                }
                None => open = false,
            }
        }
        (params, open)
    }

    /// Build one task from the current inputs and params: apply the path
    /// formatters, then resolve the command.
    fn instantiate_task(
        &self,
        in_targets: HashMap<String, FileTarget>,
        params: HashMap<String, String>,
    ) -> Result<(Task, oneshot::Receiver<TaskOutcome>)> {
        let (mut task, done_rx) = Task::new(
            self.name.clone(),
            self.command.clone(),
            in_targets,
            params,
            self.prepend.clone(),
            self.custom_execute.clone(),
        );

        for port in self.out_ports.keys() {
            if let Some(pattern) = self.out_globs.get(port) {
                task.bind_glob_output(port, pattern);
            } else if let Some(formatter) = self.formatters.get(port) {
                let path = formatter(&task)?;
                task.bind_output(port, path, self.out_streams.contains(port));
            } else {
                return Err(EngineError::config(format!(
                    "out-port '{port}' of process '{}' has no path formatter or glob pattern",
                    self.name
                )));
            }
        }

        task.resolve()?;
        Ok((task, done_rx))
    }

    async fn run_loop(&mut self) -> Result<()> {
        let mut pending: Vec<PendingTask> = Vec::new();

        debug!(process = %self.name, "starting to create and schedule tasks");
        loop {
            let (in_targets, inputs_open) = self.receive_inputs().await;
            let (params, params_open) = self.receive_params().await;

            if !inputs_open && !params_open {
                debug!(process = %self.name, "in-ports and param-ports exhausted");
                break;
            }
            if self.in_ports.is_empty() && !params_open {
                debug!(process = %self.name, "no in-ports and param-ports exhausted");
                break;
            }
            if self.param_ports.is_empty() && !inputs_open {
                debug!(process = %self.name, "no param-ports and in-ports exhausted");
                break;
            }

            let (task, done_rx) = self.instantiate_task(in_targets, params)?;
            debug!(process = %self.name, cmd = %task.resolved_command(), "instantiated task");

            let fifos_already_exist = task.any_fifos_exist();
            if !fifos_already_exist {
                task.create_fifos()?;
            }

            // Streaming targets go downstream before the task body runs, so
            // the consumer can open the pipe. There is no further fence: the
            // producer's first write simply blocks until the consumer opens
            // the FIFO for reading (POSIX pipe semantics).
            let streamed: Vec<(String, FileTarget)> = task
                .out_targets()
                .iter()
                .filter(|(_, t)| t.do_stream())
                .map(|(n, t)| (n.clone(), t.clone()))
                .collect();
            for (port, target) in streamed {
                debug!(
                    process = %self.name,
                    port = %port,
                    fifo = %target.fifo_path().display(),
                    "sending streaming target downstream"
                );
                self.out_port(&port)?.send(target).await?;
            }

            pending.push(PendingTask {
                out_targets: task.out_targets().clone(),
                done_rx,
            });

            if fifos_already_exist {
                warn!(
                    process = %self.name,
                    cmd = %task.resolved_command(),
                    "streaming FIFOs already exist; assuming the task is in flight and skipping execution"
                );
                tokio::spawn(task.complete_without_execute());
            } else {
                tokio::spawn(task.execute());
            }

            if self.in_ports.is_empty() && self.param_ports.is_empty() {
                debug!(process = %self.name, "no in-ports or param-ports; ran one-shot task");
                break;
            }
        }

        // Await completions in creation order and forward the non-streaming
        // targets, so every out-port emits in task-creation order no matter
        // which task finished first.
        debug!(
            process = %self.name,
            tasks = pending.len(),
            "waiting for tasks and forwarding outputs"
        );
        for pt in pending {
            match pt.done_rx.await {
                Ok(TaskOutcome::Success) => {}
                Ok(TaskOutcome::Failed(err)) => return Err(err),
                Err(_) => {
                    return Err(EngineError::protocol(
                        "task completion signal was dropped without firing",
                    ))
                }
            }

            for (port, target) in &pt.out_targets {
                if target.do_stream() {
                    continue;
                }
                if let Some(pattern) = self.out_globs.get(port) {
                    for path in expand_glob(pattern)? {
                        debug!(
                            process = %self.name,
                            port = %port,
                            path = %path.display(),
                            "sending glob-matched target downstream"
                        );
                        self.out_port(port)?.send(FileTarget::new(path)).await?;
                    }
                } else {
                    debug!(
                        process = %self.name,
                        port = %port,
                        path = %target.path().display(),
                        "sending target downstream"
                    );
                    self.out_port(port)?.send(target.clone()).await?;
                }
            }
        }

        Ok(())
    }

    fn close_out_ports(&mut self) {
        for (name, port) in self.out_ports.iter_mut() {
            debug!(process = %self.name, port = %name, "closing out-port");
            port.close();
        }
    }
}

#[async_trait]
impl PipelineProcess for ShellProcess {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_connected(&self) -> bool {
        let mut connected = true;
        for (name, port) in &self.in_ports {
            if !port.is_connected() {
                error!(
                    process = %self.name,
                    port = %name,
                    "in-port is not connected; check the pipeline wiring"
                );
                connected = false;
            }
        }
        for (name, port) in &self.out_ports {
            if !port.is_connected() {
                error!(
                    process = %self.name,
                    port = %name,
                    "out-port is not connected; check the pipeline wiring"
                );
                connected = false;
            }
        }
        for (name, port) in &self.param_ports {
            if !port.is_connected() {
                error!(
                    process = %self.name,
                    port = %name,
                    "param-port is not connected; check the pipeline wiring"
                );
                connected = false;
            }
        }
        connected
    }

    async fn run(mut self: Box<Self>) -> Result<()> {
        let result = self.run_loop().await;
        self.close_out_ports();
        result
    }
}

/// Enumerate directory entries matching a glob pattern, sorted lexically.
///
/// The pattern is split into a parent directory and a file-name glob; only
/// entries of that one directory are considered.
fn expand_glob(pattern: &str) -> Result<Vec<PathBuf>> {
    let pat = Path::new(pattern);
    let bare = pat
        .parent()
        .map(|p| p.as_os_str().is_empty())
        .unwrap_or(true);
    let dir = if bare {
        Path::new(".")
    } else {
        pat.parent().unwrap_or_else(|| Path::new("."))
    };
    let file_pattern = pat
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            EngineError::config(format!("glob pattern '{pattern}' has no file name component"))
        })?;

    let matcher = Glob::new(&file_pattern)
        .map_err(|e| EngineError::config(format!("invalid glob pattern '{pattern}': {e}")))?
        .compile_matcher();

    let entries = std::fs::read_dir(dir).map_err(|e| {
        EngineError::io(
            format!("reading directory {} for glob expansion", dir.display()),
            e,
        )
    })?;

    let mut matches = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| {
            EngineError::io(
                format!("reading directory entry under {}", dir.display()),
                e,
            )
        })?;
        let name = entry.file_name();
        if matcher.is_match(Path::new(&name)) {
            if bare {
                matches.push(PathBuf::from(&name));
            } else {
                matches.push(dir.join(&name));
            }
        }
    }

    matches.sort();
    Ok(matches)
}
