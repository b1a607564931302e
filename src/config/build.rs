// src/config/build.rs

use std::collections::BTreeMap;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use tracing::debug;

use crate::config::model::{to_hash_map, Endpoint, PathSpec, PipelineFile};
use crate::engine::PipelineRunner;
use crate::errors;
use crate::flow::connect;
use crate::process::{ShellProcess, Sink};

/// Turn a validated pipeline description into a fully wired
/// [`PipelineRunner`].
///
/// Processes are constructed via static expansion, formatters and glob
/// patterns are applied, and every `[[connect]]` entry is bound over a
/// channel of the configured capacity. A shared [`Sink`] is appended when
/// any connection targets `"sink"`.
pub fn build_pipeline(cfg: &PipelineFile) -> Result<PipelineRunner> {
    let capacity = cfg.pipeline.buffer_size;

    let mut procs: BTreeMap<String, ShellProcess> = BTreeMap::new();
    for (name, pc) in cfg.process.iter() {
        let mut process = ShellProcess::from_shell_expand(
            name,
            &pc.cmd,
            &to_hash_map(&pc.files_in),
            &to_hash_map(&pc.files_out),
            &to_hash_map(&pc.params),
        );
        if let Some(prepend) = &pc.prepend {
            process.set_prepend(prepend);
        }

        for (port, spec) in pc.path.iter() {
            match spec {
                PathSpec::Static { path } => process.set_path_static(port, path),
                PathSpec::Extend { from, ext } => process.set_path_extend(from, port, ext),
                PathSpec::Replace { from, old, new } => {
                    process.set_path_replace(from, port, old, new)
                }
            }
            .with_context(|| format!("applying path formatter for '{name}.{port}'"))?;
        }
        for (port, pattern) in pc.glob.iter() {
            process
                .glob_outputs(port, pattern)
                .with_context(|| format!("applying glob pattern for '{name}.{port}'"))?;
        }

        procs.insert(name.clone(), process);
    }

    let mut sink = Sink::new();
    let mut sink_used = false;

    for conn in cfg.connections.iter() {
        let from = Endpoint::from_str(&conn.from).map_err(|e| anyhow!(e))?;
        let to = Endpoint::from_str(&conn.to).map_err(|e| anyhow!(e))?;

        let (from_process, from_port) = match &from {
            Endpoint::Port { process, port } => (process.clone(), port.clone()),
            Endpoint::Sink => return Err(anyhow!("\"sink\" cannot be a connection source")),
        };

        match to {
            Endpoint::Sink => {
                let producer = procs.get_mut(&from_process).ok_or_else(|| {
                    anyhow!("connection source references unknown process '{from_process}'")
                })?;
                sink.connect_from(producer.out_port_mut(&from_port)?, capacity)?;
                sink_used = true;
                debug!(from = %conn.from, "connected out-port to sink");
            }
            Endpoint::Port { process, port } => {
                // Take the producer out of the map so we can borrow the
                // consumer from it at the same time.
                let mut producer = procs.remove(&from_process).ok_or_else(|| {
                    anyhow!("connection source references unknown process '{from_process}'")
                })?;
                let wired = wire(&mut producer, &from_port, &mut procs, &process, &port, capacity);
                procs.insert(from_process.clone(), producer);
                wired.with_context(|| {
                    format!("connecting '{}' to '{}'", conn.from, conn.to)
                })?;
                debug!(from = %conn.from, to = %conn.to, "connected ports");
            }
        }
    }

    let mut runner = PipelineRunner::new();
    for (_, process) in procs {
        runner.add_process(process);
    }
    if sink_used {
        runner.add_process(sink);
    }
    Ok(runner)
}

fn wire(
    producer: &mut ShellProcess,
    from_port: &str,
    procs: &mut BTreeMap<String, ShellProcess>,
    to_process: &str,
    to_port: &str,
    capacity: usize,
) -> errors::Result<()> {
    let consumer = procs.get_mut(to_process).ok_or_else(|| {
        errors::EngineError::config(format!(
            "connection target references unknown process '{to_process}'"
        ))
    })?;
    connect(
        producer.out_port_mut(from_port)?,
        consumer.in_port_mut(to_port)?,
        capacity,
    )
}
