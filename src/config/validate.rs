// src/config/validate.rs

use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{Connection, Endpoint, PathSpec, PipelineFile, PortDecls};

/// Run semantic validation against a loaded pipeline description.
///
/// This checks:
/// - there is at least one process and `buffer_size >= 1`
/// - formatter and glob entries reference declared ports, and every
///   non-glob output port has exactly one formatter
/// - no parameter port survives static expansion (TOML pipelines bind
///   params via `[process.<name>.params]`; streamed params are a library
///   API feature)
/// - every connection endpoint exists, kinds and directions match, and no
///   port is connected more than once
/// - every declared port is connected
/// - the process connection graph is acyclic
pub fn validate_pipeline(cfg: &PipelineFile) -> Result<()> {
    ensure_has_processes(cfg)?;
    validate_pipeline_section(cfg)?;

    let decls = declared_ports(cfg);
    validate_process_ports(cfg, &decls)?;
    validate_connections(cfg, &decls)?;
    validate_dag(cfg)?;
    Ok(())
}

fn ensure_has_processes(cfg: &PipelineFile) -> Result<()> {
    if cfg.process.is_empty() {
        return Err(anyhow!(
            "pipeline must contain at least one [process.<name>] section"
        ));
    }
    Ok(())
}

fn validate_pipeline_section(cfg: &PipelineFile) -> Result<()> {
    if cfg.pipeline.buffer_size == 0 {
        return Err(anyhow!("[pipeline].buffer_size must be >= 1 (got 0)"));
    }
    Ok(())
}

fn declared_ports(cfg: &PipelineFile) -> BTreeMap<String, PortDecls> {
    cfg.process
        .iter()
        .map(|(name, pc)| (name.clone(), pc.declared_ports()))
        .collect()
}

fn validate_process_ports(cfg: &PipelineFile, decls: &BTreeMap<String, PortDecls>) -> Result<()> {
    for (name, pc) in cfg.process.iter() {
        let ports = &decls[name];

        if let Some(port) = ports
            .inputs
            .intersection(&ports.outputs)
            .chain(ports.inputs.intersection(&ports.params))
            .chain(ports.outputs.intersection(&ports.params))
            .next()
        {
            return Err(anyhow!(
                "port name '{}' of process '{}' is used with more than one placeholder kind",
                port,
                name
            ));
        }

        if let Some(param) = ports.params.iter().next() {
            return Err(anyhow!(
                "process '{}' declares param-port '{}' with no static value; \
                 TOML pipelines must bind parameters via [process.{}.params]",
                name,
                param,
                name
            ));
        }

        for (port, spec) in pc.path.iter() {
            if !ports.outputs.contains(port) {
                return Err(anyhow!(
                    "process '{}' has a path formatter for unknown out-port '{}'",
                    name,
                    port
                ));
            }
            if pc.glob.contains_key(port) {
                return Err(anyhow!(
                    "out-port '{}' of process '{}' has both a path formatter and a glob pattern",
                    port,
                    name
                ));
            }
            validate_path_spec(name, port, spec, ports)?;
        }

        for port in pc.glob.keys() {
            if !ports.outputs.contains(port) {
                return Err(anyhow!(
                    "process '{}' has a glob pattern for unknown out-port '{}'",
                    name,
                    port
                ));
            }
            if ports.streamed.contains(port) {
                return Err(anyhow!(
                    "out-port '{}' of process '{}' cannot both stream and glob",
                    port,
                    name
                ));
            }
        }

        for port in &ports.outputs {
            if !pc.path.contains_key(port) && !pc.glob.contains_key(port) {
                return Err(anyhow!(
                    "out-port '{}' of process '{}' has no path formatter or glob pattern",
                    port,
                    name
                ));
            }
        }
    }
    Ok(())
}

fn validate_path_spec(
    process: &str,
    port: &str,
    spec: &PathSpec,
    ports: &PortDecls,
) -> Result<()> {
    let from = match spec {
        PathSpec::Static { .. } => return Ok(()),
        PathSpec::Extend { from, .. } => from,
        PathSpec::Replace { from, .. } => from,
    };
    if !ports.inputs.contains(from) {
        return Err(anyhow!(
            "path formatter for out-port '{}' of process '{}' references unknown in-port '{}'",
            port,
            process,
            from
        ));
    }
    Ok(())
}

fn validate_connections(cfg: &PipelineFile, decls: &BTreeMap<String, PortDecls>) -> Result<()> {
    let mut used_from: BTreeSet<(String, String)> = BTreeSet::new();
    let mut used_to: BTreeSet<(String, String)> = BTreeSet::new();

    for conn in cfg.connections.iter() {
        let (from_process, from_port) = parse_source(conn)?;
        let ports = decls.get(&from_process).ok_or_else(|| {
            anyhow!("connection source references unknown process '{from_process}'")
        })?;
        if !ports.outputs.contains(&from_port) {
            return Err(anyhow!(
                "connection source '{}.{}' is not a declared out-port",
                from_process,
                from_port
            ));
        }
        if !used_from.insert((from_process.clone(), from_port.clone())) {
            return Err(anyhow!(
                "out-port '{}.{}' is connected more than once",
                from_process,
                from_port
            ));
        }

        let to = Endpoint::from_str(&conn.to)
            .map_err(|e| anyhow!(e))
            .with_context(|| format!("in connection from '{}'", conn.from))?;
        match to {
            Endpoint::Sink => {}
            Endpoint::Port { process, port } => {
                let ports = decls.get(&process).ok_or_else(|| {
                    anyhow!("connection target references unknown process '{process}'")
                })?;
                if !ports.inputs.contains(&port) {
                    return Err(anyhow!(
                        "connection target '{}.{}' is not a declared in-port",
                        process,
                        port
                    ));
                }
                if process == from_process {
                    return Err(anyhow!(
                        "process '{}' cannot be connected to itself",
                        process
                    ));
                }
                if !used_to.insert((process.clone(), port.clone())) {
                    return Err(anyhow!(
                        "in-port '{}.{}' is connected more than once",
                        process,
                        port
                    ));
                }
            }
        }
    }

    // Every declared port must take part in exactly one connection.
    for (name, ports) in decls.iter() {
        for port in &ports.inputs {
            if !used_to.contains(&(name.clone(), port.clone())) {
                return Err(anyhow!(
                    "in-port '{}.{}' is not connected; add a [[connect]] entry",
                    name,
                    port
                ));
            }
        }
        for port in &ports.outputs {
            if !used_from.contains(&(name.clone(), port.clone())) {
                return Err(anyhow!(
                    "out-port '{}.{}' is not connected; add a [[connect]] entry \
                     (use to = \"sink\" to discard it)",
                    name,
                    port
                ));
            }
        }
    }

    Ok(())
}

fn parse_source(conn: &Connection) -> Result<(String, String)> {
    let from = Endpoint::from_str(&conn.from)
        .map_err(|e| anyhow!(e))
        .with_context(|| format!("in connection to '{}'", conn.to))?;
    match from {
        Endpoint::Port { process, port } => Ok((process, port)),
        Endpoint::Sink => Err(anyhow!(
            "connection to '{}' uses \"sink\" as a source; sinks only consume",
            conn.to
        )),
    }
}

fn validate_dag(cfg: &PipelineFile) -> Result<()> {
    // Process-level graph: one edge per connection between two processes.
    // Edges to "sink" are terminal and cannot participate in a cycle.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.process.keys() {
        graph.add_node(name.as_str());
    }

    for conn in cfg.connections.iter() {
        let from = Endpoint::from_str(&conn.from).map_err(|e| anyhow!(e))?;
        let to = Endpoint::from_str(&conn.to).map_err(|e| anyhow!(e))?;
        if let (Endpoint::Port { process: fp, .. }, Endpoint::Port { process: tp, .. }) =
            (&from, &to)
        {
            if let (Some(f), Some(t)) = (
                cfg.process.get_key_value(fp).map(|(k, _)| k.as_str()),
                cfg.process.get_key_value(tp).map(|(k, _)| k.as_str()),
            ) {
                graph.add_edge(f, t, ());
            }
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => {
            let node = cycle.node_id();
            Err(anyhow!(
                "cycle detected in pipeline graph involving process '{}'",
                node
            ))
        }
    }
}
