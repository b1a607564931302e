// src/config/model.rs

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::str::FromStr;

use serde::Deserialize;

use crate::template::{self, PlaceholderKind};

/// Top-level pipeline description as read from a TOML file.
///
/// ```toml
/// [pipeline]
/// buffer_size = 16
///
/// [process.create]
/// cmd = "ls -l / > {o:out}"
///
/// [process.create.path.out]
/// type = "static"
/// path = "ls.txt"
///
/// [process.grep]
/// cmd = "grep etc {i:in} > {o:out}"
///
/// [process.grep.path.out]
/// type = "extend"
/// from = "in"
/// ext = ".grepped.txt"
///
/// [[connect]]
/// from = "create.out"
/// to = "grep.in"
///
/// [[connect]]
/// from = "grep.out"
/// to = "sink"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineFile {
    /// Global engine settings from `[pipeline]`.
    #[serde(default)]
    pub pipeline: PipelineSection,

    /// All processes from `[process.<name>]`, keyed by process name.
    #[serde(default)]
    pub process: BTreeMap<String, ProcessConfig>,

    /// Port connections from `[[connect]]`.
    #[serde(default, rename = "connect")]
    pub connections: Vec<Connection>,
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineSection {
    /// Bounded-channel capacity used for every port connection.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

fn default_buffer_size() -> usize {
    crate::flow::DEFAULT_BUFFER_SIZE
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
        }
    }
}

/// `[process.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessConfig {
    /// The command template.
    pub cmd: String,

    /// String prepended to every shell invocation of this process.
    #[serde(default)]
    pub prepend: Option<String>,

    /// Static parameter bindings, expanded into the template before port
    /// discovery. A `{p:name}` with a binding here induces no port.
    #[serde(default)]
    pub params: BTreeMap<String, String>,

    /// Static input paths, expanded like `params` for `{i:name}`.
    #[serde(default)]
    pub files_in: BTreeMap<String, String>,

    /// Static output paths, expanded like `params` for `{o:name}`/`{os:name}`.
    #[serde(default)]
    pub files_out: BTreeMap<String, String>,

    /// Path formatter per output port, from `[process.<name>.path.<port>]`.
    #[serde(default)]
    pub path: BTreeMap<String, PathSpec>,

    /// Glob pattern per glob-produced output port.
    #[serde(default)]
    pub glob: BTreeMap<String, String>,
}

/// One path formatter in TOML form.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PathSpec {
    /// Always the same literal path.
    Static { path: String },
    /// The path of the input target on `from`, extended with `ext`.
    Extend { from: String, ext: String },
    /// The path of the input target on `from`, with `old` replaced by `new`.
    Replace { from: String, old: String, new: String },
}

/// One `[[connect]]` entry. `from` must be `"process.port"`; `to` is either
/// `"process.port"` or `"sink"`.
#[derive(Debug, Clone, Deserialize)]
pub struct Connection {
    pub from: String,
    pub to: String,
}

/// A parsed connection endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Port { process: String, port: String },
    Sink,
}

impl FromStr for Endpoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "sink" {
            return Ok(Endpoint::Sink);
        }
        match s.split_once('.') {
            Some((process, port)) if !process.is_empty() && !port.is_empty() => {
                Ok(Endpoint::Port {
                    process: process.to_string(),
                    port: port.to_string(),
                })
            }
            _ => Err(format!(
                "invalid endpoint '{s}' (expected \"process.port\" or \"sink\")"
            )),
        }
    }
}

/// The ports a process config declares once its static bindings are
/// expanded away.
#[derive(Debug, Clone, Default)]
pub struct PortDecls {
    pub inputs: BTreeSet<String>,
    pub outputs: BTreeSet<String>,
    pub streamed: BTreeSet<String>,
    pub params: BTreeSet<String>,
}

impl ProcessConfig {
    /// The command after static expansion of `params` / `files_in` /
    /// `files_out`. This is exactly what the built process will run against.
    pub fn expanded_cmd(&self) -> String {
        template::expand_command(
            &self.cmd,
            &to_hash_map(&self.files_in),
            &to_hash_map(&self.files_out),
            &to_hash_map(&self.params),
        )
    }

    /// Ports surviving static expansion, grouped by kind.
    pub fn declared_ports(&self) -> PortDecls {
        let mut decls = PortDecls::default();
        for ph in template::parse_placeholders(&self.expanded_cmd()) {
            match ph.kind {
                PlaceholderKind::Input => {
                    decls.inputs.insert(ph.name);
                }
                PlaceholderKind::Output => {
                    decls.outputs.insert(ph.name);
                }
                PlaceholderKind::StreamedOutput => {
                    decls.streamed.insert(ph.name.clone());
                    decls.outputs.insert(ph.name);
                }
                PlaceholderKind::Param => {
                    decls.params.insert(ph.name);
                }
            }
        }
        decls
    }
}

pub(crate) fn to_hash_map(map: &BTreeMap<String, String>) -> HashMap<String, String> {
    map.iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}
