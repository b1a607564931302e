// src/template.rs

//! The command template language.
//!
//! Templates embed placeholders of the form `{K:NAME}` where `K` is one of
//! `i` (input file), `o` (output file), `os` (streamed output file), or `p`
//! (parameter), and `NAME` is an identifier. Parsing a template yields the
//! ports a process must declare; substitution replaces each placeholder with
//! a concrete path or parameter value.

use std::collections::HashMap;

use regex::Regex;

use crate::errors::{EngineError, Result};

/// What a placeholder stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderKind {
    Input,
    Output,
    StreamedOutput,
    Param,
}

impl PlaceholderKind {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "i" => Some(PlaceholderKind::Input),
            "o" => Some(PlaceholderKind::Output),
            "os" => Some(PlaceholderKind::StreamedOutput),
            "p" => Some(PlaceholderKind::Param),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            PlaceholderKind::Input => "i",
            PlaceholderKind::Output => "o",
            PlaceholderKind::StreamedOutput => "os",
            PlaceholderKind::Param => "p",
        }
    }
}

/// One `{K:NAME}` occurrence in a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub kind: PlaceholderKind,
    pub name: String,
}

/// The placeholder grammar. Literal braces that do not form `{K:NAME}` with
/// an identifier name are left untouched by every function in this module.
fn placeholder_regex() -> Regex {
    // "os" before "o" so the streamed tag wins on its full spelling.
    Regex::new(r"\{(os|i|o|p):([A-Za-z_][A-Za-z0-9_]*)\}")
        .expect("placeholder regex is statically valid")
}

/// All placeholders in a template, in order of appearance. Repeated
/// occurrences are reported repeatedly; callers dedup by name.
pub fn parse_placeholders(cmd: &str) -> Vec<Placeholder> {
    let re = placeholder_regex();
    re.captures_iter(cmd)
        .filter_map(|caps| {
            let kind = PlaceholderKind::from_tag(&caps[1])?;
            Some(Placeholder {
                kind,
                name: caps[2].to_string(),
            })
        })
        .collect()
}

/// Static expansion, applied before process construction.
///
/// Placeholders with a value in the corresponding map are replaced with that
/// literal; placeholders without one survive verbatim and will become ports.
pub fn expand_command(
    cmd: &str,
    in_paths: &HashMap<String, String>,
    out_paths: &HashMap<String, String>,
    params: &HashMap<String, String>,
) -> String {
    let re = placeholder_regex();
    re.replace_all(cmd, |caps: &regex::Captures| {
        let name = &caps[2];
        let bound = match PlaceholderKind::from_tag(&caps[1]) {
            Some(PlaceholderKind::Input) => in_paths.get(name),
            Some(PlaceholderKind::Output) | Some(PlaceholderKind::StreamedOutput) => {
                out_paths.get(name)
            }
            Some(PlaceholderKind::Param) => params.get(name),
            None => None,
        };
        match bound {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        }
    })
    .into_owned()
}

/// Per-task substitution.
///
/// Unlike [`expand_command`], every surviving placeholder must have an entry
/// in the corresponding map; a missing binding is fatal. The task supplies
/// the concrete read/write/FIFO paths in `in_paths` and `out_paths`.
pub fn resolve_command(
    cmd: &str,
    in_paths: &HashMap<String, String>,
    out_paths: &HashMap<String, String>,
    params: &HashMap<String, String>,
) -> Result<String> {
    let re = placeholder_regex();

    let mut bindings: HashMap<String, String> = HashMap::new();
    for caps in re.captures_iter(cmd) {
        let whole = caps[0].to_string();
        if bindings.contains_key(&whole) {
            continue;
        }
        let name = &caps[2];
        let value = match PlaceholderKind::from_tag(&caps[1]) {
            Some(PlaceholderKind::Input) => in_paths.get(name),
            Some(PlaceholderKind::Output) | Some(PlaceholderKind::StreamedOutput) => {
                out_paths.get(name)
            }
            Some(PlaceholderKind::Param) => params.get(name),
            None => None,
        };
        let value = value.cloned().ok_or_else(|| {
            EngineError::config(format!("no binding for placeholder {whole} at task time"))
        })?;
        bindings.insert(whole, value);
    }

    Ok(re
        .replace_all(cmd, |caps: &regex::Captures| bindings[&caps[0]].clone())
        .into_owned())
}
