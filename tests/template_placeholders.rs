use std::collections::HashMap;
use std::error::Error;

use sciflow::template::{
    expand_command, parse_placeholders, resolve_command, PlaceholderKind,
};

type TestResult = Result<(), Box<dyn Error>>;

fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn parses_all_placeholder_kinds_in_order() -> TestResult {
    let phs = parse_placeholders("bwa mem {i:ref} {i:reads} -t {p:threads} > {os:sam} {o:log}");
    let kinds: Vec<_> = phs.iter().map(|p| p.kind).collect();
    let names: Vec<_> = phs.iter().map(|p| p.name.as_str()).collect();

    assert_eq!(
        kinds,
        vec![
            PlaceholderKind::Input,
            PlaceholderKind::Input,
            PlaceholderKind::Param,
            PlaceholderKind::StreamedOutput,
            PlaceholderKind::Output,
        ]
    );
    assert_eq!(names, vec!["ref", "reads", "threads", "sam", "log"]);
    Ok(())
}

#[test]
fn ignores_braces_that_are_not_placeholders() -> TestResult {
    assert!(parse_placeholders("awk '{print $1}' file").is_empty());
    assert!(parse_placeholders("echo {x:name} {i:} {i:9bad}").is_empty());
    Ok(())
}

#[test]
fn static_expansion_replaces_only_bound_placeholders() -> TestResult {
    let cmd = "cat {i:in} | tr a-z A-Z > {o:out} # {p:tag}";
    let expanded = expand_command(
        cmd,
        &map(&[("in", "data.txt")]),
        &HashMap::new(),
        &map(&[("tag", "v1")]),
    );
    assert_eq!(expanded, "cat data.txt | tr a-z A-Z > {o:out} # v1");
    Ok(())
}

#[test]
fn substitution_replaces_every_placeholder_exactly_once() -> TestResult {
    let cmd = "cp {i:src} {o:dst} && echo {p:msg} {p:msg}";
    let resolved = resolve_command(
        cmd,
        &map(&[("src", "a.txt")]),
        &map(&[("dst", "b.txt.tmp")]),
        &map(&[("msg", "done")]),
    )?;
    assert_eq!(resolved, "cp a.txt b.txt.tmp && echo done done");
    Ok(())
}

#[test]
fn substitution_fails_on_unbound_placeholder() {
    let result = resolve_command(
        "cat {i:missing}",
        &HashMap::new(),
        &HashMap::new(),
        &HashMap::new(),
    );
    assert!(result.is_err());
}

/// Round trip: substituting each placeholder with its own spelling yields
/// the template unchanged.
#[test]
fn identity_substitution_round_trips() -> TestResult {
    let cmd = "run {i:a} {p:b} > {o:c} 2> {os:d}";
    let resolved = resolve_command(
        cmd,
        &map(&[("a", "{i:a}")]),
        &map(&[("c", "{o:c}"), ("d", "{os:d}")]),
        &map(&[("b", "{p:b}")]),
    )?;
    assert_eq!(resolved, cmd);
    Ok(())
}
