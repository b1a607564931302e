use std::error::Error;
use std::fs;
use std::path::Path;

use tempfile::tempdir;

use sciflow::config::{build_pipeline, load_and_validate};

type TestResult = Result<(), Box<dyn Error>>;

fn write_pipeline(dir: &Path, contents: &str) -> std::io::Result<std::path::PathBuf> {
    let path = dir.join("Sciflow.toml");
    fs::write(&path, contents)?;
    Ok(path)
}

#[tokio::test]
async fn toml_pipeline_runs_end_to_end() -> TestResult {
    let dir = tempdir()?;
    let foo = dir.path().join("foo.txt");

    let toml = format!(
        r#"
[process.t1]
cmd = "echo foo > {{o:foo}}"

[process.t1.path.foo]
type = "static"
path = "{foo}"

[process.t2]
cmd = "sed 's/foo/bar/g' {{i:foo}} > {{o:bar}}"

[process.t2.path.bar]
type = "extend"
from = "foo"
ext = ".bar.txt"

[[connect]]
from = "t1.foo"
to = "t2.foo"

[[connect]]
from = "t2.bar"
to = "sink"
"#,
        foo = foo.display()
    );

    let path = write_pipeline(dir.path(), &toml)?;
    let cfg = load_and_validate(&path)?;
    assert_eq!(cfg.pipeline.buffer_size, 16);

    let runner = build_pipeline(&cfg)?;
    runner.run().await?;

    assert_eq!(fs::read_to_string(&foo)?, "foo\n");
    let bar = dir.path().join("foo.txt.bar.txt");
    assert_eq!(fs::read_to_string(&bar)?, "bar\n");
    Ok(())
}

#[tokio::test]
async fn static_params_expand_before_port_discovery() -> TestResult {
    let dir = tempdir()?;
    let out = dir.path().join("greeting.txt");

    let toml = format!(
        r#"
[process.greet]
cmd = "echo {{p:word}} > {{o:out}}"

[process.greet.params]
word = "hello"

[process.greet.path.out]
type = "static"
path = "{out}"

[[connect]]
from = "greet.out"
to = "sink"
"#,
        out = out.display()
    );

    let path = write_pipeline(dir.path(), &toml)?;
    let cfg = load_and_validate(&path)?;
    build_pipeline(&cfg)?.run().await?;

    assert_eq!(fs::read_to_string(&out)?, "hello\n");
    Ok(())
}

#[test]
fn unbound_param_port_is_rejected() -> TestResult {
    let dir = tempdir()?;
    let toml = r#"
[process.greet]
cmd = "echo {p:word} > out.txt"
"#;
    let path = write_pipeline(dir.path(), toml)?;
    let err = load_and_validate(&path).unwrap_err();
    assert!(err.to_string().contains("param-port"), "got: {err}");
    Ok(())
}

#[test]
fn missing_formatter_is_rejected() -> TestResult {
    let dir = tempdir()?;
    let toml = r#"
[process.a]
cmd = "echo x > {o:out}"

[[connect]]
from = "a.out"
to = "sink"
"#;
    let path = write_pipeline(dir.path(), toml)?;
    let err = load_and_validate(&path).unwrap_err();
    assert!(
        err.to_string().contains("no path formatter"),
        "got: {err}"
    );
    Ok(())
}

#[test]
fn unknown_connection_endpoint_is_rejected() -> TestResult {
    let dir = tempdir()?;
    let toml = r#"
[process.a]
cmd = "echo x > {o:out}"

[process.a.path.out]
type = "static"
path = "x.txt"

[[connect]]
from = "a.out"
to = "ghost.in"
"#;
    let path = write_pipeline(dir.path(), toml)?;
    let err = load_and_validate(&path).unwrap_err();
    assert!(err.to_string().contains("ghost"), "got: {err}");
    Ok(())
}

#[test]
fn unconnected_port_is_rejected() -> TestResult {
    let dir = tempdir()?;
    let toml = r#"
[process.a]
cmd = "echo x > {o:out}"

[process.a.path.out]
type = "static"
path = "x.txt"
"#;
    let path = write_pipeline(dir.path(), toml)?;
    let err = load_and_validate(&path).unwrap_err();
    assert!(err.to_string().contains("not connected"), "got: {err}");
    Ok(())
}

#[test]
fn cyclic_pipeline_is_rejected() -> TestResult {
    let dir = tempdir()?;
    let toml = r#"
[process.a]
cmd = "cat {i:from_b} > {o:to_b}"

[process.a.path.to_b]
type = "extend"
from = "from_b"
ext = ".a"

[process.b]
cmd = "cat {i:from_a} > {o:to_a}"

[process.b.path.to_a]
type = "extend"
from = "from_a"
ext = ".b"

[[connect]]
from = "a.to_b"
to = "b.from_a"

[[connect]]
from = "b.to_a"
to = "a.from_b"
"#;
    let path = write_pipeline(dir.path(), toml)?;
    let err = load_and_validate(&path).unwrap_err();
    assert!(err.to_string().contains("cycle"), "got: {err}");
    Ok(())
}

#[test]
fn double_connection_is_rejected() -> TestResult {
    let dir = tempdir()?;
    let toml = r#"
[process.a]
cmd = "echo x > {o:out}"

[process.a.path.out]
type = "static"
path = "x.txt"

[[connect]]
from = "a.out"
to = "sink"

[[connect]]
from = "a.out"
to = "sink"
"#;
    let path = write_pipeline(dir.path(), toml)?;
    let err = load_and_validate(&path).unwrap_err();
    assert!(
        err.to_string().contains("connected more than once"),
        "got: {err}"
    );
    Ok(())
}
