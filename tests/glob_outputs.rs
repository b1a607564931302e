use std::error::Error;
use std::fs;
use std::path::PathBuf;

use tempfile::tempdir;

use sciflow::{connect, FileInPort, FileQueue, PipelineRunner, ShellProcess, DEFAULT_BUFFER_SIZE};

type TestResult = Result<(), Box<dyn Error>>;

/// A splitter produces files matching a pattern; downstream receives one
/// target per match, in lexical order.
#[tokio::test]
async fn glob_outputs_emit_matches_in_lexical_order() -> TestResult {
    let dir = tempdir()?;
    let input = dir.path().join("ls.txt");
    fs::write(&input, "one\ntwo\nthree\n")?;

    let prefix = dir.path().join("ls.txt.split_");
    let pattern = format!("{}*", prefix.display());

    let mut fq = FileQueue::new([input.clone()]);

    // The {o:splits} reference sits behind '#' so the shell ignores it; the
    // port exists purely to carry the glob-expanded targets.
    let mut split = ShellProcess::from_shell(
        "split",
        format!("split -l1 {{i:in}} {} # {{o:splits}}", prefix.display()),
    );
    split.glob_outputs("splits", &pattern)?;

    let mut copy = ShellProcess::from_shell("copy", "cp {i:in} {o:out}");
    copy.set_path_extend("in", "out", ".copy")?;

    connect(fq.out_mut(), split.in_port_mut("in")?, DEFAULT_BUFFER_SIZE)?;
    connect(
        split.out_port_mut("splits")?,
        copy.in_port_mut("in")?,
        DEFAULT_BUFFER_SIZE,
    )?;
    let mut collector = FileInPort::new();
    connect(copy.out_port_mut("out")?, &mut collector, DEFAULT_BUFFER_SIZE)?;

    let mut runner = PipelineRunner::new();
    runner.add_process(fq);
    runner.add_process(split);
    runner.add_process(copy);
    let pipeline = tokio::spawn(runner.run());

    let mut received = Vec::new();
    while let Some(target) = collector.recv().await {
        received.push(target.path().to_path_buf());
    }
    pipeline.await??;

    // `split -l1` on three lines yields suffixes aa, ab, ac.
    let expected: Vec<PathBuf> = ["aa", "ab", "ac"]
        .iter()
        .map(|suffix| PathBuf::from(format!("{}{}.copy", prefix.display(), suffix)))
        .collect();
    assert_eq!(received, expected);

    for (path, line) in expected.iter().zip(["one\n", "two\n", "three\n"]) {
        assert_eq!(fs::read_to_string(path)?, line, "wrong content in {path:?}");
    }
    Ok(())
}
