use std::error::Error;
use std::path::PathBuf;

use tempfile::tempdir;

use sciflow::{
    connect, EngineError, FileInPort, FileQueue, PipelineRunner, ShellProcess,
    DEFAULT_BUFFER_SIZE,
};

type TestResult = Result<(), Box<dyn Error>>;

/// Targets must arrive downstream in task-creation order even though the
/// tasks themselves execute in parallel.
#[tokio::test]
async fn outputs_forward_in_task_creation_order() -> TestResult {
    let dir = tempdir()?;
    let paths: Vec<PathBuf> = (1..=10)
        .map(|i| dir.path().join(format!("f{i:02}.txt")))
        .collect();

    let mut fq = FileQueue::new(paths.clone());

    // First stage materializes each queued path by echoing it into itself.
    let mut fc = ShellProcess::from_shell("fc", "echo {i:in} > {o:out}");
    fc.set_path_custom("out", |task| {
        task.in_path("in")
            .map(|p| p.to_path_buf())
            .ok_or_else(|| EngineError::config("in-port 'in' is not bound"))
    })?;

    // Second stage copies each file; its outputs are what we observe.
    let mut sl = ShellProcess::from_shell("sl", "cat {i:in} > {o:out}");
    sl.set_path_extend("in", "out", ".copy.txt")?;

    connect(fq.out_mut(), fc.in_port_mut("in")?, DEFAULT_BUFFER_SIZE)?;
    connect(
        fc.out_port_mut("out")?,
        sl.in_port_mut("in")?,
        DEFAULT_BUFFER_SIZE,
    )?;
    let mut collector = FileInPort::new();
    connect(sl.out_port_mut("out")?, &mut collector, DEFAULT_BUFFER_SIZE)?;

    let mut runner = PipelineRunner::new();
    runner.add_process(fq);
    runner.add_process(fc);
    runner.add_process(sl);
    let pipeline = tokio::spawn(runner.run());

    let mut received = Vec::new();
    while let Some(target) = collector.recv().await {
        received.push(target.path().to_path_buf());
    }
    pipeline.await??;

    let expected: Vec<PathBuf> = paths
        .iter()
        .map(|p| {
            let mut s = p.as_os_str().to_os_string();
            s.push(".copy.txt");
            PathBuf::from(s)
        })
        .collect();
    assert_eq!(received, expected);

    for path in &expected {
        assert!(path.exists(), "missing copied file {path:?}");
    }
    Ok(())
}
