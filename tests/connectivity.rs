use std::error::Error;

use tempfile::tempdir;

use sciflow::{
    connect, EngineError, FileInPort, FileOutPort, PipelineRunner, ShellProcess, Sink,
    DEFAULT_BUFFER_SIZE,
};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn pipeline_with_unconnected_port_refuses_to_start() -> TestResult {
    let dir = tempdir()?;
    let out = dir.path().join("never.txt");

    // Declared out-port left unconnected.
    let mut lonely = ShellProcess::from_shell("lonely", "echo x > {o:out}");
    lonely.set_path_static("out", &out)?;

    let mut runner = PipelineRunner::new();
    runner.add_process(lonely);

    let result = runner.run().await;
    match result {
        Err(EngineError::Config(msg)) => assert!(msg.contains("lonely"), "got: {msg}"),
        other => panic!("expected Config error, got {other:?}"),
    }
    assert!(!out.exists(), "no task may run in a rejected pipeline");
    Ok(())
}

#[tokio::test]
async fn unconnected_input_is_also_rejected() -> TestResult {
    let mut consumer = ShellProcess::from_shell("consumer", "cat {i:in}");
    // Silence the unused-variable nature of the test: the port stays
    // deliberately unconnected.
    assert!(consumer.in_port_mut("in").is_ok());

    let mut runner = PipelineRunner::new();
    runner.add_process(consumer);

    assert!(runner.run().await.is_err());
    Ok(())
}

#[test]
fn ports_connect_only_once() -> TestResult {
    let mut out: FileOutPort = FileOutPort::new();
    let mut inp: FileInPort = FileInPort::new();
    connect(&mut out, &mut inp, DEFAULT_BUFFER_SIZE)?;

    let mut other: FileInPort = FileInPort::new();
    assert!(connect(&mut out, &mut other, DEFAULT_BUFFER_SIZE).is_err());

    let mut third: FileOutPort = FileOutPort::new();
    assert!(connect(&mut third, &mut inp, DEFAULT_BUFFER_SIZE).is_err());
    Ok(())
}

#[tokio::test]
async fn missing_path_formatter_fails_at_task_time() -> TestResult {
    let mut orphan = ShellProcess::from_shell("orphan", "echo x > {o:out}");
    let mut sink = Sink::new();
    sink.connect_from(orphan.out_port_mut("out")?, DEFAULT_BUFFER_SIZE)?;

    let mut runner = PipelineRunner::new();
    runner.add_process(orphan);
    runner.add_process(sink);

    match runner.run().await {
        Err(EngineError::Config(msg)) => {
            assert!(msg.contains("no path formatter"), "got: {msg}")
        }
        other => panic!("expected Config error, got {other:?}"),
    }
    Ok(())
}

#[test]
fn formatters_reject_unknown_ports() {
    let mut p = ShellProcess::from_shell("p", "echo x > {o:out}");
    assert!(p.set_path_static("nope", "x.txt").is_err());
    assert!(p.set_path_extend("missing_in", "out", ".x").is_err());
    assert!(p.glob_outputs("nope", "x*").is_err());
}
