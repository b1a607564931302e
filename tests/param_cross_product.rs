use std::error::Error;
use std::fs;

use async_trait::async_trait;
use tempfile::tempdir;

use sciflow::{
    connect, EngineError, ParamOutPort, PipelineProcess, PipelineRunner, ShellProcess, Sink,
    DEFAULT_BUFFER_SIZE,
};

type TestResult = Result<(), Box<dyn Error>>;

/// Emits the full cross product of three parameter sets, one triple per
/// iteration, then closes its ports.
struct Combinatorics {
    a: ParamOutPort,
    b: ParamOutPort,
    c: ParamOutPort,
}

impl Combinatorics {
    fn new() -> Self {
        Self {
            a: ParamOutPort::new(),
            b: ParamOutPort::new(),
            c: ParamOutPort::new(),
        }
    }
}

#[async_trait]
impl PipelineProcess for Combinatorics {
    fn name(&self) -> &str {
        "combinatorics"
    }

    fn is_connected(&self) -> bool {
        self.a.is_connected() && self.b.is_connected() && self.c.is_connected()
    }

    async fn run(mut self: Box<Self>) -> sciflow::Result<()> {
        for a in ["a1", "a2", "a3"] {
            for b in ["b1", "b2", "b3"] {
                for c in ["c1", "c2", "c3"] {
                    self.a.send(a.to_string()).await?;
                    self.b.send(b.to_string()).await?;
                    self.c.send(c.to_string()).await?;
                }
            }
        }
        self.a.close();
        self.b.close();
        self.c.close();
        Ok(())
    }
}

#[tokio::test]
async fn param_cross_product_produces_all_27_files() -> TestResult {
    let dir = tempdir()?;

    let mut cmb = Combinatorics::new();

    let mut abc = ShellProcess::from_shell("abc", "echo {p:a} {p:b} {p:c} > {o:out}");
    let out_dir = dir.path().to_path_buf();
    abc.set_path_custom("out", move |task| {
        let a = task
            .param("a")
            .ok_or_else(|| EngineError::config("param 'a' is not bound"))?;
        let b = task
            .param("b")
            .ok_or_else(|| EngineError::config("param 'b' is not bound"))?;
        let c = task
            .param("c")
            .ok_or_else(|| EngineError::config("param 'c' is not bound"))?;
        Ok(out_dir.join(format!("{a}_{b}_{c}.txt")))
    })?;

    connect(&mut cmb.a, abc.param_port_mut("a")?, DEFAULT_BUFFER_SIZE)?;
    connect(&mut cmb.b, abc.param_port_mut("b")?, DEFAULT_BUFFER_SIZE)?;
    connect(&mut cmb.c, abc.param_port_mut("c")?, DEFAULT_BUFFER_SIZE)?;

    let mut sink = Sink::new();
    sink.connect_from(abc.out_port_mut("out")?, DEFAULT_BUFFER_SIZE)?;

    let mut runner = PipelineRunner::new();
    runner.add_process(cmb);
    runner.add_process(abc);
    runner.add_process(sink);
    runner.run().await?;

    for a in ["a1", "a2", "a3"] {
        for b in ["b1", "b2", "b3"] {
            for c in ["c1", "c2", "c3"] {
                let path = dir.path().join(format!("{a}_{b}_{c}.txt"));
                assert_eq!(
                    fs::read_to_string(&path)?,
                    format!("{a} {b} {c}\n"),
                    "unexpected content in {path:?}"
                );
            }
        }
    }
    Ok(())
}
