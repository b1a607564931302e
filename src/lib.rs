// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod flow;
pub mod logging;
pub mod process;
pub mod template;

use std::path::PathBuf;

use tracing::debug;

use crate::cli::CliArgs;
use crate::config::{build_pipeline, load_and_validate, PipelineFile};

pub use crate::engine::{PipelineProcess, PipelineRunner};
pub use crate::errors::{EngineError, Result};
pub use crate::flow::{
    connect, FileInPort, FileOutPort, FileTarget, InPort, OutPort, ParamInPort, ParamOutPort,
    DEFAULT_BUFFER_SIZE,
};
pub use crate::process::{FileQueue, ShellProcess, Sink, Task, TaskOutcome};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - pipeline loading + validation
/// - process construction and port wiring
/// - the pipeline runner
pub async fn run(args: CliArgs) -> anyhow::Result<()> {
    let pipeline_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&pipeline_path)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let runner = build_pipeline(&cfg)?;
    runner.run().await?;
    Ok(())
}

/// Simple dry-run output: print processes, ports, and connections.
fn print_dry_run(cfg: &PipelineFile) {
    println!("sciflow dry-run");
    println!("  pipeline.buffer_size = {}", cfg.pipeline.buffer_size);
    println!();

    println!("processes ({}):", cfg.process.len());
    for (name, pc) in cfg.process.iter() {
        println!("  - {name}");
        println!("      cmd: {}", pc.expanded_cmd());
        if let Some(ref prepend) = pc.prepend {
            println!("      prepend: {prepend}");
        }
        let ports = pc.declared_ports();
        if !ports.inputs.is_empty() {
            println!("      in: {:?}", ports.inputs);
        }
        if !ports.outputs.is_empty() {
            println!("      out: {:?}", ports.outputs);
        }
        if !ports.streamed.is_empty() {
            println!("      streamed: {:?}", ports.streamed);
        }
        for (port, pattern) in pc.glob.iter() {
            println!("      glob {port}: {pattern}");
        }
    }

    println!();
    println!("connections ({}):", cfg.connections.len());
    for conn in cfg.connections.iter() {
        println!("  - {} -> {}", conn.from, conn.to);
    }

    debug!("dry-run complete (no execution)");
}
