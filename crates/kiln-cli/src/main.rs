//! Kiln program runner.
//!
//! Loads a program, binds one method to a fixed-size metadata arena and
//! freshly allocated planned buffers, sets every tensor input to ones,
//! executes once and prints each output.
//!
//! Usage:
//!   kiln-runner --model-path model.kiln [--method NAME] [--profile]

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use kiln_arena::ArenaConfig;
use kiln_program::{FileDataLoader, Program};
use kiln_runtime::{run_method, runtime_init, InputPolicy, RuntimeConfig};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "kiln-runner")]
#[command(about = "Run one method of a Kiln program with ones as inputs")]
struct Cli {
    /// Program file to run
    #[arg(long, default_value = "model.kiln")]
    model_path: PathBuf,

    /// Where to write profiling data, if any was collected
    #[arg(long, default_value = "prof_result.bin")]
    prof_result_path: PathBuf,

    /// Method to run (defaults to the program's first method)
    #[arg(long)]
    method: Option<String>,

    /// Metadata arena capacity in bytes
    #[arg(long, default_value_t = ArenaConfig::DEFAULT_METHOD_ARENA_BYTES)]
    method_arena_bytes: usize,

    /// Leading and trailing elements printed for long tensors
    #[arg(long, default_value_t = 100)]
    edge_items: usize,

    /// Record arena and per-instruction timing data
    #[arg(long)]
    profile: bool,

    /// Log filter, used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log: String,
}

impl Cli {
    fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            method_arena_bytes: self.method_arena_bytes,
            profiling: self.profile,
            input_policy: InputPolicy::Ones,
        }
    }
}

fn run(cli: &Cli, out: &mut dyn Write) -> Result<()> {
    runtime_init();

    let loader = FileDataLoader::from(&cli.model_path)
        .with_context(|| format!("failed to open {}", cli.model_path.display()))?;
    let program = Program::load(&loader)
        .with_context(|| format!("failed to parse {}", cli.model_path.display()))?;
    info!(
        path = %cli.model_path.display(),
        methods = program.num_methods(),
        "model file loaded"
    );

    let method_name = match &cli.method {
        Some(name) => name.clone(),
        None => program
            .get_method_name(0)
            .context("program has no methods")?
            .to_owned(),
    };
    let meta = program
        .method_meta(&method_name)
        .with_context(|| format!("failed to get metadata for method '{method_name}'"))?;
    info!(
        method = %method_name,
        inputs = meta.num_inputs(),
        outputs = meta.num_outputs(),
        planned_buffers = meta.num_memory_planned_buffers(),
        "using method"
    );

    let (lines, profile) = run_method(&program, &method_name, &cli.runtime_config(), |method| {
        method.execute()?;
        info!(method = %method_name, "model executed successfully");
        let lines = (0..method.outputs_size())
            .map(|i| {
                method
                    .output(i)
                    .map(|v| format!("Output {i}: {}", v.display(cli.edge_items)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok((lines, method.profile_result()))
    })
    .with_context(|| format!("failed to run method '{method_name}'"))?;

    for line in &lines {
        writeln!(out, "{line}")?;
    }

    let dump = profile.encode();
    if dump.is_empty() {
        debug!("no profiling data collected");
    } else {
        std::fs::write(&cli.prof_result_path, &dump).with_context(|| {
            format!("failed to write {}", cli.prof_result_path.display())
        })?;
        info!(
            path = %cli.prof_result_path.display(),
            bytes = dump.len(),
            "profiling data written"
        );
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log)),
        )
        .with_writer(io::stderr)
        .init();

    let stdout = io::stdout();
    run(&cli, &mut stdout.lock())
}
