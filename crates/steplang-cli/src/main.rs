//! steplang command-line tool.
//!
//! Provides the `steplang` binary with subcommands for working with
//! scripts: `run` executes a script through the full tracing pipeline and
//! prints the trace, `instrument` prints the instrumented source, and
//! `worker` is the stdio worker loop spawned by process isolation (not
//! intended for interactive use).
//!
//! `run` drives the same `run_script` pipeline as the HTTP server,
//! ensuring identical tracing behavior from both entry points.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};

use steplang_core::step::{StepCategory, StepRecord, StepTime};
use steplang_core::{decode, RunOutcome};
use steplang_harness::{
    run_script_blocking, worker, ExecConfig, IsolationStrategy, WorkerSpec,
};
use steplang_instrument::instrument;

/// steplang tracing toolchain.
#[derive(Parser)]
#[command(name = "steplang", about = "steplang script tracer and tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Run a script and print its execution trace.
    Run {
        /// Path to the script file.
        file: PathBuf,

        /// Isolation strategy for the run.
        #[arg(long, value_enum, default_value = "thread")]
        strategy: StrategyArg,

        /// Print the raw run outcome as JSON instead of the readable trace.
        #[arg(long)]
        json: bool,
    },

    /// Print the instrumented source for a script.
    Instrument {
        /// Path to the script file.
        file: PathBuf,
    },

    /// Run the stdio worker loop (spawned by process isolation).
    Worker,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    Thread,
    Process,
}

impl From<StrategyArg> for IsolationStrategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Thread => IsolationStrategy::Thread,
            StrategyArg::Process => IsolationStrategy::Process,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    let exit_code = match cli.command {
        Commands::Run {
            file,
            strategy,
            json,
        } => run_command(&file, strategy.into(), json),
        Commands::Instrument { file } => instrument_command(&file),
        Commands::Worker => worker::worker_main(),
    };
    process::exit(exit_code);
}

/// Execute the run subcommand.
///
/// Returns exit code: 0 = success, 1 = runtime failure,
/// 2 = syntax failure, 3 = I/O error.
fn run_command(file: &PathBuf, strategy: IsolationStrategy, json: bool) -> i32 {
    let code = match std::fs::read_to_string(file) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: failed to read '{}': {}", file.display(), err);
            return 3;
        }
    };

    let outcome = match run_script_blocking(
        &code,
        strategy,
        ExecConfig::default(),
        &WorkerSpec::default(),
    ) {
        Ok(outcome) => outcome,
        Err(err) => {
            eprintln!("Error: failed to start run: {}", err);
            return 3;
        }
    };

    if json {
        match serde_json::to_string_pretty(&outcome) {
            Ok(text) => println!("{}", text),
            Err(err) => {
                eprintln!("Error: failed to encode outcome: {}", err);
                return 3;
            }
        }
    } else {
        print_trace(&outcome);
    }

    match &outcome.error {
        None => 0,
        Some(err) if err.kind == "SyntaxError" => 2,
        Some(_) => 1,
    }
}

/// Execute the instrument subcommand.
fn instrument_command(file: &PathBuf) -> i32 {
    let code = match std::fs::read_to_string(file) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: failed to read '{}': {}", file.display(), err);
            return 3;
        }
    };
    match instrument(&code) {
        Ok(instrumented) => {
            print!("{}", instrumented.source);
            0
        }
        Err(err) => {
            eprintln!("SyntaxError: {}", err);
            2
        }
    }
}

/// Prints a human-readable trace, one line per step.
fn print_trace(outcome: &RunOutcome) {
    for step in &outcome.steps {
        println!("{}", format_step(step));
        for line in &step.logs {
            let rendered: Vec<String> = line.iter().map(|item| decode(item).to_string()).collect();
            println!("        log: {}", rendered.join(" "));
        }
    }
    if let Some(error) = &outcome.error {
        eprintln!("{}: {}", error.kind, error.message);
    }
}

fn format_step(step: &StepRecord) -> String {
    let mut line = format!("#{:04}", step.num);
    match step.category {
        StepCategory::Init => line.push_str(" init"),
        StepCategory::Wait => {
            line.push_str(&format!(" wait {}ms", step.wait.unwrap_or(0)));
        }
        StepCategory::Statement | StepCategory::Expression => {
            line.push_str(match step.time {
                Some(StepTime::Before) => " before",
                Some(StepTime::After) => " after ",
                None => "       ",
            });
            if let Some(node_type) = &step.node_type {
                line.push_str(&format!(" {}", node_type));
            }
            if let Some(loc) = &step.loc {
                line.push_str(&format!(" @{}", loc));
            }
            if let Some(value) = &step.value {
                line.push_str(&format!(" = {}", decode(value)));
            }
        }
    }
    line
}
