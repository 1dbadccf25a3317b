use std::sync::Arc;

use clap::{Parser, Subcommand};

use taskweave::config::Config;
use taskweave::core::{format_transcript, Ledger, TaskNode, DONE, RUNNING};
use taskweave::oracle::ClaudeOracle;
use taskweave::orchestration::{Engine, Resolution};
use taskweave::{twlog, twlog_error, Error, Result};

const DEFAULT_GOAL: &str = "Solve the problem correctly.";
const DEFAULT_ROOT_NAME: &str = "CREATE MAIN PLAN ALGORITHM GRAPH";

/// Taskweave - recursive task decomposition driven by a reasoning oracle
#[derive(Parser, Debug)]
#[command(name = "taskweave")]
#[command(version, about, long_about = None)]
#[command(after_help = "ENVIRONMENT:\n    TASKWEAVE_DEBUG=1     Enable debug logging (alternative to --debug)")]
pub struct Cli {
    /// Enable debug logging (writes to ~/.taskweave/taskweave.log)
    #[arg(short = 'd', long)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Solve a problem by resolving a root planning task
    Run {
        /// The problem statement, seeded into the ledger
        problem: String,

        /// Goal of the root task
        #[arg(long, default_value = DEFAULT_GOAL)]
        goal: String,

        /// Name of the root task
        #[arg(long, default_value = DEFAULT_ROOT_NAME)]
        name: String,

        /// Model passed to the oracle CLI (overrides the config file)
        #[arg(long)]
        model: Option<String>,

        /// Print a JSON report instead of text
        #[arg(long)]
        headless: bool,
    },

    /// Show the effective configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    taskweave::log::init(cli.debug);

    match cli.command {
        Command::Run {
            problem,
            goal,
            name,
            model,
            headless,
        } => run_problem(problem, goal, name, model, headless),
        Command::Config => show_config(),
    }
}

/// Resolve the root task for `problem` and report the outcome.
fn run_problem(
    problem: String,
    goal: String,
    name: String,
    model: Option<String>,
    headless: bool,
) -> Result<()> {
    twlog!(
        "Run command: problem={:?}, goal={:?}, name={:?}, model={:?}, headless={}",
        problem,
        goal,
        name,
        model,
        headless
    );

    let config = Config::load()?;
    let engine = build_engine(&config, model.as_deref())?;

    let ledger = Ledger::seeded(problem, RUNNING);
    let root = TaskNode::new(&name, &goal, ledger.clone());

    let rt = tokio::runtime::Runtime::new()?;
    match rt.block_on(root.resolve(&engine)) {
        Ok(resolution) if headless => print_headless(&resolution),
        Ok(resolution) => {
            print_text(&resolution);
            Ok(())
        }
        Err(e) => {
            twlog_error!("Run failed: {}", e);
            if headless {
                let json_output = serde_json::json!({
                    "status": "failed",
                    "error": e.to_string(),
                    "task": e.task(),
                    "payload": e.payload(),
                    "ledger": ledger.snapshot(),
                });
                println!("{}", serde_json::to_string_pretty(&json_output)?);
            } else {
                report_failure(&e, &ledger);
            }
            Err(e)
        }
    }
}

/// The engine owns the oracle timeout; the CLI process itself is unbounded.
fn build_engine(config: &Config, model: Option<&str>) -> Result<Engine> {
    let mut oracle = ClaudeOracle::from_command(config.effective_command())?;
    if let Some(model) = model.or(config.model.as_deref()) {
        oracle = oracle.with_model(model);
    }
    Ok(Engine::new(Arc::new(oracle)).with_config(config.engine_config()))
}

fn print_headless(resolution: &Resolution) -> Result<()> {
    let json_output = serde_json::json!({
        "run_id": resolution.run_id.to_string(),
        "status": "completed",
        "answer": resolution.answer(),
        "ledger": resolution.ledger,
        "stats": resolution.stats,
    });
    println!("{}", serde_json::to_string_pretty(&json_output)?);
    Ok(())
}

fn print_text(resolution: &Resolution) {
    println!("Run {} completed", resolution.run_id.short());
    println!();
    println!("STATE HISTORY");
    println!("{}", format_transcript(&resolution.ledger));
    println!();

    // A decomposed root resolves to DONE; its last recorded answer is the result.
    let answer = resolution
        .ledger
        .iter()
        .rev()
        .find(|entry| entry.value != RUNNING && entry.value != DONE)
        .map(|entry| entry.display_value());
    match answer {
        Some(answer) => println!("Answer: {}", answer),
        None => println!("Answer: (none)"),
    }

    let stats = &resolution.stats;
    println!(
        "Oracle calls: {}  Graphs: {}  Visits: {}  Cache hits: {}",
        stats.oracle_calls, stats.graphs_built, stats.visits, stats.cache_hits
    );
}

fn report_failure(error: &Error, ledger: &Ledger) {
    eprintln!("Run failed: {}", error);
    if let Some(task) = error.task() {
        eprintln!("  Task:    {}", task);
    }
    if let Some(payload) = error.payload() {
        eprintln!("  Payload: {}", payload);
    }
    if !ledger.is_empty() {
        eprintln!();
        eprintln!("STATE HISTORY");
        eprintln!("{}", ledger.transcript());
    }
}

fn show_config() -> Result<()> {
    let config = Config::load()?;
    let engine = config.engine_config();
    println!("Config file:     {}", Config::config_path()?.display());
    println!("Command:         {}", config.effective_command());
    println!("Model:           {}", config.model.as_deref().unwrap_or("(default)"));
    println!(
        "Oracle timeout:  {}",
        engine
            .oracle_timeout
            .map(|d| format!("{}s", d.as_secs()))
            .unwrap_or_else(|| "none".to_string())
    );
    println!("Max depth:       {}", format_limit(engine.max_depth));
    println!("Max visits:      {}", format_limit(engine.max_visits));
    Ok(())
}

fn format_limit(limit: Option<usize>) -> String {
    limit
        .map(|n| n.to_string())
        .unwrap_or_else(|| "unbounded".to_string())
}
