mod config;
mod error;
mod registry;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use sorgen_core::{Graph, SchemaDefinition, check_cardinality};
use sorgen_generate::GenerationEngine;
use uuid::Uuid;

use config::{Overrides, load_options};
use error::CliResult;
use registry::{RunContext, init_run_logging, init_stderr_logging, start_run};

#[derive(Parser, Debug)]
#[command(name = "sorgen", version, about = "Synthetic relational dataset generator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate CSV files for every entity of a schema.
    Generate(GenerateArgs),
    /// Print entity ids in generation order.
    Order(SchemaArgs),
    /// Check configured row counts against relationship cardinalities.
    Check(CheckArgs),
}

#[derive(Args, Debug)]
struct SchemaArgs {
    /// Path to the schema definition JSON.
    #[arg(long)]
    schema: PathBuf,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Path to the schema definition JSON.
    #[arg(long)]
    schema: PathBuf,
    /// Optional TOML config with generation options.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Output directory for runs.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Seed for deterministic output.
    #[arg(long)]
    seed: Option<u64>,
    /// Row count for entities without an override.
    #[arg(long)]
    rows: Option<u64>,
    /// Skew foreign keys toward popular targets.
    #[arg(long, overrides_with = "no_auto_cardinality")]
    auto_cardinality: bool,
    /// Use round robin even when the config enables auto-cardinality.
    #[arg(long, overrides_with = "auto_cardinality")]
    no_auto_cardinality: bool,
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Path to the schema definition JSON.
    #[arg(long)]
    schema: PathBuf,
    /// Optional TOML config with row counts.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Row count for entities without an override.
    #[arg(long)]
    rows: Option<u64>,
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Generate(args) => run_generate(args),
        Command::Order(args) => run_order(args),
        Command::Check(args) => run_check(args),
    }
}

fn run_generate(args: GenerateArgs) -> CliResult<()> {
    let GenerateArgs {
        schema: schema_path,
        config,
        out,
        seed,
        rows,
        auto_cardinality,
        no_auto_cardinality,
    } = args;

    let mut options = load_options(config.as_deref())?;
    Overrides {
        out_dir: out,
        seed,
        default_rows: rows,
        auto_cardinality: flag_pair(auto_cardinality, no_auto_cardinality),
    }
    .apply(&mut options);

    let schema = SchemaDefinition::from_json_file(&schema_path)?;

    let run_id = Uuid::new_v4().to_string();
    let run_ctx = RunContext {
        run_id: run_id.clone(),
        started_at: chrono::Utc::now(),
        schema_path,
        config_path: config,
        options: options.clone(),
    };

    let run_paths = start_run(&run_ctx)?;
    init_run_logging(&run_paths.logs_path)?;

    tracing::info!(
        event = "run_started",
        run_id = %run_id,
        seed = options.seed,
        config = %run_paths.config_path.display()
    );
    let timer = Instant::now();

    let result = GenerationEngine::new(options).run_in(&schema, run_paths.run_root.clone(), run_id)?;

    tracing::info!(
        event = "run_finished",
        status = "success",
        rows = result.report.rows_generated(),
        duration_ms = timer.elapsed().as_millis() as u64
    );
    println!("{}", result.run_dir.display());

    Ok(())
}

fn run_order(args: SchemaArgs) -> CliResult<()> {
    init_stderr_logging()?;

    let schema = SchemaDefinition::from_json_file(&args.schema)?;
    let graph = Graph::new(&schema)?;
    for entity in graph.topological_order()? {
        println!("{entity}");
    }
    Ok(())
}

fn run_check(args: CheckArgs) -> CliResult<()> {
    init_stderr_logging()?;

    let mut options = load_options(args.config.as_deref())?;
    Overrides {
        default_rows: args.rows,
        ..Overrides::default()
    }
    .apply(&mut options);

    let schema = SchemaDefinition::from_json_file(&args.schema)?;
    let graph = Graph::new(&schema)?;
    let report = check_cardinality(&graph, &options.row_counts(&graph));

    for warning in &report.warnings {
        tracing::warn!(code = %warning.code, relationship = %warning.relationship, "{}", warning.message);
    }
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

/// `Some(true)` / `Some(false)` when either switch was passed, `None` otherwise.
fn flag_pair(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}
