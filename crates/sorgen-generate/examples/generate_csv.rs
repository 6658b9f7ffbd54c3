use std::env;
use std::path::PathBuf;

use sorgen_core::SchemaDefinition;
use sorgen_generate::{GenerateOptions, GenerationEngine};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut args = env::args().skip(1);
    let mut schema_path: Option<PathBuf> = None;
    let mut out_dir: Option<PathBuf> = None;
    let mut auto_cardinality = false;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--schema" => schema_path = args.next().map(PathBuf::from),
            "--out" => out_dir = args.next().map(PathBuf::from),
            "--auto-cardinality" => auto_cardinality = true,
            _ => {
                if schema_path.is_none() {
                    schema_path = Some(PathBuf::from(arg));
                } else {
                    return Err("unexpected argument".into());
                }
            }
        }
    }

    let schema_path = schema_path.ok_or("missing --schema path")?;
    let schema = SchemaDefinition::from_json_file(&schema_path)?;

    let mut options = GenerateOptions::default();
    if let Some(out_dir) = out_dir {
        options.out_dir = out_dir;
    }
    options.auto_cardinality = auto_cardinality;

    let result = GenerationEngine::new(options).run(&schema)?;
    println!("run_dir: {}", result.run_dir.display());
    println!("rows: {}", result.report.rows_generated());
    Ok(())
}
