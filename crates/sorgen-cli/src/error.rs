use sorgen_core::Error as CoreError;
use sorgen_generate::GenerationError;
use thiserror::Error;

use crate::config::ConfigError;

/// Every failure the `sorgen` binary can report.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("core error: {0}")]
    Core(#[from] CoreError),
    #[error("generation error: {0}")]
    Generation(#[from] GenerationError),
    #[error("run artifact io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("logging setup failed: {0}")]
    Logging(String),
}

pub type CliResult<T> = std::result::Result<T, CliError>;
