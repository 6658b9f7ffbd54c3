use std::path::{Path, PathBuf};

use thiserror::Error;

use sorgen_generate::GenerateOptions;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Load generation options from a TOML file, or defaults when no file is given.
pub fn load_options(path: Option<&Path>) -> Result<GenerateOptions, ConfigError> {
    let Some(path) = path else {
        return Ok(GenerateOptions::default());
    };
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_options(&content)
}

pub fn parse_options(content: &str) -> Result<GenerateOptions, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub out_dir: Option<PathBuf>,
    pub seed: Option<u64>,
    pub default_rows: Option<u64>,
    /// `Some(false)` forces round robin even when the file enables skew.
    pub auto_cardinality: Option<bool>,
}

impl Overrides {
    pub fn apply(self, options: &mut GenerateOptions) {
        if let Some(out_dir) = self.out_dir {
            options.out_dir = out_dir;
        }
        if let Some(seed) = self.seed {
            options.seed = seed;
        }
        if let Some(rows) = self.default_rows {
            options.default_rows = rows;
        }
        if let Some(auto_cardinality) = self.auto_cardinality {
            options.auto_cardinality = auto_cardinality;
        }
    }
}
