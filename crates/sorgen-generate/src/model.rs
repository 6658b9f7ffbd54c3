use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use sorgen_core::{CardinalityReport, Graph, RowCounts};

/// Options for the generation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateOptions {
    /// Directory where run artifacts are written.
    pub out_dir: PathBuf,
    /// Seed for deterministic generation.
    pub seed: u64,
    /// Row count for entities without an override.
    pub default_rows: u64,
    /// Per-entity row counts keyed by entity id.
    pub rows: BTreeMap<String, u64>,
    /// Skew foreign keys toward popular targets instead of round robin.
    pub auto_cardinality: bool,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            out_dir: PathBuf::from("out"),
            seed: 42,
            default_rows: 10,
            rows: BTreeMap::new(),
            auto_cardinality: false,
        }
    }
}

impl GenerateOptions {
    pub fn rows_for(&self, entity_id: &str) -> u64 {
        self.rows
            .get(entity_id)
            .copied()
            .unwrap_or(self.default_rows)
    }

    /// Resolved row count for every entity in the graph.
    pub fn row_counts(&self, graph: &Graph) -> RowCounts {
        graph
            .entities()
            .iter()
            .map(|entity| (entity.id().to_string(), self.rows_for(entity.id())))
            .collect()
    }
}

/// Summary of a generated entity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityReport {
    pub entity: String,
    pub external_id: String,
    pub rows_requested: u64,
    pub rows_generated: u64,
    pub foreign_keys_populated: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csv_path: Option<String>,
}

/// Report for a generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationReport {
    pub run_id: String,
    pub seed: u64,
    pub auto_cardinality: bool,
    pub order: Vec<String>,
    pub entities: Vec<EntityReport>,
    pub skipped_relationships: Vec<String>,
    pub cardinality: CardinalityReport,
    pub warnings: Vec<String>,
    pub bytes_written: u64,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl GenerationReport {
    pub fn new(run_id: String, options: &GenerateOptions) -> Self {
        Self {
            run_id,
            seed: options.seed,
            auto_cardinality: options.auto_cardinality,
            order: Vec::new(),
            entities: Vec::new(),
            skipped_relationships: Vec::new(),
            cardinality: CardinalityReport::default(),
            warnings: Vec::new(),
            bytes_written: 0,
            duration_ms: 0,
            failure: None,
        }
    }

    pub fn record_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn rows_generated(&self) -> u64 {
        self.entities.iter().map(|entity| entity.rows_generated).sum()
    }
}
