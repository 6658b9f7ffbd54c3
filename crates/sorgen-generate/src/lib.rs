//! Deterministic dataset generation over a `sorgen-core` entity graph.
//!
//! Entities are filled in dependency order, foreign keys are wired through
//! the graph's relationships, and every run writes one CSV per entity plus a
//! `generation_report.json`.

pub mod engine;
pub mod errors;
pub mod generators;
pub mod model;
pub mod output;

pub use engine::{GeneratedDataset, GenerationEngine, GenerationResult};
pub use errors::GenerationError;
pub use model::{EntityReport, GenerateOptions, GenerationReport};
