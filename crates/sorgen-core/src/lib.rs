//! Entity-relationship graph engine for sorgen.
//!
//! This crate models entities, attributes and relationships from a declarative
//! schema, orders entities for dependency-first generation, enforces primary
//! key uniqueness and validates foreign keys after generation.

pub mod attribute;
pub mod diagnostics;
pub mod entity;
pub mod error;
pub mod graph;
pub mod relationship;
pub mod row;
pub mod schema;

pub use attribute::{Attribute, RelatedAttribute};
pub use diagnostics::{CardinalityReport, CardinalityWarning, RowCounts, check_cardinality};
pub use entity::{CsvData, Entity};
pub use error::{Error, ErrorKind, Result};
pub use graph::Graph;
pub use relationship::{
    Cardinality, ForeignKeySide, Relationship, SelectionStrategy, select_target_index,
};
pub use row::Row;
pub use schema::{AttributeDefinition, EntityDefinition, RelationshipDefinition, SchemaDefinition};
