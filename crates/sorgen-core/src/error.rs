use thiserror::Error;

/// Broad classification of core errors, used by drivers to decide whether a
/// failure aborts the whole run or only the mutation that triggered it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Fatal to graph construction.
    SchemaValidation,
    /// Fatal only to the single row mutation.
    RowValidation,
    /// Fatal to generation ordering.
    GraphStructure,
    /// Target-selection preconditions unmet.
    Lookup,
}

/// Core error type for the entity-relationship graph engine.
#[derive(Debug, Error)]
pub enum Error {
    /// The schema definition violates a structural invariant.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    /// A row was inserted without a value for the primary key.
    #[error("entity '{entity}': row is missing a value for primary key '{attribute}'")]
    MissingPrimaryKey { entity: String, attribute: String },
    /// A row reused a primary key value already present in the entity.
    #[error("entity '{entity}': duplicate value '{value}' for primary key '{attribute}'")]
    DuplicatePrimaryKey {
        entity: String,
        attribute: String,
        value: String,
    },
    /// A foreign-key value has no matching row in the related entity.
    #[error(
        "entity '{entity}': value '{value}' for attribute '{attribute}' does not exist in related entity '{related_entity}' attribute '{related_attribute}'"
    )]
    ForeignKeyViolation {
        entity: String,
        attribute: String,
        value: String,
        related_entity: String,
        related_attribute: String,
    },
    /// Relationships form a cycle, so no generation order exists.
    #[error("circular dependency detected between entities: {}", entities.join(", "))]
    CircularDependency { entities: Vec<String> },
    /// A lookup needed by target selection or FK resolution failed.
    #[error("lookup failed: {0}")]
    Lookup(String),
    /// A row visitor failed; wraps the underlying error with its position.
    #[error("entity '{entity}': row {position}: {source}")]
    RowVisit {
        entity: String,
        position: usize,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidSchema(_) => ErrorKind::SchemaValidation,
            Error::MissingPrimaryKey { .. }
            | Error::DuplicatePrimaryKey { .. }
            | Error::ForeignKeyViolation { .. } => ErrorKind::RowValidation,
            Error::CircularDependency { .. } => ErrorKind::GraphStructure,
            Error::Lookup(_) => ErrorKind::Lookup,
            Error::RowVisit { source, .. } => source.kind(),
        }
    }

    pub(crate) fn schema(message: impl Into<String>) -> Self {
        Error::InvalidSchema(message.into())
    }
}

/// Convenience alias for results returned by the core crate.
pub type Result<T> = std::result::Result<T, Error>;
