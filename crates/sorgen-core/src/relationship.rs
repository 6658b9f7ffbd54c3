use std::fmt;

use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::graph::Graph;

/// Structural classification derived from which endpoints are unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cardinality {
    #[serde(rename = "1:1")]
    OneToOne,
    #[serde(rename = "1:N")]
    OneToMany,
    #[serde(rename = "N:1")]
    ManyToOne,
}

impl Cardinality {
    /// Derive cardinality from endpoint uniqueness. Two non-unique endpoints
    /// have no valid cardinality.
    pub fn from_uniqueness(source_unique: bool, target_unique: bool) -> Option<Self> {
        match (source_unique, target_unique) {
            (true, true) => Some(Self::OneToOne),
            (true, false) => Some(Self::OneToMany),
            (false, true) => Some(Self::ManyToOne),
            (false, false) => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneToOne => "1:1",
            Self::OneToMany => "1:N",
            Self::ManyToOne => "N:1",
        }
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How foreign-key values are distributed over referenced rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectionStrategy {
    /// `row_index mod target_count`.
    RoundRobin,
    /// Skewed toward low target indices by `x^alpha`.
    PowerLaw { alpha: f64 },
}

/// Pick a target row index for a source row.
///
/// Round robin is periodic in `target_count`. Power law normalizes
/// `row_index` over `[0, source_count - 1]`, raises it to `alpha` and maps
/// the result back onto `[0, target_count - 1]`. Callers must ensure
/// `target_count > 0`.
pub fn select_target_index(
    row_index: usize,
    source_count: usize,
    target_count: usize,
    strategy: SelectionStrategy,
) -> usize {
    match strategy {
        SelectionStrategy::RoundRobin => row_index % target_count.max(1),
        SelectionStrategy::PowerLaw { alpha } => {
            if target_count <= 1 || source_count <= 1 {
                return 0;
            }
            let x = (row_index as f64 / (source_count - 1) as f64).clamp(0.0, 1.0);
            let scaled = (x.powf(alpha) * (target_count - 1) as f64).floor() as usize;
            scaled.min(target_count - 1)
        }
    }
}

/// Endpoint that carries the foreign key and the endpoint it references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeySide<'a> {
    pub entity_id: &'a str,
    pub attribute: &'a str,
    pub referenced_entity_id: &'a str,
    pub referenced_attribute: &'a str,
    /// True when the foreign key lives on the source endpoint.
    pub on_source: bool,
}

/// Link between one attribute of a source entity and one of a target entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    id: String,
    name: String,
    source_entity: String,
    target_entity: String,
    source_attribute: String,
    target_attribute: String,
    cardinality: Cardinality,
}

impl Relationship {
    /// Validate endpoints and derive cardinality.
    ///
    /// Attribute arguments are attribute names on their entities. At least
    /// one resolved attribute must be unique.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        source: &Entity,
        target: &Entity,
        source_attribute: &str,
        target_attribute: &str,
    ) -> Result<Self> {
        let id = id.into();
        let name = name.into();

        if id.is_empty() {
            return Err(Error::schema("relationship id must not be empty"));
        }
        if name.is_empty() {
            return Err(Error::schema(format!(
                "relationship '{id}': name must not be empty"
            )));
        }

        let source_attr = source.get_attribute(source_attribute).ok_or_else(|| {
            Error::schema(format!(
                "relationship '{id}': attribute '{source_attribute}' not found on source entity '{}'",
                source.id()
            ))
        })?;
        let target_attr = target.get_attribute(target_attribute).ok_or_else(|| {
            Error::schema(format!(
                "relationship '{id}': attribute '{target_attribute}' not found on target entity '{}'",
                target.id()
            ))
        })?;

        let cardinality =
            Cardinality::from_uniqueness(source_attr.is_unique(), target_attr.is_unique())
                .ok_or_else(|| {
                    Error::schema(format!(
                        "relationship '{id}': neither '{}.{}' nor '{}.{}' is unique",
                        source.id(),
                        source_attribute,
                        target.id(),
                        target_attribute
                    ))
                })?;

        Ok(Self {
            id,
            name,
            source_entity: source.id().to_string(),
            target_entity: target.id().to_string(),
            source_attribute: source_attribute.to_string(),
            target_attribute: target_attribute.to_string(),
            cardinality,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source_entity(&self) -> &str {
        &self.source_entity
    }

    pub fn target_entity(&self) -> &str {
        &self.target_entity
    }

    pub fn source_attribute(&self) -> &str {
        &self.source_attribute
    }

    pub fn target_attribute(&self) -> &str {
        &self.target_attribute
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    /// True when both endpoints are on the same entity.
    pub fn is_self_referencing(&self) -> bool {
        self.source_entity == self.target_entity
    }

    /// Which endpoint carries the foreign key: the non-unique side, or the
    /// source for 1:1.
    pub fn foreign_key_side(&self) -> ForeignKeySide<'_> {
        match self.cardinality {
            Cardinality::OneToMany => ForeignKeySide {
                entity_id: &self.target_entity,
                attribute: &self.target_attribute,
                referenced_entity_id: &self.source_entity,
                referenced_attribute: &self.source_attribute,
                on_source: false,
            },
            Cardinality::ManyToOne | Cardinality::OneToOne => ForeignKeySide {
                entity_id: &self.source_entity,
                attribute: &self.source_attribute,
                referenced_entity_id: &self.target_entity,
                referenced_attribute: &self.target_attribute,
                on_source: true,
            },
        }
    }

    /// Per-relationship skew exponent so co-located relationships do not
    /// cluster identically.
    pub fn alpha(&self) -> f64 {
        1.3 + (self.id.len() % 10) as f64 * 0.05
    }

    pub fn selection_strategy(&self, auto_cardinality: bool) -> SelectionStrategy {
        if !auto_cardinality || self.cardinality == Cardinality::OneToOne {
            SelectionStrategy::RoundRobin
        } else {
            SelectionStrategy::PowerLaw {
                alpha: self.alpha(),
            }
        }
    }

    /// Value of the target attribute to store in a source row's foreign key.
    pub fn target_value_for_source_row(
        &self,
        graph: &Graph,
        source_row_index: usize,
        auto_cardinality: bool,
    ) -> Result<String> {
        self.pick_value(
            graph,
            &self.source_entity,
            &self.target_entity,
            &self.target_attribute,
            source_row_index,
            auto_cardinality,
        )
    }

    /// Value of the referenced attribute for a row of the foreign-key side,
    /// whichever endpoint that is.
    pub fn referenced_value_for_row(
        &self,
        graph: &Graph,
        row_index: usize,
        auto_cardinality: bool,
    ) -> Result<String> {
        let side = self.foreign_key_side();
        self.pick_value(
            graph,
            side.entity_id,
            side.referenced_entity_id,
            side.referenced_attribute,
            row_index,
            auto_cardinality,
        )
    }

    fn pick_value(
        &self,
        graph: &Graph,
        from_entity: &str,
        to_entity: &str,
        to_attribute: &str,
        row_index: usize,
        auto_cardinality: bool,
    ) -> Result<String> {
        let from = self.populated_entity(graph, from_entity)?;
        let to = self.populated_entity(graph, to_entity)?;

        let index = select_target_index(
            row_index,
            from.row_count(),
            to.row_count(),
            self.selection_strategy(auto_cardinality),
        );

        to.rows()[index]
            .get_non_empty(to_attribute)
            .map(str::to_string)
            .ok_or_else(|| {
                Error::Lookup(format!(
                    "relationship '{}': row {index} of entity '{}' has no value for '{to_attribute}'",
                    self.id,
                    to.id()
                ))
            })
    }

    fn populated_entity<'g>(&self, graph: &'g Graph, entity_id: &str) -> Result<&'g Entity> {
        let entity = graph.entity(entity_id).ok_or_else(|| {
            Error::Lookup(format!(
                "relationship '{}' ({}): entity '{entity_id}' not found",
                self.id, self.name
            ))
        })?;
        if entity.row_count() == 0 {
            return Err(Error::Lookup(format!(
                "relationship '{}' ({}): entity '{entity_id}' has no rows",
                self.id, self.name
            )));
        }
        Ok(entity)
    }
}
