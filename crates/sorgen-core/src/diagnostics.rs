use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::graph::Graph;
use crate::relationship::Cardinality;

/// Configured row counts keyed by entity id.
pub type RowCounts = BTreeMap<String, u64>;

/// Best-effort heuristic warning about configured row counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardinalityWarning {
    pub code: String,
    pub relationship: String,
    pub message: String,
}

/// Result of a cardinality scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardinalityReport {
    pub relationships_checked: usize,
    pub warnings: Vec<CardinalityWarning>,
}

impl CardinalityReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }

    fn warn(&mut self, code: &str, relationship: &str, message: String) {
        self.warnings.push(CardinalityWarning {
            code: code.to_string(),
            relationship: relationship.to_string(),
            message,
        });
    }
}

/// Scan relationships against configured row counts. Never fails.
pub fn check_cardinality(graph: &Graph, rows: &RowCounts) -> CardinalityReport {
    let mut report = CardinalityReport::default();

    for relationship in graph.relationships() {
        report.relationships_checked += 1;
        let side = relationship.foreign_key_side();

        let (Some(fk_rows), Some(ref_rows)) = (
            rows.get(side.entity_id).copied(),
            rows.get(side.referenced_entity_id).copied(),
        ) else {
            report.warn(
                "missing_row_count",
                relationship.id(),
                format!(
                    "no row count configured for '{}' or '{}'",
                    side.entity_id, side.referenced_entity_id
                ),
            );
            continue;
        };

        if fk_rows > 0 && ref_rows == 0 {
            report.warn(
                "empty_referenced_entity",
                relationship.id(),
                format!(
                    "'{}' has {fk_rows} rows referencing '{}', which has none",
                    side.entity_id, side.referenced_entity_id
                ),
            );
            continue;
        }

        if relationship.cardinality() == Cardinality::OneToOne && fk_rows != ref_rows {
            report.warn(
                "one_to_one_mismatch",
                relationship.id(),
                format!(
                    "1:1 relationship pairs {fk_rows} rows of '{}' with {ref_rows} rows of '{}'",
                    side.entity_id, side.referenced_entity_id
                ),
            );
        } else if ref_rows > fk_rows {
            report.warn(
                "unused_referenced_rows",
                relationship.id(),
                format!(
                    "at least {} of {ref_rows} '{}' rows will never be referenced by '{}'",
                    ref_rows - fk_rows,
                    side.referenced_entity_id,
                    side.entity_id
                ),
            );
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaDefinition;

    const SCHEMA: &str = r#"{
        "entities": [
            {"id": "user", "external_id": "users", "display_name": "User", "attributes": [
                {"name": "id", "external_id": "id", "unique": true},
                {"name": "deptId", "external_id": "dept_id"}
            ]},
            {"id": "dept", "external_id": "depts", "display_name": "Department", "attributes": [
                {"name": "id", "external_id": "id", "unique": true}
            ]},
            {"id": "badge", "external_id": "badges", "display_name": "Badge", "attributes": [
                {"name": "id", "external_id": "id", "unique": true}
            ]}
        ],
        "relationships": [
            {"id": "user_dept", "name": "user_dept", "from_attribute": "users.dept_id", "to_attribute": "depts.id"},
            {"id": "user_badge", "name": "user_badge", "from_attribute": "users.id", "to_attribute": "badges.id"}
        ]
    }"#;

    fn graph() -> Graph {
        Graph::new(&SchemaDefinition::from_json_str(SCHEMA).expect("parse schema")).expect("build graph")
    }

    fn counts(pairs: &[(&str, u64)]) -> RowCounts {
        pairs.iter().map(|(id, n)| (id.to_string(), *n)).collect()
    }

    #[test]
    fn balanced_counts_are_clean() {
        let report = check_cardinality(&graph(), &counts(&[("user", 10), ("dept", 3), ("badge", 10)]));
        assert_eq!(report.relationships_checked, 2);
        assert!(report.is_clean(), "{:?}", report.warnings);
    }

    #[test]
    fn flags_imbalances() {
        let report = check_cardinality(&graph(), &counts(&[("user", 2), ("dept", 0), ("badge", 5)]));
        let codes: Vec<_> = report.warnings.iter().map(|w| w.code.as_str()).collect();
        assert_eq!(codes, vec!["empty_referenced_entity", "one_to_one_mismatch"]);

        let report = check_cardinality(&graph(), &counts(&[("user", 2), ("dept", 5)]));
        let codes: Vec<_> = report.warnings.iter().map(|w| w.code.as_str()).collect();
        assert_eq!(codes, vec!["unused_referenced_rows", "missing_row_count"]);
    }
}
