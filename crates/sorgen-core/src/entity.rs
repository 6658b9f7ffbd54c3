use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::attribute::Attribute;
use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::row::Row;
use crate::schema::EntityDefinition;

/// CSV-ready projection of an entity. Quoting is left to the writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvData {
    pub external_id: String,
    pub display_name: String,
    pub description: Option<String>,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Entity with its attributes and generated rows.
///
/// Row insertion checks primary-key presence and uniqueness. Foreign keys are
/// validated in a deferred pass through [`Entity::validate_all_foreign_keys`],
/// so rows may reference entities that are populated later in the run.
#[derive(Debug, Clone)]
pub struct Entity {
    id: String,
    external_id: String,
    name: String,
    description: Option<String>,
    attributes: Vec<Attribute>,
    by_name: HashMap<String, usize>,
    by_external_id: HashMap<String, usize>,
    by_alias: HashMap<String, usize>,
    primary_key: usize,
    rows: Vec<Row>,
    used_keys: HashSet<String>,
}

impl Entity {
    /// Build an entity, validating its attribute set.
    ///
    /// Fails if any id is empty, attribute names or lookup keys repeat, or the
    /// entity does not have exactly one unique attribute.
    pub fn new(
        id: impl Into<String>,
        external_id: impl Into<String>,
        name: impl Into<String>,
        description: Option<String>,
        attributes: Vec<Attribute>,
    ) -> Result<Self> {
        let id = id.into();
        let external_id = external_id.into();
        let name = name.into();

        if id.is_empty() {
            return Err(Error::schema("entity id must not be empty"));
        }
        if external_id.is_empty() {
            return Err(Error::schema(format!(
                "entity '{id}': external id must not be empty"
            )));
        }
        if name.is_empty() {
            return Err(Error::schema(format!("entity '{id}': name must not be empty")));
        }

        let mut by_name = HashMap::new();
        let mut by_external_id = HashMap::new();
        let mut by_alias = HashMap::new();
        let mut primary_key = None;

        for (idx, attribute) in attributes.iter().enumerate() {
            if attribute.name().is_empty() {
                return Err(Error::schema(format!(
                    "entity '{id}': attribute at position {idx} has an empty name"
                )));
            }
            if by_name.insert(attribute.name().to_string(), idx).is_some() {
                return Err(Error::schema(format!(
                    "entity '{id}': duplicate attribute name '{}'",
                    attribute.name()
                )));
            }
            if !attribute.external_id().is_empty()
                && by_external_id
                    .insert(attribute.external_id().to_string(), idx)
                    .is_some()
            {
                return Err(Error::schema(format!(
                    "entity '{id}': duplicate attribute external id '{}'",
                    attribute.external_id()
                )));
            }
            if let Some(alias) = attribute.alias() {
                if by_alias.insert(alias.to_string(), idx).is_some() {
                    return Err(Error::schema(format!(
                        "entity '{id}': duplicate attribute alias '{alias}'"
                    )));
                }
            }
            if attribute.is_unique() {
                if let Some(existing) = primary_key {
                    let existing: &Attribute = &attributes[existing];
                    return Err(Error::schema(format!(
                        "entity '{id}': multiple unique attributes ('{}' and '{}')",
                        existing.name(),
                        attribute.name()
                    )));
                }
                primary_key = Some(idx);
            }
        }

        for (alias, idx) in &by_alias {
            if let Some(other) = by_external_id.get(alias) {
                if other != idx {
                    return Err(Error::schema(format!(
                        "entity '{id}': alias '{alias}' collides with the external id of attribute '{}'",
                        attributes[*other].name()
                    )));
                }
            }
        }

        let primary_key = primary_key.ok_or_else(|| {
            Error::schema(format!("entity '{id}': no unique attribute declared"))
        })?;

        let mut attributes = attributes;
        for attribute in &mut attributes {
            attribute.set_parent_entity(id.clone());
        }

        Ok(Self {
            id,
            external_id,
            name,
            description,
            attributes,
            by_name,
            by_external_id,
            by_alias,
            primary_key,
            rows: Vec::new(),
            used_keys: HashSet::new(),
        })
    }

    pub fn from_definition(def: &EntityDefinition) -> Result<Self> {
        let attributes = def.attributes.iter().map(Attribute::from_definition).collect();
        Self::new(
            def.id.clone(),
            def.external_id.clone(),
            def.display_name.clone(),
            def.description.clone(),
            attributes,
        )
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn external_id(&self) -> &str {
        &self.external_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Attributes in declared order.
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn primary_key(&self) -> &Attribute {
        &self.attributes[self.primary_key]
    }

    pub fn get_attribute(&self, name: &str) -> Option<&Attribute> {
        self.by_name.get(name).map(|idx| &self.attributes[*idx])
    }

    /// Look up an attribute by alias or external id.
    ///
    /// Accepts ids prefixed with `"<entityExternalId>."`; aliases take
    /// precedence over literal external ids.
    pub fn get_attribute_by_external_id(&self, id: &str) -> Option<&Attribute> {
        let key = self.strip_entity_prefix(id).unwrap_or(id);
        self.by_alias
            .get(key)
            .or_else(|| self.by_external_id.get(key))
            .map(|idx| &self.attributes[*idx])
    }

    /// Resolve a relationship endpoint reference: alias, then the suffix of a
    /// dotted token against external ids, then a bare external id.
    pub fn find_attribute_by_reference(&self, reference: &str) -> Option<&Attribute> {
        if let Some(idx) = self.by_alias.get(reference) {
            return Some(&self.attributes[*idx]);
        }

        let suffix = self
            .strip_entity_prefix(reference)
            .or_else(|| reference.rsplit_once('.').map(|(_, suffix)| suffix));
        if let Some(idx) = suffix.and_then(|suffix| self.by_external_id.get(suffix)) {
            return Some(&self.attributes[*idx]);
        }

        self.by_external_id
            .get(reference)
            .map(|idx| &self.attributes[*idx])
    }

    /// Attributes that carry a foreign key.
    pub fn relationship_attributes(&self) -> Vec<&Attribute> {
        self.attributes
            .iter()
            .filter(|attribute| attribute.is_relationship())
            .collect()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Append a row after checking its primary key is present and unused.
    ///
    /// Missing foreign-key values are accepted; populated ones are checked by
    /// [`Entity::validate_all_foreign_keys`].
    pub fn add_row(&mut self, row: Row) -> Result<()> {
        let key = self.check_primary_key(&row)?;
        self.used_keys.insert(key);
        self.rows.push(row);
        Ok(())
    }

    /// Remove and return the row at `position`.
    pub fn remove_row(&mut self, position: usize) -> Option<Row> {
        if position >= self.rows.len() {
            return None;
        }
        let row = self.rows.remove(position);
        if let Some(key) = row.get_non_empty(self.primary_key().name()) {
            self.used_keys.remove(key);
        }
        Some(row)
    }

    pub fn clear_rows(&mut self) {
        self.rows.clear();
        self.used_keys.clear();
    }

    /// True when some row holds `value` for `attribute`.
    pub fn has_value(&self, attribute: &str, value: &str) -> bool {
        if attribute == self.primary_key().name() {
            return self.used_keys.contains(value);
        }
        self.rows.iter().any(|row| row.get(attribute) == Some(value))
    }

    /// Visit every row in order, allowing in-place mutation.
    ///
    /// Each visited row is taken out of the key index, handed to the visitor,
    /// and re-inserted through the same checks as [`Entity::add_row`]. Row
    /// order is preserved on success.
    ///
    /// On failure iteration stops and the error is wrapped with the row
    /// position and entity name. The pass is not transactional: rows before
    /// the failing position keep their mutations, the failing row is restored
    /// to its pre-visit value, and later rows are untouched. Callers should
    /// treat the row set as indeterminate and abort or rebuild the entity.
    pub fn for_each_row<F>(&mut self, mut visitor: F) -> Result<()>
    where
        F: FnMut(usize, &mut Row) -> Result<()>,
    {
        let pk_name = self.primary_key().name().to_string();

        for position in 0..self.rows.len() {
            let original = self.rows[position].clone();
            if let Some(key) = original.get_non_empty(&pk_name) {
                self.used_keys.remove(key);
            }

            let mut row = std::mem::take(&mut self.rows[position]);
            let outcome = visitor(position, &mut row).and_then(|()| self.check_primary_key(&row));

            match outcome {
                Ok(key) => {
                    self.used_keys.insert(key);
                    self.rows[position] = row;
                }
                Err(err) => {
                    if let Some(key) = original.get_non_empty(&pk_name) {
                        self.used_keys.insert(key.to_string());
                    }
                    self.rows[position] = original;
                    return Err(Error::RowVisit {
                        entity: self.name.clone(),
                        position,
                        source: Box::new(err),
                    });
                }
            }
        }

        Ok(())
    }

    /// Check that a populated relationship attribute of `row` references an
    /// existing row of the related entity.
    pub fn check_foreign_key(&self, graph: &Graph, row: &Row, attribute: &Attribute) -> Result<()> {
        let Some(value) = row.get_non_empty(attribute.name()) else {
            return Ok(());
        };
        let (related_entity, related_attribute) = self.resolve_related(graph, attribute)?;
        if related_entity.has_value(related_attribute.name(), value) {
            Ok(())
        } else {
            Err(self.violation(attribute, value, related_entity, related_attribute))
        }
    }

    /// Sweep every row and relationship attribute, collecting all foreign-key
    /// violations. Does not mutate and does not stop at the first failure.
    pub fn validate_all_foreign_keys(&self, graph: &Graph) -> Vec<String> {
        let mut violations = Vec::new();

        for attribute in self.relationship_attributes() {
            let (related_entity, related_attribute) = match self.resolve_related(graph, attribute) {
                Ok(resolved) => resolved,
                Err(err) => {
                    violations.push(err.to_string());
                    continue;
                }
            };

            let known: HashSet<&str> = related_entity
                .rows
                .iter()
                .filter_map(|row| row.get_non_empty(related_attribute.name()))
                .collect();

            for row in &self.rows {
                let Some(value) = row.get_non_empty(attribute.name()) else {
                    continue;
                };
                if !known.contains(value) {
                    violations.push(
                        self.violation(attribute, value, related_entity, related_attribute)
                            .to_string(),
                    );
                }
            }
        }

        violations
    }

    /// Project the entity into headers and ordered string rows.
    pub fn to_csv(&self) -> CsvData {
        let headers: Vec<String> = self
            .attributes
            .iter()
            .map(|attribute| attribute.name().to_string())
            .collect();
        let rows = self
            .rows
            .iter()
            .map(|row| {
                headers
                    .iter()
                    .map(|header| row.get(header).unwrap_or_default().to_string())
                    .collect()
            })
            .collect();

        CsvData {
            external_id: self.external_id.clone(),
            display_name: self.name.clone(),
            description: self.description.clone(),
            headers,
            rows,
        }
    }

    /// Mark `attribute` as the foreign key referencing another entity's attribute.
    pub(crate) fn mark_relationship_attribute(
        &mut self,
        attribute: &str,
        related_entity_id: &str,
        related_attribute: &str,
    ) -> Result<()> {
        let idx = *self.by_name.get(attribute).ok_or_else(|| {
            Error::schema(format!(
                "entity '{}': attribute '{attribute}' not found",
                self.id
            ))
        })?;
        let target = &mut self.attributes[idx];
        if let Some(existing) = target.related() {
            if existing.entity_id != related_entity_id
                || existing.attribute_name != related_attribute
            {
                return Err(Error::schema(format!(
                    "entity '{}': attribute '{attribute}' already references '{}.{}'",
                    self.id, existing.entity_id, existing.attribute_name
                )));
            }
        }
        target.mark_as_relationship(related_entity_id, related_attribute);
        Ok(())
    }

    fn check_primary_key(&self, row: &Row) -> Result<String> {
        let pk = self.primary_key();
        let value = row.get_non_empty(pk.name()).ok_or_else(|| Error::MissingPrimaryKey {
            entity: self.name.clone(),
            attribute: pk.name().to_string(),
        })?;
        if self.used_keys.contains(value) {
            return Err(Error::DuplicatePrimaryKey {
                entity: self.name.clone(),
                attribute: pk.name().to_string(),
                value: value.to_string(),
            });
        }
        Ok(value.to_string())
    }

    fn resolve_related<'g>(
        &self,
        graph: &'g Graph,
        attribute: &Attribute,
    ) -> Result<(&'g Entity, &'g Attribute)> {
        let related = attribute.related().ok_or_else(|| {
            Error::Lookup(format!(
                "entity '{}': attribute '{}' is not a relationship attribute",
                self.name,
                attribute.name()
            ))
        })?;
        let entity = graph.entity(&related.entity_id).ok_or_else(|| {
            Error::Lookup(format!(
                "entity '{}': related entity '{}' for attribute '{}' not found",
                self.name,
                related.entity_id,
                attribute.name()
            ))
        })?;
        let related_attribute = entity.get_attribute(&related.attribute_name).ok_or_else(|| {
            Error::Lookup(format!(
                "entity '{}': related attribute '{}.{}' for attribute '{}' not found",
                self.name,
                entity.name(),
                related.attribute_name,
                attribute.name()
            ))
        })?;
        Ok((entity, related_attribute))
    }

    fn violation(
        &self,
        attribute: &Attribute,
        value: &str,
        related_entity: &Entity,
        related_attribute: &Attribute,
    ) -> Error {
        Error::ForeignKeyViolation {
            entity: self.name.clone(),
            attribute: attribute.name().to_string(),
            value: value.to_string(),
            related_entity: related_entity.name().to_string(),
            related_attribute: related_attribute.name().to_string(),
        }
    }

    fn strip_entity_prefix<'a>(&self, reference: &'a str) -> Option<&'a str> {
        reference
            .strip_prefix(self.external_id.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn user_entity() -> Entity {
        Entity::new(
            "user",
            "users",
            "User",
            Some("Application users".to_string()),
            vec![
                Attribute::new("id", "user_id", "string", true).with_alias("UserId"),
                Attribute::new("name", "user_name", "name", false),
                Attribute::new("roleId", "role_id", "string", false).with_alias("UserRole"),
            ],
        )
        .expect("build entity")
    }

    fn row(pairs: &[(&str, &str)]) -> Row {
        pairs.iter().copied().collect()
    }

    #[test]
    fn primary_key_is_the_single_unique_attribute() {
        let entity = user_entity();
        let unique: Vec<_> = entity
            .attributes()
            .iter()
            .filter(|attribute| attribute.is_unique())
            .collect();
        assert_eq!(unique.len(), 1);
        assert_eq!(unique[0], entity.primary_key());
        assert_eq!(entity.primary_key().name(), "id");
        assert!(
            entity
                .attributes()
                .iter()
                .all(|attribute| attribute.parent_entity() == Some("user"))
        );
    }

    #[test]
    fn construction_rejects_invalid_attribute_sets() {
        let none_unique = Entity::new(
            "a",
            "a",
            "A",
            None,
            vec![Attribute::new("x", "x", "string", false)],
        );
        assert!(none_unique.expect_err("no primary key").to_string().contains("no unique attribute"));

        let two_unique = Entity::new(
            "a",
            "a",
            "A",
            None,
            vec![
                Attribute::new("x", "x", "string", true),
                Attribute::new("y", "y", "string", true),
            ],
        );
        assert!(two_unique.expect_err("two primary keys").to_string().contains("multiple unique"));

        let duplicate = Entity::new(
            "a",
            "a",
            "A",
            None,
            vec![
                Attribute::new("x", "x1", "string", true),
                Attribute::new("x", "x2", "string", false),
            ],
        );
        assert!(duplicate.expect_err("duplicate name").to_string().contains("duplicate attribute name"));

        let empty_id = Entity::new("", "a", "A", None, vec![Attribute::new("x", "x", "string", true)]);
        assert_eq!(empty_id.expect_err("empty id").kind(), ErrorKind::SchemaValidation);
    }

    #[test]
    fn external_id_lookup_strips_prefix_and_prefers_alias() {
        let entity = user_entity();
        assert_eq!(
            entity.get_attribute_by_external_id("users.role_id").expect("attribute by external id").name(),
            "roleId"
        );
        assert_eq!(entity.get_attribute_by_external_id("UserId").expect("attribute by external id").name(), "id");
        assert_eq!(entity.get_attribute_by_external_id("users.UserRole").expect("attribute by external id").name(), "roleId");
        assert!(entity.get_attribute_by_external_id("missing").is_none());
    }

    #[test]
    fn reference_resolution_order() {
        let entity = user_entity();
        assert_eq!(entity.find_attribute_by_reference("UserRole").expect("attribute by reference").name(), "roleId");
        assert_eq!(entity.find_attribute_by_reference("users.user_name").expect("attribute by reference").name(), "name");
        assert_eq!(entity.find_attribute_by_reference("user_id").expect("attribute by reference").name(), "id");
        assert!(entity.find_attribute_by_reference("users.nope").is_none());
    }

    #[test]
    fn add_row_enforces_primary_key() {
        let mut entity = user_entity();
        entity.add_row(row(&[("id", "u1"), ("name", "Ann")])).expect("insert row");

        let missing = entity.add_row(row(&[("name", "Bob")])).expect_err("row rejected");
        assert!(matches!(missing, Error::MissingPrimaryKey { .. }));

        let blank = entity.add_row(row(&[("id", ""), ("name", "Bob")])).expect_err("row rejected");
        assert!(matches!(blank, Error::MissingPrimaryKey { .. }));

        let duplicate = entity.add_row(row(&[("id", "u1")])).expect_err("row rejected");
        assert!(duplicate.to_string().contains("u1"));
        assert_eq!(entity.row_count(), 1);
    }

    #[test]
    fn remove_row_releases_its_key() {
        let mut entity = user_entity();
        entity.add_row(row(&[("id", "u1")])).expect("insert row");
        assert!(entity.remove_row(0).is_some());
        assert!(entity.remove_row(0).is_none());
        entity.add_row(row(&[("id", "u1")])).expect("insert row");
    }

    #[test]
    fn for_each_row_mutates_in_place_and_keeps_order() {
        let mut entity = user_entity();
        for key in ["u1", "u2", "u3"] {
            entity.add_row(row(&[("id", key)])).expect("insert row");
        }

        entity
            .for_each_row(|position, row| {
                row.set("name", format!("user-{position}"));
                Ok(())
            })
            .expect("visit rows");

        let names: Vec<_> = entity.rows().iter().map(|row| row.get("name").expect("value present")).collect();
        assert_eq!(names, vec!["user-0", "user-1", "user-2"]);

        // Re-keying a row to its own value is not a duplicate.
        entity
            .for_each_row(|_, row| {
                let key = row.get("id").expect("value present").to_string();
                row.set("id", key);
                Ok(())
            })
            .expect("visit rows");
    }

    #[test]
    fn for_each_row_rejects_duplicate_key_and_reports_position() {
        let mut entity = user_entity();
        for key in ["u1", "u2", "u3"] {
            entity.add_row(row(&[("id", key)])).expect("insert row");
        }

        let err = entity
            .for_each_row(|position, row| {
                if position == 1 {
                    row.set("id", "u1");
                }
                Ok(())
            })
            .expect_err("visit fails");

        match &err {
            Error::RowVisit { entity, position, .. } => {
                assert_eq!(entity, "User");
                assert_eq!(*position, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.kind(), ErrorKind::RowValidation);
        assert_eq!(entity.rows()[1].get("id"), Some("u2"));
    }

    #[test]
    fn for_each_row_stops_on_visitor_error() {
        let mut entity = user_entity();
        for key in ["u1", "u2", "u3"] {
            entity.add_row(row(&[("id", key)])).expect("insert row");
        }

        let mut visited = Vec::new();
        let err = entity
            .for_each_row(|position, _| {
                visited.push(position);
                if position == 1 {
                    return Err(Error::Lookup("boom".to_string()));
                }
                Ok(())
            })
            .expect_err("visit fails");

        assert_eq!(visited, vec![0, 1]);
        assert!(err.to_string().contains("row 1"));
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn to_csv_orders_values_by_declared_attributes() {
        let mut entity = Entity::new(
            "thing",
            "things",
            "Thing",
            None,
            vec![
                Attribute::new("id", "id", "string", true),
                Attribute::new("name", "name", "string", false),
            ],
        )
        .expect("build entity");
        entity.add_row(row(&[("id", "1"), ("name", "A")])).expect("insert row");
        entity.add_row(row(&[("name", "B"), ("id", "2")])).expect("insert row");
        entity.add_row(row(&[("id", "3")])).expect("insert row");

        let csv = entity.to_csv();
        assert_eq!(csv.headers, vec!["id", "name"]);
        assert!(csv.rows.contains(&vec!["1".to_string(), "A".to_string()]));
        assert!(csv.rows.contains(&vec!["2".to_string(), "B".to_string()]));
        assert!(csv.rows.contains(&vec!["3".to_string(), String::new()]));
        assert_eq!(csv.external_id, "things");
        assert_eq!(csv.display_name, "Thing");
    }
}
