use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use tracing::debug;

use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::relationship::Relationship;
use crate::schema::{RelationshipDefinition, SchemaDefinition};

/// Entity-relationship graph built once from a schema definition.
///
/// Entities live in an arena keyed by schema id. Topology is fixed after
/// [`Graph::new`]; only row data inside entities changes afterwards.
#[derive(Debug, Clone)]
pub struct Graph {
    entities: Vec<Entity>,
    entity_index: HashMap<String, usize>,
    relationships: Vec<Relationship>,
    relationship_index: HashMap<String, usize>,
    entity_relationships: HashMap<String, Vec<usize>>,
    alias_refs: HashMap<String, String>,
    dotted_refs: HashMap<String, String>,
    skipped_relationships: Vec<String>,
    schema: SchemaDefinition,
}

impl Graph {
    /// Build the graph. Construction is all-or-nothing.
    pub fn new(schema: &SchemaDefinition) -> Result<Self> {
        let mut graph = Self {
            entities: Vec::with_capacity(schema.entities.len()),
            entity_index: HashMap::new(),
            relationships: Vec::with_capacity(schema.relationships.len()),
            relationship_index: HashMap::new(),
            entity_relationships: HashMap::new(),
            alias_refs: HashMap::new(),
            dotted_refs: HashMap::new(),
            skipped_relationships: Vec::new(),
            schema: schema.clone(),
        };

        if schema.entities.is_empty() {
            return Err(Error::schema("schema defines no entities"));
        }

        let mut external_ids = HashSet::new();
        for def in &schema.entities {
            if graph.entity_index.contains_key(&def.id) {
                return Err(Error::schema(format!("duplicate entity id '{}'", def.id)));
            }
            if !external_ids.insert(def.external_id.as_str()) {
                return Err(Error::schema(format!(
                    "entity '{}': duplicate entity external id '{}'",
                    def.id, def.external_id
                )));
            }
            let entity = Entity::from_definition(def)?;
            graph.index_attribute_references(&entity)?;
            graph
                .entity_index
                .insert(entity.id().to_string(), graph.entities.len());
            graph.entities.push(entity);
        }

        for def in &schema.relationships {
            if graph.relationship_index.contains_key(&def.id) {
                return Err(Error::schema(format!(
                    "duplicate relationship id '{}'",
                    def.id
                )));
            }
            if def.is_path() {
                debug!(relationship = %def.id, "skipping multi-hop relationship");
                graph.skipped_relationships.push(def.id.clone());
                continue;
            }
            graph.add_relationship(def)?;
        }

        graph.rebuild_relationship_index();

        debug!(
            entities = graph.entities.len(),
            relationships = graph.relationships.len(),
            skipped = graph.skipped_relationships.len(),
            "graph built"
        );

        Ok(graph)
    }

    /// Entities in declaration order.
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entity_ids(&self) -> Vec<&str> {
        self.entities.iter().map(Entity::id).collect()
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.entity_index.get(id).map(|idx| &self.entities[*idx])
    }

    /// Mutable access to an entity's rows.
    pub fn entity_mut(&mut self, id: &str) -> Option<&mut Entity> {
        self.entity_index
            .get(id)
            .copied()
            .map(|idx| &mut self.entities[idx])
    }

    /// Relationships in declaration order.
    pub fn relationships(&self) -> &[Relationship] {
        &self.relationships
    }

    pub fn relationship(&self, id: &str) -> Option<&Relationship> {
        self.relationship_index
            .get(id)
            .map(|idx| &self.relationships[*idx])
    }

    /// Relationships with either endpoint on `entity_id`.
    pub fn relationships_for_entity(&self, entity_id: &str) -> Vec<&Relationship> {
        self.entity_relationships
            .get(entity_id)
            .map(|indexes| indexes.iter().map(|idx| &self.relationships[*idx]).collect())
            .unwrap_or_default()
    }

    /// Ids of relationships declared by multi-hop path and left unmodeled.
    pub fn skipped_relationships(&self) -> &[String] {
        &self.skipped_relationships
    }

    /// Resolve an attribute reference to its entity id: alias first, then
    /// the dotted `entityExternalId.attributeExternalId` form.
    pub fn resolve_attribute_reference(&self, reference: &str) -> Result<&str> {
        self.alias_refs
            .get(reference)
            .or_else(|| self.dotted_refs.get(reference))
            .map(String::as_str)
            .ok_or_else(|| {
                Error::schema(format!(
                    "entity not found for attribute reference '{reference}'"
                ))
            })
    }

    /// Entity ids ordered so that referenced entities precede the entities
    /// holding foreign keys to them.
    ///
    /// Dependencies come from the declared relationships. Self-references
    /// add no edge.
    pub fn topological_order(&self) -> Result<Vec<String>> {
        let graph = self.build_dependencies()?;
        toposort(&graph).map_err(|entities| Error::CircularDependency { entities })
    }

    /// Collect foreign-key violations across every entity.
    pub fn validate_all_foreign_keys(&self) -> Vec<String> {
        self.entities
            .iter()
            .flat_map(|entity| entity.validate_all_foreign_keys(self))
            .collect()
    }

    fn index_attribute_references(&mut self, entity: &Entity) -> Result<()> {
        for attribute in entity.attributes() {
            if let Some(alias) = attribute.alias() {
                insert_reference(&mut self.alias_refs, alias, entity.id())?;
            }
            let dotted = format!("{}.{}", entity.external_id(), attribute.external_id());
            insert_reference(&mut self.dotted_refs, &dotted, entity.id())?;
        }
        Ok(())
    }

    fn add_relationship(&mut self, def: &RelationshipDefinition) -> Result<()> {
        let (from, to) = def.attribute_pair().ok_or_else(|| {
            Error::schema(format!(
                "relationship '{}' declares neither an attribute pair nor a path",
                def.id
            ))
        })?;

        let source_idx = self.entity_position(self.resolve_attribute_reference(from)?)?;
        let target_idx = self.entity_position(self.resolve_attribute_reference(to)?)?;

        let relationship = {
            let source = &self.entities[source_idx];
            let target = &self.entities[target_idx];
            let source_attr = endpoint(source, from, &def.id)?;
            let target_attr = endpoint(target, to, &def.id)?;
            let name = if def.name.is_empty() {
                def.display_name.clone()
            } else {
                def.name.clone()
            };
            Relationship::new(&def.id, name, source, target, source_attr, target_attr)?
        };

        // Only the foreign-key side is marked; the unique side stays a plain
        // key. For 1:1 this is the source attribute, which is itself unique.
        let side = relationship.foreign_key_side();
        let fk_idx = self.entity_position(side.entity_id)?;
        self.entities[fk_idx].mark_relationship_attribute(
            side.attribute,
            side.referenced_entity_id,
            side.referenced_attribute,
        )?;

        debug!(
            relationship = %relationship.id(),
            cardinality = %relationship.cardinality(),
            source = %relationship.source_entity(),
            target = %relationship.target_entity(),
            "relationship added"
        );

        self.relationship_index
            .insert(relationship.id().to_string(), self.relationships.len());
        self.relationships.push(relationship);
        Ok(())
    }

    fn rebuild_relationship_index(&mut self) {
        self.entity_relationships.clear();
        for entity in &self.entities {
            self.entity_relationships
                .insert(entity.id().to_string(), Vec::new());
        }
        for (idx, relationship) in self.relationships.iter().enumerate() {
            let mut endpoints = vec![relationship.source_entity()];
            if !relationship.is_self_referencing() {
                endpoints.push(relationship.target_entity());
            }
            for entity_id in endpoints {
                self.entity_relationships
                    .entry(entity_id.to_string())
                    .or_default()
                    .push(idx);
            }
        }
    }

    fn entity_position(&self, id: &str) -> Result<usize> {
        self.entity_index
            .get(id)
            .copied()
            .ok_or_else(|| Error::schema(format!("entity '{id}' not found")))
    }

    /// Adjacency from referenced entity to its dependents.
    fn build_dependencies(&self) -> Result<BTreeMap<String, BTreeSet<String>>> {
        let mut graph: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for entity in &self.schema.entities {
            graph.entry(entity.id.clone()).or_default();
        }

        for def in &self.schema.relationships {
            let Some((from, to)) = def.attribute_pair() else {
                continue;
            };
            let source_id = self.resolve_attribute_reference(from)?;
            let target_id = self.resolve_attribute_reference(to)?;
            if source_id == target_id {
                continue;
            }

            let source = self.entity(source_id).ok_or_else(|| missing_entity(source_id))?;
            let target = self.entity(target_id).ok_or_else(|| missing_entity(target_id))?;
            let source_unique = source
                .find_attribute_by_reference(from)
                .is_some_and(|attr| attr.is_unique());
            let target_unique = target
                .find_attribute_by_reference(to)
                .is_some_and(|attr| attr.is_unique());

            let (dependency, dependent) = if source_unique && !target_unique {
                (source_id, target_id)
            } else {
                (target_id, source_id)
            };
            graph
                .entry(dependency.to_string())
                .or_default()
                .insert(dependent.to_string());
        }

        Ok(graph)
    }
}

fn insert_reference(index: &mut HashMap<String, String>, token: &str, entity_id: &str) -> Result<()> {
    match index.get(token) {
        Some(existing) if existing != entity_id => Err(Error::schema(format!(
            "attribute reference '{token}' is ambiguous between entities '{existing}' and '{entity_id}'"
        ))),
        _ => {
            index.insert(token.to_string(), entity_id.to_string());
            Ok(())
        }
    }
}

fn endpoint<'e>(entity: &'e Entity, reference: &str, relationship_id: &str) -> Result<&'e str> {
    entity
        .find_attribute_by_reference(reference)
        .map(|attribute| attribute.name())
        .ok_or_else(|| {
            Error::schema(format!(
                "relationship '{relationship_id}': attribute '{reference}' not found on entity '{}'",
                entity.id()
            ))
        })
}

fn missing_entity(id: &str) -> Error {
    Error::schema(format!("entity '{id}' not found"))
}

fn toposort(graph: &BTreeMap<String, BTreeSet<String>>) -> std::result::Result<Vec<String>, Vec<String>> {
    let mut indegree: BTreeMap<&str, usize> = graph.keys().map(|node| (node.as_str(), 0)).collect();
    for targets in graph.values() {
        for target in targets {
            *indegree.entry(target.as_str()).or_insert(0) += 1;
        }
    }

    let mut ready: BTreeSet<&str> = indegree
        .iter()
        .filter_map(|(node, count)| if *count == 0 { Some(*node) } else { None })
        .collect();

    let mut order = Vec::with_capacity(indegree.len());

    while let Some(node) = ready.pop_first() {
        order.push(node.to_string());

        if let Some(targets) = graph.get(node) {
            for target in targets {
                if let Some(count) = indegree.get_mut(target.as_str()) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        ready.insert(target.as_str());
                    }
                }
            }
        }
    }

    if order.len() == indegree.len() {
        Ok(order)
    } else {
        Err(indegree
            .into_iter()
            .filter_map(|(node, count)| if count > 0 { Some(node.to_string()) } else { None })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::relationship::Cardinality;
    use crate::row::Row;
    use crate::schema::{AttributeDefinition, EntityDefinition};

    fn attr(name: &str, unique: bool, alias: Option<&str>) -> AttributeDefinition {
        AttributeDefinition {
            name: name.to_string(),
            external_id: name.to_string(),
            alias: alias.map(str::to_string),
            data_type: "string".to_string(),
            unique,
            description: None,
        }
    }

    fn entity(id: &str, attributes: Vec<AttributeDefinition>) -> EntityDefinition {
        EntityDefinition {
            id: id.to_string(),
            external_id: id.to_string(),
            display_name: id.to_uppercase(),
            description: None,
            attributes,
        }
    }

    fn rel(id: &str, from: &str, to: &str) -> RelationshipDefinition {
        RelationshipDefinition {
            id: id.to_string(),
            display_name: id.to_string(),
            name: id.to_string(),
            from_attribute: Some(from.to_string()),
            to_attribute: Some(to.to_string()),
            path: Vec::new(),
        }
    }

    fn user_role_schema() -> SchemaDefinition {
        SchemaDefinition {
            entities: vec![
                entity(
                    "user",
                    vec![attr("id", true, None), attr("roleId", false, Some("UserRole"))],
                ),
                entity("role", vec![attr("id", true, Some("RoleId"))]),
            ],
            relationships: vec![rel("user_role", "UserRole", "role.id")],
        }
    }

    #[test]
    fn builds_relationships_and_marks_foreign_key_side() {
        let graph = Graph::new(&user_role_schema()).expect("build graph");
        let relationship = graph.relationship("user_role").expect("relationship present");
        assert_eq!(relationship.cardinality(), Cardinality::ManyToOne);
        assert_eq!(relationship.source_entity(), "user");
        assert_eq!(relationship.target_entity(), "role");

        let user = graph.entity("user").expect("entity present");
        let fks = user.relationship_attributes();
        assert_eq!(fks.len(), 1);
        assert_eq!(fks[0].name(), "roleId");
        let related = fks[0].related().expect("related attribute");
        assert_eq!(related.entity_id, "role");
        assert_eq!(related.attribute_name, "id");
        assert!(graph.entity("role").expect("entity present").relationship_attributes().is_empty());

        assert_eq!(graph.relationships_for_entity("user").len(), 1);
        assert_eq!(graph.relationships_for_entity("role").len(), 1);
    }

    #[test]
    fn one_to_one_marks_source_only() {
        let schema = SchemaDefinition {
            entities: vec![
                entity("person", vec![attr("id", true, None)]),
                entity("passport", vec![attr("id", true, None)]),
            ],
            relationships: vec![rel("holder", "person.id", "passport.id")],
        };
        let graph = Graph::new(&schema).expect("build graph");
        assert_eq!(
            graph.relationship("holder").expect("relationship present").cardinality(),
            Cardinality::OneToOne
        );
        let person_fks = graph.entity("person").expect("entity present").relationship_attributes();
        assert_eq!(person_fks.len(), 1);
        assert!(person_fks[0].is_unique());
        assert!(graph.entity("passport").expect("entity present").relationship_attributes().is_empty());
    }

    #[test]
    fn one_to_many_marks_target_side() {
        let schema = SchemaDefinition {
            entities: vec![
                entity("dept", vec![attr("id", true, None)]),
                entity("emp", vec![attr("id", true, None), attr("deptId", false, None)]),
            ],
            relationships: vec![rel("staff", "dept.id", "emp.deptId")],
        };
        let graph = Graph::new(&schema).expect("build graph");
        assert!(graph.entity("dept").expect("entity present").relationship_attributes().is_empty());
        assert_eq!(graph.entity("emp").expect("entity present").relationship_attributes().len(), 1);
        assert_eq!(graph.topological_order().expect("topological order"), vec!["dept", "emp"]);
    }

    #[test]
    fn rejects_invalid_schemas() {
        let empty = Graph::new(&SchemaDefinition::default()).expect_err("invalid input rejected");
        assert_eq!(empty.kind(), ErrorKind::SchemaValidation);

        let mut duplicate = user_role_schema();
        duplicate.entities.push(entity("role", vec![attr("key", true, None)]));
        assert!(Graph::new(&duplicate).expect_err("invalid input rejected").to_string().contains("duplicate entity id"));

        let mut unresolved = user_role_schema();
        unresolved.relationships = vec![rel("bad", "user.nope", "role.id")];
        let err = Graph::new(&unresolved).expect_err("invalid input rejected");
        assert!(err.to_string().contains("entity not found"));

        let mut both_non_unique = user_role_schema();
        both_non_unique.relationships = vec![rel("bad", "user.roleId", "UserRole")];
        assert!(Graph::new(&both_non_unique).is_err());

        let mut shared_external_id = user_role_schema();
        let mut employee = entity("employee", vec![attr("employeeId", true, None)]);
        employee.external_id = "user".to_string();
        shared_external_id.entities.push(employee);
        let err = Graph::new(&shared_external_id).expect_err("shared external id");
        assert_eq!(err.kind(), ErrorKind::SchemaValidation);
        assert!(err.to_string().contains("duplicate entity external id 'user'"));

        let mut duplicate_rel = user_role_schema();
        duplicate_rel.relationships.push(rel("user_role", "UserRole", "RoleId"));
        assert!(
            Graph::new(&duplicate_rel)
                .expect_err("invalid input rejected")
                .to_string()
                .contains("duplicate relationship id")
        );
    }

    #[test]
    fn skips_multi_hop_relationships() {
        let mut schema = user_role_schema();
        schema.relationships.push(RelationshipDefinition {
            id: "via_path".to_string(),
            display_name: "via path".to_string(),
            name: "via_path".to_string(),
            from_attribute: None,
            to_attribute: None,
            path: vec!["user_role".to_string()],
        });
        let graph = Graph::new(&schema).expect("build graph");
        assert_eq!(graph.relationships().len(), 1);
        assert_eq!(graph.skipped_relationships(), ["via_path".to_string()]);
        assert!(graph.relationship("via_path").is_none());
    }

    #[test]
    fn resolves_references_alias_first() {
        let graph = Graph::new(&user_role_schema()).expect("build graph");
        assert_eq!(graph.resolve_attribute_reference("UserRole").expect("resolve reference"), "user");
        assert_eq!(graph.resolve_attribute_reference("role.id").expect("resolve reference"), "role");
        assert!(graph.resolve_attribute_reference("nobody.id").is_err());
    }

    #[test]
    fn topological_order_places_dependencies_first() {
        let schema = SchemaDefinition {
            entities: vec![
                entity("order", vec![attr("id", true, None), attr("userId", false, None)]),
                entity("user", vec![attr("id", true, None), attr("roleId", false, None)]),
                entity("role", vec![attr("id", true, None)]),
                entity("tag", vec![attr("id", true, None)]),
            ],
            relationships: vec![
                rel("order_user", "order.userId", "user.id"),
                rel("user_role", "user.roleId", "role.id"),
            ],
        };
        let graph = Graph::new(&schema).expect("build graph");
        let order = graph.topological_order().expect("topological order");
        assert_eq!(order.len(), 4);
        let pos = |id: &str| order.iter().position(|item| item == id).expect("entity in order");
        assert!(pos("role") < pos("user"));
        assert!(pos("user") < pos("order"));
        assert!(order.contains(&"tag".to_string()));
    }

    #[test]
    fn topological_order_detects_cycles() {
        let schema = SchemaDefinition {
            entities: vec![
                entity("a", vec![attr("id", true, None), attr("bId", false, None)]),
                entity("b", vec![attr("id", true, None), attr("aId", false, None)]),
            ],
            relationships: vec![rel("a_b", "a.bId", "b.id"), rel("b_a", "b.aId", "a.id")],
        };
        let graph = Graph::new(&schema).expect("build graph");
        for _ in 0..2 {
            match graph.topological_order().expect_err("cycle detected") {
                Error::CircularDependency { entities } => {
                    assert_eq!(entities, vec!["a".to_string(), "b".to_string()]);
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn self_reference_is_not_a_cycle() {
        let schema = SchemaDefinition {
            entities: vec![entity(
                "employee",
                vec![attr("id", true, None), attr("managerId", false, None)],
            )],
            relationships: vec![rel("manager", "employee.managerId", "employee.id")],
        };
        let graph = Graph::new(&schema).expect("build graph");
        assert_eq!(graph.topological_order().expect("topological order"), vec!["employee"]);
        assert_eq!(graph.relationships_for_entity("employee").len(), 1);
    }

    #[test]
    fn deferred_foreign_key_validation_reports_missing_targets() {
        let mut graph = Graph::new(&user_role_schema()).expect("build graph");
        let role: Row = [("id", "role-1")].into_iter().collect();
        graph.entity_mut("role").expect("entity present").add_row(role).expect("insert row");

        let user = graph.entity_mut("user").expect("entity present");
        user.add_row([("id", "u1"), ("roleId", "role-1")].into_iter().collect())
            .expect("insert row");
        user.add_row([("id", "u2"), ("roleId", "missing")].into_iter().collect())
            .expect("insert row");
        user.add_row([("id", "u3")].into_iter().collect()).expect("insert row");

        let violations = graph.validate_all_foreign_keys();
        assert_eq!(violations.len(), 1);
        assert!(violations[0].contains("missing"));
        assert!(violations[0].contains("does not exist"));

        let user = graph.entity("user").expect("entity present");
        let fk = user.get_attribute("roleId").expect("attribute present");
        assert!(user.check_foreign_key(&graph, &user.rows()[0], fk).is_ok());
        let err = user.check_foreign_key(&graph, &user.rows()[1], fk).expect_err("violation reported");
        assert_eq!(err.kind(), ErrorKind::RowValidation);
    }

    #[test]
    fn foreign_key_sweep_reports_every_violation() {
        let schema = SchemaDefinition {
            entities: vec![
                entity(
                    "user",
                    vec![
                        attr("id", true, None),
                        attr("roleId", false, Some("UserRole")),
                        attr("teamId", false, None),
                    ],
                ),
                entity("role", vec![attr("id", true, None)]),
                entity("team", vec![attr("id", true, None)]),
            ],
            relationships: vec![
                rel("user_role", "UserRole", "role.id"),
                rel("user_team", "user.teamId", "team.id"),
            ],
        };
        let mut graph = Graph::new(&schema).expect("build graph");
        graph
            .entity_mut("role")
            .expect("entity present")
            .add_row([("id", "r1")].into_iter().collect())
            .expect("insert row");
        graph
            .entity_mut("team")
            .expect("entity present")
            .add_row([("id", "t1")].into_iter().collect())
            .expect("insert row");

        let user = graph.entity_mut("user").expect("entity present");
        for (id, role, team) in [
            ("u1", "ghost-role-1", "t1"),
            ("u2", "ghost-role-2", "t1"),
            ("u3", "r1", "ghost-team"),
            ("u4", "r1", "t1"),
        ] {
            user.add_row([("id", id), ("roleId", role), ("teamId", team)].into_iter().collect())
                .expect("insert row");
        }

        let violations = graph.validate_all_foreign_keys();
        assert_eq!(violations.len(), 3, "{violations:?}");
        for value in ["ghost-role-1", "ghost-role-2", "ghost-team"] {
            assert!(
                violations.iter().any(|violation| violation.contains(value)),
                "missing violation for {value}: {violations:?}"
            );
        }

        let user = graph.entity("user").expect("entity present");
        assert_eq!(user.validate_all_foreign_keys(&graph).len(), 3);
    }
}
