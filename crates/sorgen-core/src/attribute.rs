use crate::schema::AttributeDefinition;

/// Column of an entity.
///
/// Attributes are owned by exactly one [`Entity`](crate::Entity). The parent
/// link is the owning entity's id, resolved through the graph when needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    name: String,
    external_id: String,
    alias: Option<String>,
    data_type: String,
    description: Option<String>,
    is_unique: bool,
    related: Option<RelatedAttribute>,
    parent_entity: Option<String>,
}

/// Target of a foreign-key attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedAttribute {
    pub entity_id: String,
    pub attribute_name: String,
}

impl Attribute {
    pub fn new(
        name: impl Into<String>,
        external_id: impl Into<String>,
        data_type: impl Into<String>,
        is_unique: bool,
    ) -> Self {
        Self {
            name: name.into(),
            external_id: external_id.into(),
            alias: None,
            data_type: data_type.into(),
            description: None,
            is_unique,
            related: None,
            parent_entity: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn from_definition(def: &AttributeDefinition) -> Self {
        Self {
            name: def.name.clone(),
            external_id: def.external_id.clone(),
            alias: def.alias.clone().filter(|alias| !alias.is_empty()),
            data_type: def.data_type.clone(),
            description: def.description.clone(),
            is_unique: def.unique,
            related: None,
            parent_entity: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn external_id(&self) -> &str {
        &self.external_id
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn data_type(&self) -> &str {
        &self.data_type
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn is_unique(&self) -> bool {
        self.is_unique
    }

    /// True iff a related entity/attribute pair is set.
    pub fn is_relationship(&self) -> bool {
        self.related.is_some()
    }

    pub fn related(&self) -> Option<&RelatedAttribute> {
        self.related.as_ref()
    }

    pub fn parent_entity(&self) -> Option<&str> {
        self.parent_entity.as_deref()
    }

    /// Link this attribute to the attribute it references. Idempotent and
    /// unvalidated; callers are responsible for the target existing.
    pub(crate) fn mark_as_relationship(
        &mut self,
        related_entity_id: impl Into<String>,
        related_attribute_name: impl Into<String>,
    ) {
        self.related = Some(RelatedAttribute {
            entity_id: related_entity_id.into(),
            attribute_name: related_attribute_name.into(),
        });
    }

    pub(crate) fn set_parent_entity(&mut self, entity_id: impl Into<String>) {
        self.parent_entity = Some(entity_id.into());
    }
}
