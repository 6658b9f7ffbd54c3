//! Value generators keyed by attribute type tag.

pub mod primitives;
pub mod semantic;

use std::collections::HashMap;

use chrono::NaiveDate;
use rand::RngCore;

use sorgen_core::Attribute;

/// Context handed to a generator for one attribute of one row.
#[derive(Debug, Clone, Copy)]
pub struct GeneratorContext<'a> {
    pub entity_external_id: &'a str,
    pub attribute: &'a Attribute,
    pub row_index: usize,
    pub base_date: NaiveDate,
}

/// Produces string values for one or more type tags.
pub trait Generator: Send + Sync {
    fn id(&self) -> &'static str;

    /// Type tags (lowercase) this generator serves.
    fn type_tags(&self) -> &'static [&'static str];

    fn generate(&self, ctx: &GeneratorContext<'_>, rng: &mut dyn RngCore) -> String;
}

/// Registry resolving type tags to generators.
pub struct GeneratorRegistry {
    generators: Vec<Box<dyn Generator>>,
    by_tag: HashMap<&'static str, usize>,
}

impl std::fmt::Debug for GeneratorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeneratorRegistry")
            .field("generators", &self.ids())
            .finish()
    }
}

impl Default for GeneratorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl GeneratorRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            generators: Vec::new(),
            by_tag: HashMap::new(),
        };
        primitives::register(&mut registry);
        semantic::register(&mut registry);
        registry
    }

    pub fn register_generator(&mut self, generator: Box<dyn Generator>) {
        let idx = self.generators.len();
        for tag in generator.type_tags() {
            self.by_tag.insert(*tag, idx);
        }
        self.generators.push(generator);
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.generators.iter().map(|generator| generator.id()).collect()
    }

    /// Generator for a type tag, if one is registered.
    pub fn generator(&self, type_tag: &str) -> Option<&dyn Generator> {
        self.by_tag
            .get(type_tag.to_ascii_lowercase().as_str())
            .map(|idx| self.generators[*idx].as_ref())
    }

    /// Generate a value, falling back to a lorem word for unknown tags.
    pub fn generate(&self, ctx: &GeneratorContext<'_>, rng: &mut dyn RngCore) -> String {
        match self.generator(ctx.attribute.data_type()) {
            Some(generator) => generator.generate(ctx, rng),
            None => semantic::fallback_word(rng),
        }
    }
}

/// Unique primary-key value for the row at `row_index`.
///
/// Integer keys are a 1-based sequence, uuid keys are random v4-shaped ids,
/// and everything else is `<entityExternalId>-<n>`.
pub fn primary_key_value(ctx: &GeneratorContext<'_>, rng: &mut dyn RngCore) -> String {
    let ordinal = ctx.row_index + 1;
    match ctx.attribute.data_type().to_ascii_lowercase().as_str() {
        "integer" | "int" | "bigint" | "number" => ordinal.to_string(),
        "uuid" => primitives::random_uuid(rng),
        _ => format!("{}-{ordinal}", ctx.entity_external_id),
    }
}
