use chrono::{Duration, NaiveTime};
use rand::{Rng, RngCore};

use crate::generators::{Generator, GeneratorContext, GeneratorRegistry};

const DEFAULT_INT_MIN: i64 = 0;
const DEFAULT_INT_MAX: i64 = 10000;
const DEFAULT_FLOAT_MAX: f64 = 10000.0;
const DATE_SPAN_DAYS: i64 = 3 * 365;
const DEFAULT_TEXT_LEN: usize = 12;
const DEFAULT_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub fn register(registry: &mut GeneratorRegistry) {
    registry.register_generator(Box::new(IntGenerator));
    registry.register_generator(Box::new(DecimalGenerator));
    registry.register_generator(Box::new(BoolGenerator));
    registry.register_generator(Box::new(DateGenerator));
    registry.register_generator(Box::new(TimestampGenerator));
    registry.register_generator(Box::new(UuidGenerator));
    registry.register_generator(Box::new(TextGenerator));
}

pub fn random_uuid(rng: &mut dyn RngCore) -> String {
    let mut bytes = [0u8; 16];
    rng.fill_bytes(&mut bytes);
    uuid::Builder::from_random_bytes(bytes)
        .into_uuid()
        .to_string()
}

struct IntGenerator;

impl Generator for IntGenerator {
    fn id(&self) -> &'static str {
        "primitive.int"
    }

    fn type_tags(&self) -> &'static [&'static str] {
        &["integer", "int", "bigint", "number"]
    }

    fn generate(&self, _ctx: &GeneratorContext<'_>, rng: &mut dyn RngCore) -> String {
        rng.random_range(DEFAULT_INT_MIN..=DEFAULT_INT_MAX).to_string()
    }
}

struct DecimalGenerator;

impl Generator for DecimalGenerator {
    fn id(&self) -> &'static str {
        "primitive.decimal"
    }

    fn type_tags(&self) -> &'static [&'static str] {
        &["decimal", "float", "double", "money", "currency"]
    }

    fn generate(&self, _ctx: &GeneratorContext<'_>, rng: &mut dyn RngCore) -> String {
        let value: f64 = rng.random_range(0.0..DEFAULT_FLOAT_MAX);
        format!("{value:.2}")
    }
}

struct BoolGenerator;

impl Generator for BoolGenerator {
    fn id(&self) -> &'static str {
        "primitive.bool"
    }

    fn type_tags(&self) -> &'static [&'static str] {
        &["boolean", "bool"]
    }

    fn generate(&self, _ctx: &GeneratorContext<'_>, rng: &mut dyn RngCore) -> String {
        rng.random_bool(0.5).to_string()
    }
}

struct DateGenerator;

impl Generator for DateGenerator {
    fn id(&self) -> &'static str {
        "primitive.date"
    }

    fn type_tags(&self) -> &'static [&'static str] {
        &["date"]
    }

    fn generate(&self, ctx: &GeneratorContext<'_>, rng: &mut dyn RngCore) -> String {
        let offset = rng.random_range(0..DATE_SPAN_DAYS);
        (ctx.base_date - Duration::days(offset))
            .format("%Y-%m-%d")
            .to_string()
    }
}

struct TimestampGenerator;

impl Generator for TimestampGenerator {
    fn id(&self) -> &'static str {
        "primitive.timestamp"
    }

    fn type_tags(&self) -> &'static [&'static str] {
        &["datetime", "timestamp"]
    }

    fn generate(&self, ctx: &GeneratorContext<'_>, rng: &mut dyn RngCore) -> String {
        let offset = rng.random_range(0..DATE_SPAN_DAYS);
        let seconds = rng.random_range(0..86_400u32);
        let time = NaiveTime::from_num_seconds_from_midnight_opt(seconds, 0).unwrap_or_default();
        (ctx.base_date - Duration::days(offset))
            .and_time(time)
            .format("%Y-%m-%dT%H:%M:%S")
            .to_string()
    }
}

struct UuidGenerator;

impl Generator for UuidGenerator {
    fn id(&self) -> &'static str {
        "primitive.uuid"
    }

    fn type_tags(&self) -> &'static [&'static str] {
        &["uuid", "guid"]
    }

    fn generate(&self, _ctx: &GeneratorContext<'_>, rng: &mut dyn RngCore) -> String {
        random_uuid(rng)
    }
}

struct TextGenerator;

impl Generator for TextGenerator {
    fn id(&self) -> &'static str {
        "primitive.text"
    }

    fn type_tags(&self) -> &'static [&'static str] {
        &["string", "text", "code"]
    }

    fn generate(&self, _ctx: &GeneratorContext<'_>, rng: &mut dyn RngCore) -> String {
        (0..DEFAULT_TEXT_LEN)
            .map(|_| DEFAULT_CHARSET[rng.random_range(0..DEFAULT_CHARSET.len())] as char)
            .collect()
    }
}
