use schemars::schema_for;
use sorgen_core::SchemaDefinition;

fn main() {
    let schema = schema_for!(SchemaDefinition);
    let json = serde_json::to_string_pretty(&schema).expect("serialize json schema");
    println!("{json}");
}
