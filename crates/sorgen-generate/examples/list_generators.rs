use sorgen_generate::generators::GeneratorRegistry;

fn main() {
    let registry = GeneratorRegistry::new();
    for id in registry.ids() {
        println!("{id}");
    }
}
