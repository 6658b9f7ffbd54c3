//! Realistic values backed by the `fake` crate (en locale).

use fake::Fake;
use fake::faker::address::en::{CityName, CountryName, StreetName, ZipCode};
use fake::faker::company::en::CompanyName;
use fake::faker::internet::en::{SafeEmail, Username};
use fake::faker::lorem::en::{Sentence, Word};
use fake::faker::name::en::{FirstName, LastName, Name};
use fake::faker::phone_number::en::PhoneNumber;
use rand::RngCore;

use crate::generators::{Generator, GeneratorContext, GeneratorRegistry};

pub fn register(registry: &mut GeneratorRegistry) {
    registry.register_generator(Box::new(NameGenerator));
    registry.register_generator(Box::new(FirstNameGenerator));
    registry.register_generator(Box::new(LastNameGenerator));
    registry.register_generator(Box::new(EmailGenerator));
    registry.register_generator(Box::new(UsernameGenerator));
    registry.register_generator(Box::new(PhoneGenerator));
    registry.register_generator(Box::new(CompanyGenerator));
    registry.register_generator(Box::new(AddressGenerator));
    registry.register_generator(Box::new(CityGenerator));
    registry.register_generator(Box::new(CountryGenerator));
    registry.register_generator(Box::new(ZipGenerator));
    registry.register_generator(Box::new(SentenceGenerator));
    registry.register_generator(Box::new(WordGenerator));
}

/// Lorem word used for unknown type tags.
pub fn fallback_word(rng: &mut dyn RngCore) -> String {
    Word().fake_with_rng(rng)
}

macro_rules! faker_generator {
    ($name:ident, $id:literal, [$($tag:literal),+], $faker:expr) => {
        struct $name;

        impl Generator for $name {
            fn id(&self) -> &'static str {
                $id
            }

            fn type_tags(&self) -> &'static [&'static str] {
                &[$($tag),+]
            }

            fn generate(&self, _ctx: &GeneratorContext<'_>, rng: &mut dyn RngCore) -> String {
                $faker.fake_with_rng(rng)
            }
        }
    };
}

faker_generator!(NameGenerator, "semantic.name", ["name", "full_name", "person"], Name());
faker_generator!(FirstNameGenerator, "semantic.first_name", ["first_name"], FirstName());
faker_generator!(LastNameGenerator, "semantic.last_name", ["last_name"], LastName());
faker_generator!(EmailGenerator, "semantic.email", ["email"], SafeEmail());
faker_generator!(UsernameGenerator, "semantic.username", ["username", "login"], Username());
faker_generator!(PhoneGenerator, "semantic.phone", ["phone", "phone_number"], PhoneNumber());
faker_generator!(CompanyGenerator, "semantic.company", ["company", "organization"], CompanyName());
faker_generator!(AddressGenerator, "semantic.address", ["address", "street"], StreetName());
faker_generator!(CityGenerator, "semantic.city", ["city"], CityName());
faker_generator!(CountryGenerator, "semantic.country", ["country"], CountryName());
faker_generator!(ZipGenerator, "semantic.zip", ["zip", "postal_code"], ZipCode());
faker_generator!(SentenceGenerator, "semantic.sentence", ["sentence", "description"], Sentence(3..8));
faker_generator!(WordGenerator, "semantic.word", ["word", "enum", "status"], Word());

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;
    use sorgen_core::Attribute;

    #[test]
    fn email_tag_produces_an_address() {
        let registry = GeneratorRegistry::new();
        let attribute = Attribute::new("email", "email", "email", false);
        let ctx = GeneratorContext {
            entity_external_id: "users",
            attribute: &attribute,
            row_index: 0,
            base_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or_default(),
        };
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let value = registry.generate(&ctx, &mut rng);
        assert!(value.contains('@'), "{value}");
    }

    #[test]
    fn every_generator_id_is_distinct() {
        let registry = GeneratorRegistry::new();
        let mut ids = registry.ids();
        let total = ids.len();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), total);
    }
}
