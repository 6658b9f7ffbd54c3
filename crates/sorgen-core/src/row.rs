use std::collections::HashMap;

/// Mutable attribute-name to string-value record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    values: HashMap<String, String>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, attribute: &str) -> Option<&str> {
        self.values.get(attribute).map(String::as_str)
    }

    /// Value for `attribute`, treating an empty string as absent.
    pub fn get_non_empty(&self, attribute: &str) -> Option<&str> {
        self.get(attribute).filter(|value| !value.is_empty())
    }

    pub fn set(&mut self, attribute: impl Into<String>, value: impl Into<String>) {
        self.values.insert(attribute.into(), value.into());
    }

    pub fn remove(&mut self, attribute: &str) -> Option<String> {
        self.values.remove(attribute)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &HashMap<String, String> {
        &self.values
    }
}

impl<K, V> FromIterator<(K, V)> for Row
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }
}

impl From<HashMap<String, String>> for Row {
    fn from(values: HashMap<String, String>) -> Self {
        Self { values }
    }
}
