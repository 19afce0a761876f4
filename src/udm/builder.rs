//! Object construction
//!
//! Object literals and the XML bridge accumulate entries here and finalize
//! into an immutable [`Object`]; no engine client ever sees the mutable
//! intermediate.

use indexmap::IndexMap;

use super::{Object, Udm};

/// Accumulates properties and attributes, then finalizes into an [`Object`].
#[derive(Debug, Default)]
pub struct ObjectBuilder {
    name: Option<String>,
    attributes: IndexMap<String, String>,
    properties: IndexMap<String, Udm>,
    metadata: IndexMap<String, String>,
}

impl ObjectBuilder {
    pub fn new() -> Self {
        ObjectBuilder::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        ObjectBuilder {
            name: Some(name.into()),
            ..ObjectBuilder::default()
        }
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> &mut Self {
        self.name = Some(name.into());
        self
    }

    /// Insert or overwrite a property. A repeated key keeps its original
    /// insertion position, so serialization order stays stable.
    pub fn property(&mut self, key: impl Into<String>, value: Udm) -> &mut Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// Insert a property, promoting a repeated key to an array of values.
    /// This is how the XML bridge turns repeated sibling elements into an
    /// array-valued property.
    pub fn append_property(&mut self, key: impl Into<String>, value: Udm) -> &mut Self {
        let key = key.into();
        match self.properties.get_mut(&key) {
            Some(Udm::Array(items)) => {
                items.push(value);
            }
            Some(existing) => {
                let first = std::mem::replace(existing, Udm::Null);
                *existing = Udm::Array(vec![first, value]);
            }
            None => {
                self.properties.insert(key, value);
            }
        }
        self
    }

    pub fn attribute(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn metadata(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn has_property(&self, key: &str) -> bool {
        self.properties.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty() && self.attributes.is_empty()
    }

    pub fn finish(self) -> Object {
        Object {
            name: self.name,
            attributes: self.attributes,
            properties: self.properties,
            metadata: self.metadata,
        }
    }

    pub fn build(self) -> Udm {
        Udm::Object(self.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_preserved() {
        let mut builder = ObjectBuilder::new();
        builder.property("z", Udm::Int(1));
        builder.property("a", Udm::Int(2));
        builder.property("m", Udm::Int(3));
        let obj = builder.finish();
        let keys: Vec<&str> = obj.properties.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_overwrite_keeps_position() {
        let mut builder = ObjectBuilder::new();
        builder.property("a", Udm::Int(1));
        builder.property("b", Udm::Int(2));
        builder.property("a", Udm::Int(9));
        let obj = builder.finish();
        let keys: Vec<&str> = obj.properties.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(obj.properties.get("a"), Some(&Udm::Int(9)));
    }

    #[test]
    fn test_append_promotes_to_array() {
        let mut builder = ObjectBuilder::new();
        builder.append_property("item", Udm::Int(1));
        builder.append_property("item", Udm::Int(2));
        builder.append_property("item", Udm::Int(3));
        let obj = builder.finish();
        assert_eq!(
            obj.properties.get("item"),
            Some(&Udm::Array(vec![Udm::Int(1), Udm::Int(2), Udm::Int(3)]))
        );
    }

    #[test]
    fn test_named_builder() {
        let obj = ObjectBuilder::named("Order").finish();
        assert_eq!(obj.name.as_deref(), Some("Order"));
    }
}
