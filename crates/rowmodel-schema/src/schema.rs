//! Field-type descriptor maps.

use crate::field::Field;

/// Ordered map of field name to descriptor.
///
/// Declaration order is preserved so defaults and `Required` failures are
/// reported in the order fields were declared.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<(String, Field)>,
}

impl Schema {
    /// An empty schema: every attribute passes through uncoerced.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a field.
    pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        self.insert(name, field);
        self
    }

    /// Add (or replace) a field in place.
    pub fn insert(&mut self, name: impl Into<String>, field: Field) {
        let name = name.into();
        if let Some(slot) = self.fields.iter_mut().find(|(n, _)| *n == name) {
            slot.1 = field;
        } else {
            self.fields.push((name, field));
        }
    }

    /// Descriptor for `name`.
    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, f)| f)
    }

    /// Whether `name` is described.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Fields in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(n, f)| (n.as_str(), f))
    }

    /// Field names in declaration order.
    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no fields are described.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Field)> for Schema {
    fn from_iter<I: IntoIterator<Item = (S, Field)>>(iter: I) -> Self {
        let mut schema = Schema::new();
        for (name, field) in iter {
            schema.insert(name, field);
        }
        schema
    }
}
