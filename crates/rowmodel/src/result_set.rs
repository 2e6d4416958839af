//! Ordered collections of records returned by multi-row queries.

use serde::ser::{Serialize, SerializeSeq, Serializer};

use rowmodel_core::{Attributes, Value, statement::values_equal};

use crate::record::{Entity, RecordKey};

/// Row predicate accepted by [`ResultSet::filter`] and [`ResultSet::find`].
pub trait RowMatcher {
    /// Whether `row` matches.
    fn matches(&self, row: &Attributes) -> bool;
}

impl<F> RowMatcher for F
where
    F: Fn(&Attributes) -> bool,
{
    fn matches(&self, row: &Attributes) -> bool {
        self(row)
    }
}

/// Partial deep match: every key of the shape must be present in the row with
/// a matching value. Nested objects match partially; every element of a shape
/// array must match some element of the row's array.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape(Attributes);

impl Shape {
    /// Match rows containing `attrs`.
    pub fn new(attrs: Attributes) -> Self {
        Shape(attrs)
    }

    /// The shape being matched.
    pub fn attributes(&self) -> &Attributes {
        &self.0
    }
}

impl From<Attributes> for Shape {
    fn from(attrs: Attributes) -> Self {
        Shape(attrs)
    }
}

impl RowMatcher for Shape {
    fn matches(&self, row: &Attributes) -> bool {
        object_matches(&self.0, row)
    }
}

fn object_matches(shape: &Attributes, row: &Attributes) -> bool {
    shape
        .iter()
        .all(|(key, expected)| row.get(key).is_some_and(|actual| value_matches(expected, actual)))
}

fn value_matches(expected: &Value, actual: &Value) -> bool {
    match (expected, actual) {
        (Value::Object(shape), Value::Object(row)) => object_matches(shape, row),
        (Value::Array(shape), Value::Array(row)) => shape
            .iter()
            .all(|e| row.iter().any(|a| value_matches(e, a))),
        _ => values_equal(expected, actual),
    }
}

/// Records from one query, in result order.
///
/// `keys()[i]` is always the identity of `records()[i]`, and `rows()[i]` is
/// always its attribute bag.
#[derive(Debug)]
pub struct ResultSet<R> {
    records: Vec<R>,
    keys: Vec<RecordKey>,
}

impl<R: Entity> Default for ResultSet<R> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<R: Entity> ResultSet<R> {
    /// Collect `records`.
    pub fn new(records: Vec<R>) -> Self {
        let keys = records.iter().map(Entity::key).collect();
        Self { records, keys }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether there are no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// The records, in order.
    pub fn records(&self) -> &[R] {
        &self.records
    }

    /// Identity keys, index-aligned with [`records`](Self::records).
    pub fn keys(&self) -> &[RecordKey] {
        &self.keys
    }

    /// Attribute bags, index-aligned with [`records`](Self::records).
    pub fn rows(&self) -> Vec<&Attributes> {
        self.records.iter().map(Entity::attributes).collect()
    }

    /// Record at `index`.
    pub fn get(&self, index: usize) -> Option<&R> {
        self.records.get(index)
    }

    /// Record at `index`, mutably.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut R> {
        self.records.get_mut(index)
    }

    /// Iterate the records in order.
    pub fn iter(&self) -> std::slice::Iter<'_, R> {
        self.records.iter()
    }

    /// Iterate the records mutably, in order.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, R> {
        self.records.iter_mut()
    }

    /// Records whose row matches `predicate`.
    pub fn filter<P: RowMatcher>(&self, predicate: P) -> Vec<&R> {
        self.records
            .iter()
            .filter(|record| predicate.matches(record.attributes()))
            .collect()
    }

    /// First record whose row matches `predicate`.
    pub fn find<P: RowMatcher>(&self, predicate: P) -> Option<&R> {
        self.records
            .iter()
            .find(|record| predicate.matches(record.attributes()))
    }

    /// Call `f(record, index)` for every record.
    pub fn each<F>(&self, mut f: F)
    where
        F: FnMut(&R, usize),
    {
        for (index, record) in self.records.iter().enumerate() {
            f(record, index);
        }
    }

    /// Collect `f(record, index)` for every record.
    pub fn map<T, F>(&self, mut f: F) -> Vec<T>
    where
        F: FnMut(&R, usize) -> T,
    {
        self.records
            .iter()
            .enumerate()
            .map(|(index, record)| f(record, index))
            .collect()
    }

    /// Position of `record`, by identity.
    pub fn index_of(&self, record: &R) -> Option<usize> {
        self.position(record.key())
    }

    /// Position of the record with identity `key`.
    pub fn position(&self, key: RecordKey) -> Option<usize> {
        self.keys.iter().position(|k| *k == key)
    }

    /// Append `record`.
    pub fn add(&mut self, record: R) {
        self.keys.push(record.key());
        self.records.push(record);
    }

    /// Remove and return the record with identity `key`.
    pub fn remove(&mut self, key: RecordKey) -> Option<R> {
        let index = self.position(key)?;
        self.keys.remove(index);
        Some(self.records.remove(index))
    }

    /// Take the records out.
    pub fn into_records(self) -> Vec<R> {
        self.records
    }
}

impl<R: Entity> FromIterator<R> for ResultSet<R> {
    fn from_iter<I: IntoIterator<Item = R>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<R> IntoIterator for ResultSet<R> {
    type Item = R;
    type IntoIter = std::vec::IntoIter<R>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a, R> IntoIterator for &'a ResultSet<R> {
    type Item = &'a R;
    type IntoIter = std::slice::Iter<'a, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

impl<R: Entity> Serialize for ResultSet<R> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.records.len()))?;
        for record in &self.records {
            seq.serialize_element(record.attributes())?;
        }
        seq.end()
    }
}
