//! Dynamic tuple: an ordered, named column-value container.

use crate::types::Value;

/// A dynamic record for tables whose shape is not known at compile time.
///
/// Columns keep insertion order and are addressable by ordinal. Name lookup
/// is case-insensitive. A column that was never set is "absent", which is a
/// different state from a column set to [`Value::Null`]; partial tuples
/// (e.g. key-only operations) rely on that distinction.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GridTuple {
    entries: Vec<(String, Value)>,
}

impl GridTuple {
    /// Creates an empty tuple.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty tuple with capacity for `n` columns.
    pub fn with_capacity(n: usize) -> Self {
        Self {
            entries: Vec::with_capacity(n),
        }
    }

    /// Sets a column value, replacing any existing value under the same
    /// name (case-insensitive). Returns `self` for chaining.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.put(name, value);
        self
    }

    /// Sets a column value in place.
    pub fn put(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.ordinal(&name) {
            Some(i) => self.entries[i].1 = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Returns the ordinal of a column by case-insensitive name.
    pub fn ordinal(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    /// Returns the value of a column by case-insensitive name, or `None`
    /// when the column is absent. An explicit null returns `Some(&Value::Null)`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.ordinal(name).map(|i| &self.entries[i].1)
    }

    /// Returns the `(name, value)` pair at the given ordinal.
    pub fn entry(&self, ordinal: usize) -> Option<(&str, &Value)> {
        self.entries.get(ordinal).map(|(n, v)| (n.as_str(), v))
    }

    /// Returns the number of columns set on this tuple.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no columns are set.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(name, value)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let tuple = GridTuple::new().set("id", 42i64).set("name", "John Doe");
        assert_eq!(tuple.get("id"), Some(&Value::Int64(42)));
        assert_eq!(tuple.get("name"), Some(&Value::String("John Doe".into())));
        assert_eq!(tuple.len(), 2);
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let tuple = GridTuple::new().set("CustomerId", 7i32);
        assert_eq!(tuple.get("customerid"), Some(&Value::Int32(7)));
        assert_eq!(tuple.get("CUSTOMERID"), Some(&Value::Int32(7)));
        assert_eq!(tuple.ordinal("customerId"), Some(0));
    }

    #[test]
    fn test_absent_vs_null() {
        let tuple = GridTuple::new().set("name", Value::Null);
        assert_eq!(tuple.get("name"), Some(&Value::Null));
        assert_eq!(tuple.get("other"), None);
    }

    #[test]
    fn test_overwrite_keeps_order() {
        let mut tuple = GridTuple::new().set("a", 1i32).set("b", 2i32);
        tuple.put("A", 10i32);
        assert_eq!(tuple.entry(0), Some(("a", &Value::Int32(10))));
        assert_eq!(tuple.len(), 2);
    }

    #[test]
    fn test_iteration_order() {
        let tuple = GridTuple::new().set("z", 1i32).set("a", 2i32);
        let names: Vec<_> = tuple.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["z", "a"]);
    }
}
