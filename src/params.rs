//! Backend-specific parameter container
//!
//! A [`ParamBag`] maps parameter names to ordered sequences of string
//! values. Keys are backend-specific (`q`, `fl`, `wt`, `rows`, ...) and
//! values are untyped; the federation layer passes the bag through
//! opaquely and each backend adapter interprets it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Ordered multi-value parameter container passed opaquely to a backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamBag {
    params: BTreeMap<String, Vec<String>>,
}

impl ParamBag {
    /// Create an empty bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace all values for `name` with a single value
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.params.insert(name.into(), vec![value.into()]);
    }

    /// Replace all values for `name` with the given sequence
    pub fn set_all(&mut self, name: impl Into<String>, values: Vec<String>) {
        self.params.insert(name.into(), values);
    }

    /// Append a value to the sequence for `name`
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.params.entry(name.into()).or_default().push(value.into());
    }

    /// Remove all values for `name`, returning them if any were present
    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        self.params.remove(name)
    }

    /// All values for `name`, in insertion order
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.params.get(name).map(|v| v.as_slice())
    }

    /// First value for `name`
    pub fn first(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(|v| v.first()).map(|s| s.as_str())
    }

    /// Whether any value is set for `name`
    pub fn contains(&self, name: &str) -> bool {
        self.params.contains_key(name)
    }

    /// Merge another bag into this one
    ///
    /// For each key in `other`, its values are appended after this bag's
    /// existing values for the same key (caller's values first).
    pub fn merge_with(&mut self, other: &ParamBag) {
        for (name, values) in &other.params {
            self.params
                .entry(name.clone())
                .or_default()
                .extend(values.iter().cloned());
        }
    }

    /// Ordered `(name, value)` pairs, suitable for HTTP query encoding
    pub fn request(&self) -> Vec<(String, String)> {
        self.params
            .iter()
            .flat_map(|(name, values)| {
                values.iter().map(move |v| (name.clone(), v.clone()))
            })
            .collect()
    }

    /// Whether the bag holds no parameters at all
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_replaces_and_add_appends() {
        let mut bag = ParamBag::new();
        bag.set("fl", "id,title");
        bag.set("fl", "id");
        assert_eq!(bag.get("fl"), Some(&["id".to_string()][..]));

        bag.add("fq", "format:Book");
        bag.add("fq", "language:eng");
        assert_eq!(
            bag.get("fq"),
            Some(&["format:Book".to_string(), "language:eng".to_string()][..])
        );
    }

    #[test]
    fn test_merge_with_keeps_caller_values_first() {
        // set-then-merge path
        let mut caller = ParamBag::new();
        caller.set("a", "1");
        let mut other = ParamBag::new();
        other.set("a", "2");
        caller.merge_with(&other);
        assert_eq!(
            caller.get("a"),
            Some(&["1".to_string(), "2".to_string()][..])
        );

        // add-then-merge path
        let mut caller = ParamBag::new();
        caller.add("a", "1");
        let mut other = ParamBag::new();
        other.add("a", "2");
        caller.merge_with(&other);
        assert_eq!(
            caller.get("a"),
            Some(&["1".to_string(), "2".to_string()][..])
        );
    }

    #[test]
    fn test_merge_with_introduces_new_keys() {
        let mut caller = ParamBag::new();
        caller.set("q", "history");
        let mut other = ParamBag::new();
        other.set("rows", "20");
        caller.merge_with(&other);
        assert_eq!(caller.first("rows"), Some("20"));
        assert_eq!(caller.first("q"), Some("history"));
    }

    #[test]
    fn test_request_yields_one_pair_per_value() {
        let mut bag = ParamBag::new();
        bag.add("fq", "a");
        bag.add("fq", "b");
        bag.set("wt", "json");
        let pairs = bag.request();
        assert_eq!(
            pairs,
            vec![
                ("fq".to_string(), "a".to_string()),
                ("fq".to_string(), "b".to_string()),
                ("wt".to_string(), "json".to_string()),
            ]
        );
    }

    #[test]
    fn test_remove_is_total() {
        let mut bag = ParamBag::new();
        bag.set("user", "alice");
        assert_eq!(bag.remove("user"), Some(vec!["alice".to_string()]));
        assert_eq!(bag.remove("user"), None);
        assert!(!bag.contains("user"));
    }
}
