//! Scope values merged into action payloads.
//!
//! A scope maps scope-key names (`"user"`, `"project"`) to opaque identifier values.
//! An [`ActionConfig`](crate::config::ActionConfig) declares which keys it needs; only
//! those keys are projected from the ambient scope before being merged into a payload.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Externally supplied identifying context, e.g. `{user: "123", project: "456"}`.
///
/// # Examples
///
/// ```
/// use record_relay_core::scope::Scope;
///
/// let scope = Scope::new().with("user", "123").with("project", "456");
/// let projected = scope.project(&["user"]);
/// assert_eq!(projected.get("user"), Some(&"123".into()));
/// assert!(projected.get("project").is_none());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Scope(Map<String, Value>);

impl Scope {
    /// An empty scope.
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Insert a scope value, returning the previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    /// Look up a scope value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Whether the scope carries `key`.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of scope values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the scope is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over `(key, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Keep only the listed keys. Keys the scope does not carry are simply absent
    /// from the result.
    #[must_use]
    pub fn project<K: AsRef<str>>(&self, keys: &[K]) -> Self {
        Self(
            keys.iter()
                .filter_map(|key| {
                    let key = key.as_ref();
                    self.0.get(key).map(|value| (key.to_string(), value.clone()))
                })
                .collect(),
        )
    }

    /// The listed keys that this scope does not carry.
    #[must_use]
    pub fn missing<K: AsRef<str>>(&self, keys: &[K]) -> Vec<String> {
        keys.iter()
            .map(|key| key.as_ref())
            .filter(|key: &&str| !self.0.contains_key(*key))
            .map(str::to_string)
            .collect()
    }

    /// Scope underneath `object`: keys present in both keep the object's value.
    #[must_use]
    pub fn merged_under(&self, object: &Map<String, Value>) -> Map<String, Value> {
        let mut merged = self.0.clone();
        merged.extend(object.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }

    /// Scope on top of `object`: keys present in both take the scope's value.
    #[must_use]
    pub fn merged_over(&self, object: &Map<String, Value>) -> Map<String, Value> {
        let mut merged = object.clone();
        merged.extend(self.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged
    }

    /// Borrow the underlying JSON map.
    #[must_use]
    pub const fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consume into the underlying JSON map.
    #[must_use]
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Scope {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Scope {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Tests can unwrap
mod tests {
    use super::*;
    use serde_json::json;

    fn ambient() -> Scope {
        Scope::new().with("user", "123").with("project", "456")
    }

    #[test]
    fn project_keeps_only_declared_keys() {
        let projected = ambient().project(&["user"]);
        assert_eq!(projected, Scope::new().with("user", "123"));
    }

    #[test]
    fn project_skips_absent_keys() {
        let projected = ambient().project(&["user", "location"]);
        assert_eq!(projected.len(), 1);
        assert!(!projected.contains_key("location"));
    }

    #[test]
    fn missing_lists_absent_keys() {
        assert_eq!(ambient().missing(&["user", "location"]), vec!["location"]);
        assert!(ambient().missing(&["user", "project"]).is_empty());
    }

    #[test]
    fn merge_precedence() {
        let object = json!({"user": "999", "name": "Paris"});
        let object = object.as_object().cloned().unwrap_or_default();

        let under = ambient().merged_under(&object);
        assert_eq!(under["user"], json!("999"));
        assert_eq!(under["project"], json!("456"));

        let over = ambient().merged_over(&object);
        assert_eq!(over["user"], json!("123"));
        assert_eq!(over["name"], json!("Paris"));
    }
}
