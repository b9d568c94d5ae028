//! Schema-less, order-preserving key/value attributes of an entity.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys that belong to the entity record itself and can never be properties,
/// otherwise flattening would shadow them.
pub const RESERVED_KEYS: [&str; 3] = ["id", "type", "_private"];

/// Ordered string-to-string mapping owned by a single entity.
///
/// Iteration follows insertion order. Overwriting an existing key keeps its
/// original position, so flattened responses are reproducible.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyMap {
    entries: Vec<(String, String)>,
}

impl PropertyMap {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[inline]
    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Upsert a property. Returns `true` when the key was newly appended.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> bool {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => {
                *existing = value;
                false
            }
            None => {
                self.entries.push((key, value));
                true
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Nested view: the properties as their own JSON object.
    pub fn to_mapping(&self) -> Map<String, Value> {
        let mut map = Map::with_capacity(self.entries.len());
        self.flatten_onto(&mut map);
        map
    }

    /// Flattened view: write every property onto the top level of `target`.
    pub fn flatten_onto(&self, target: &mut Map<String, Value>) {
        for (key, value) in &self.entries {
            target.insert(key.clone(), Value::String(value.clone()));
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PropertyMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = PropertyMap::new();
        for (k, v) in iter {
            map.set(k, v);
        }
        map
    }
}

/// Property keys must be non-empty and must not collide with entity fields.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::validation("property keys must not be empty"));
    }
    if RESERVED_KEYS.contains(&key) {
        return Err(Error::validation(format!("'{}' is a reserved key", key)));
    }
    Ok(())
}

/// Coerce a JSON value into a stored property value.
///
/// Strings are kept verbatim, numbers and booleans keep their JSON text.
/// Anything else is not string-like and yields `None`.
pub fn to_property_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Validate a decoded request object into `(key, value)` pairs, preserving
/// the order in which the keys appear.
pub fn parse_properties(obj: &Map<String, Value>) -> Result<Vec<(String, String)>> {
    let mut pairs = Vec::with_capacity(obj.len());
    for (key, value) in obj {
        validate_key(key)?;
        let value = to_property_value(value).ok_or_else(|| {
            Error::validation(format!("property '{}' must be a string, number or boolean", key))
        })?;
        pairs.push((key.clone(), value));
    }
    Ok(pairs)
}
