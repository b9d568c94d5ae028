use crate::property::{parse_properties, validate_key, PropertyMap};
use crate::{Error, Result};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

pub type EntityId = String;

/// Fresh 128-bit random identifier in hyphenated form.
#[inline]
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// A typed record with schema-less properties
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    #[serde(rename = "type")]
    pub entity_type: String,
    #[serde(rename = "_private", default)]
    pub private: bool,
    pub properties: PropertyMap,
}

/// How an entity is laid out in a response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EntityShape {
    /// `{id, type, _private, <key>: <value>, ...}`
    #[default]
    Flattened,
    /// `{id, type, _private, properties: {...}}`
    Nested,
}

impl EntityShape {
    pub fn parse(raw: Option<&str>) -> Result<Self> {
        match raw.map(str::to_ascii_lowercase).as_deref() {
            None | Some("flattened") | Some("flat") => Ok(EntityShape::Flattened),
            Some("nested") => Ok(EntityShape::Nested),
            Some(other) => Err(Error::validation(format!("unknown shape '{}'", other))),
        }
    }
}

impl Entity {
    fn header(&self) -> Map<String, Value> {
        let mut obj = Map::with_capacity(self.properties.len() + 3);
        obj.insert("id".into(), Value::String(self.id.clone()));
        obj.insert("type".into(), Value::String(self.entity_type.clone()));
        obj.insert("_private".into(), Value::Bool(self.private));
        obj
    }

    /// Canonical representation: properties lifted onto the top level.
    pub fn to_flattened(&self) -> Value {
        let mut obj = self.header();
        self.properties.flatten_onto(&mut obj);
        Value::Object(obj)
    }

    pub fn to_nested(&self) -> Value {
        let mut obj = self.header();
        obj.insert("properties".into(), Value::Object(self.properties.to_mapping()));
        Value::Object(obj)
    }

    pub fn to_shape(&self, shape: EntityShape) -> Value {
        match shape {
            EntityShape::Flattened => self.to_flattened(),
            EntityShape::Nested => self.to_nested(),
        }
    }

    /// `{id, type}` as returned by neighbor traversal.
    pub fn to_summary(&self) -> Value {
        serde_json::json!({ "id": self.id, "type": self.entity_type })
    }
}

/// Validated input for entity creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewEntity {
    pub entity_type: String,
    pub private: bool,
    pub properties: Vec<(String, String)>,
}

impl NewEntity {
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            private: false,
            properties: Vec::new(),
        }
    }

    #[must_use]
    pub fn private(mut self, private: bool) -> Self {
        self.private = private;
        self
    }

    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.push((key.into(), value.into()));
        self
    }

    /// Decode a request body of the form
    /// `{"type": str, "_private"?: bool, "properties"?: {..}}`.
    pub fn from_json(body: &Value) -> Result<Self> {
        let obj = body
            .as_object()
            .ok_or_else(|| Error::validation("request body must be a JSON object"))?;

        let entity_type = match obj.get("type") {
            Some(Value::String(t)) => t.clone(),
            Some(_) => return Err(Error::validation("'type' must be a string")),
            None => return Err(Error::validation("'type' is required")),
        };

        let private = match obj.get("_private") {
            None | Some(Value::Null) => false,
            Some(Value::Bool(b)) => *b,
            Some(_) => return Err(Error::validation("'_private' must be a boolean")),
        };

        let properties = match obj.get("properties") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Object(props)) => parse_properties(props)?,
            Some(_) => return Err(Error::validation("'properties' must be an object")),
        };

        Ok(Self {
            entity_type,
            private,
            properties,
        })
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.entity_type.is_empty() {
            return Err(Error::validation("'type' must not be empty"));
        }
        for (key, _) in &self.properties {
            validate_key(key)?;
        }
        Ok(())
    }

    /// Validate the input and assign a fresh identifier, without storing it.
    pub fn build(self) -> Result<Entity> {
        self.validate()?;
        Ok(self.into_entity())
    }

    pub(crate) fn into_entity(self) -> Entity {
        Entity {
            id: generate_id(),
            entity_type: self.entity_type,
            private: self.private,
            properties: self.properties.into_iter().collect(),
        }
    }
}

/// Owns entity records and their property maps.
///
/// Lookups are by identifier. Listing follows creation order.
#[derive(Debug, Default)]
pub struct EntityStore {
    entities: AHashMap<EntityId, Entity>,
    order: Vec<EntityId>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and persist a new entity together with its initial properties.
    pub fn create(&mut self, input: NewEntity) -> Result<Entity> {
        let entity = input.build()?;
        self.insert(entity.clone())?;
        Ok(entity)
    }

    /// Insert a fully formed record, e.g. during recovery.
    pub fn insert(&mut self, entity: Entity) -> Result<()> {
        if self.entities.contains_key(&entity.id) {
            return Err(Error::Conflict(format!("entity {} already exists", entity.id)));
        }
        self.order.push(entity.id.clone());
        self.entities.insert(entity.id.clone(), entity);
        Ok(())
    }

    /// Private entities are reported as missing unless `include_private` is set.
    pub fn get(&self, id: &str, include_private: bool) -> Result<&Entity> {
        match self.entities.get(id) {
            Some(e) if include_private || !e.private => Ok(e),
            _ => Err(Error::entity_not_found()),
        }
    }

    #[inline]
    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    pub fn list(&self, include_private: bool) -> impl Iterator<Item = &Entity> + '_ {
        self.order
            .iter()
            .filter_map(move |id| self.entities.get(id))
            .filter(move |e| include_private || !e.private)
    }

    /// Upsert every `(key, value)` into the entity's properties. Keys not
    /// named in `updates` are left alone.
    pub fn patch(&mut self, id: &str, updates: &[(String, String)]) -> Result<&Entity> {
        for (key, _) in updates {
            validate_key(key)?;
        }
        let entity = self
            .entities
            .get_mut(id)
            .ok_or_else(Error::entity_not_found)?;
        for (key, value) in updates {
            entity.properties.set(key.as_str(), value.as_str());
        }
        Ok(&*entity)
    }

    pub fn remove(&mut self, id: &str) -> Result<Entity> {
        let entity = self.entities.remove(id).ok_or_else(Error::entity_not_found)?;
        self.order.retain(|e| e != id);
        Ok(entity)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
