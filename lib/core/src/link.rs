use crate::entity::generate_id;
use crate::{Error, Result};
use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type LinkId = String;

pub const DEFAULT_LINK_TYPE: &str = "connected_to";

/// Undirected, labelled relation between two entity identifiers.
///
/// The stored pair keeps the order it was created with, but traversal
/// treats both endpoints alike. Endpoints are held by value only and may
/// name entities that do not exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub id: LinkId,
    pub entity_a: String,
    pub entity_b: String,
    pub link_type: String,
}

impl Link {
    #[inline]
    pub fn touches(&self, entity_id: &str) -> bool {
        self.entity_a == entity_id || self.entity_b == entity_id
    }

    /// The endpoint opposite `entity_id`, or `None` if the link does not touch it.
    /// A self-link yields the entity itself.
    pub fn other_endpoint(&self, entity_id: &str) -> Option<&str> {
        if self.entity_a == entity_id {
            Some(&self.entity_b)
        } else if self.entity_b == entity_id {
            Some(&self.entity_a)
        } else {
            None
        }
    }
}

/// Validated input for link creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLink {
    pub entity_a: String,
    pub entity_b: String,
    pub link_type: Option<String>,
}

impl NewLink {
    pub fn new(entity_a: impl Into<String>, entity_b: impl Into<String>) -> Self {
        Self {
            entity_a: entity_a.into(),
            entity_b: entity_b.into(),
            link_type: None,
        }
    }

    #[must_use]
    pub fn with_type(mut self, link_type: impl Into<String>) -> Self {
        self.link_type = Some(link_type.into());
        self
    }

    /// Decode `{"entity_a": str, "entity_b": str, "link_type"?: str}`.
    pub fn from_json(body: &Value) -> Result<Self> {
        let obj = body
            .as_object()
            .ok_or_else(|| Error::validation("request body must be a JSON object"))?;

        let endpoint = |field: &str| match obj.get(field) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(_) => Err(Error::validation(format!("'{}' must be a string", field))),
            None => Err(Error::validation(format!("'{}' is required", field))),
        };

        let link_type = match obj.get("link_type") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => return Err(Error::validation("'link_type' must be a string")),
        };

        Ok(Self {
            entity_a: endpoint("entity_a")?,
            entity_b: endpoint("entity_b")?,
            link_type,
        })
    }

    /// Assign an identifier and the default type, producing the stored record.
    pub fn into_link(self) -> Link {
        Link {
            id: generate_id(),
            entity_a: self.entity_a,
            entity_b: self.entity_b,
            link_type: self
                .link_type
                .unwrap_or_else(|| DEFAULT_LINK_TYPE.to_string()),
        }
    }
}

/// Owns every link record, kept in creation order.
#[derive(Debug, Default)]
pub struct LinkStore {
    links: Vec<Link>,
    ids: AHashSet<LinkId>,
}

impl LinkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// No endpoint existence check is made.
    pub fn create(&mut self, input: NewLink) -> Link {
        let link = input.into_link();
        self.ids.insert(link.id.clone());
        self.links.push(link.clone());
        link
    }

    /// Insert a fully formed record, e.g. during recovery.
    pub fn insert(&mut self, link: Link) -> Result<()> {
        if !self.ids.insert(link.id.clone()) {
            return Err(Error::Conflict(format!("link {} already exists", link.id)));
        }
        self.links.push(link);
        Ok(())
    }

    #[inline]
    pub fn list(&self) -> &[Link] {
        &self.links
    }

    pub fn find_by_endpoint<'a>(&'a self, entity_id: &'a str) -> impl Iterator<Item = &'a Link> + 'a {
        self.links.iter().filter(move |l| l.touches(entity_id))
    }

    /// Remove every link touching `entity_id`. Zero matches is not an error.
    pub fn delete_by_endpoint(&mut self, entity_id: &str) -> usize {
        let ids = &mut self.ids;
        let before = self.links.len();
        self.links.retain(|l| {
            let keep = !l.touches(entity_id);
            if !keep {
                ids.remove(&l.id);
            }
            keep
        });
        before - self.links.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.links.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}
