//! # Cerebrosphere
//!
//! A schema-flexible graph store exposed over HTTP.
//!
//! Cerebrosphere persists typed *entities* carrying free-form string
//! properties, and undirected *links* between pairs of entity identifiers.
//! Entities can be created, read, listed, filtered, patched and deleted;
//! deleting an entity cascades to every link that touches it.
//!
//! ## Quick Start
//!
//! ### As a Server
//!
//! ```bash
//! cerebrosphere --data-dir ./data --http-port 5000
//! ```
//!
//! ### As a Library
//!
//! ```rust,no_run
//! use cerebrosphere::prelude::*;
//!
//! let storage = StorageManager::new("./data").unwrap();
//!
//! let ada = storage
//!     .create_entity(NewEntity::new("Person").with_property("name", "Ada"))
//!     .unwrap();
//! let london = storage.create_entity(NewEntity::new("City")).unwrap();
//! storage
//!     .create_link(NewLink::new(ada.id.clone(), london.id.clone()).with_type("lives_in"))
//!     .unwrap();
//!
//! let neighbors = storage.neighbors_of(&london.id, false, None);
//! assert_eq!(neighbors[0].properties.get("name"), Some("Ada"));
//! ```
//!
//! ## Crate Structure
//!
//! - `cerebrosphere-core` - Entities, property maps, links, filters, traversal
//! - `cerebrosphere-storage` - Persistence layer (WAL, snapshots, recovery)
//! - `cerebrosphere-api` - REST API
//!
//! ## Entity Representation
//!
//! Entities are returned flattened by default, properties on the top level
//! next to `id`, `type` and `_private`. Pass `?shape=nested` to get them
//! under a `properties` object instead.

// Re-export core types
pub use cerebrosphere_core::{
    DeleteOutcome, Entity, EntityFilter, EntityShape, EntityStore, Error, ErrorKind, Filter,
    FilterCondition, GraphStore, Link, LinkStore, NewEntity, NewLink, PropertyMap, Result,
    DEFAULT_LINK_TYPE,
};

// Re-export storage
pub use cerebrosphere_storage::{StorageManager, StorageOptions};

// Re-export API
pub use cerebrosphere_api::RestApi;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        Entity, EntityFilter, EntityShape, Error, FilterCondition, GraphStore, Link, NewEntity,
        NewLink, RestApi, Result, StorageManager, StorageOptions,
    };
}
