//! # Cerebrosphere Core
//!
//! Core library for the Cerebrosphere graph store.
//!
//! This crate provides the data model and its query/mutation semantics:
//!
//! - [`PropertyMap`] - Ordered, schema-less string properties
//! - [`Entity`] / [`EntityStore`] - Typed records with visibility filtering
//! - [`Link`] / [`LinkStore`] - Undirected labelled relations between entity ids
//! - [`GraphStore`] - Both stores behind one lock, plus neighbor traversal
//! - [`EntityFilter`] - Type and property predicates for listing
//!
//! ## Example
//!
//! ```rust
//! use cerebrosphere_core::{GraphStore, NewEntity, NewLink};
//!
//! let graph = GraphStore::new();
//! let ada = graph
//!     .create_entity(NewEntity::new("Person").with_property("name", "Ada"))
//!     .unwrap();
//! let charles = graph.create_entity(NewEntity::new("Person")).unwrap();
//! graph.create_link(NewLink::new(ada.id.clone(), charles.id.clone()));
//!
//! let neighbors = graph.neighbors_of(&charles.id, false);
//! assert_eq!(neighbors[0].id, ada.id);
//! ```

pub mod entity;
pub mod error;
pub mod filter;
pub mod graph;
pub mod link;
pub mod property;

pub use entity::{Entity, EntityId, EntityShape, EntityStore, NewEntity};
pub use error::{Error, ErrorKind, Result};
pub use filter::{EntityFilter, Filter, FilterCondition};
pub use graph::{DeleteOutcome, GraphStore};
pub use link::{Link, LinkId, LinkStore, NewLink, DEFAULT_LINK_TYPE};
pub use property::PropertyMap;
