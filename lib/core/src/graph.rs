use crate::{Entity, EntityStore, Filter, Link, LinkStore, NewEntity, NewLink, Result};
use parking_lot::RwLock;
use tracing::debug;

/// Result of a cascading entity delete
#[derive(Debug, Clone)]
pub struct DeleteOutcome {
    pub entity: Entity,
    pub links_removed: usize,
}

/// Entity and link stores behind a single lock.
///
/// Every public operation takes the lock exactly once, so a composite write
/// (create with properties, patch, delete with link cascade) is observed by
/// readers either entirely or not at all. Validation runs before any record
/// is touched, so a failed operation leaves nothing behind.
#[derive(Debug, Default)]
pub struct GraphStore {
    state: RwLock<GraphState>,
}

#[derive(Debug, Default)]
struct GraphState {
    entities: EntityStore,
    links: LinkStore,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` against both stores under a shared guard.
    pub fn read<R>(&self, f: impl FnOnce(&EntityStore, &LinkStore) -> R) -> R {
        let state = self.state.read();
        f(&state.entities, &state.links)
    }

    /// Run `f` against both stores under the exclusive guard.
    pub fn write<R>(&self, f: impl FnOnce(&mut EntityStore, &mut LinkStore) -> R) -> R {
        let mut guard = self.state.write();
        let state = &mut *guard;
        f(&mut state.entities, &mut state.links)
    }

    pub fn create_entity(&self, input: NewEntity) -> Result<Entity> {
        let entity = self.write(|entities, _| entities.create(input))?;
        debug!(entity_id = %entity.id, entity_type = %entity.entity_type, "entity created");
        Ok(entity)
    }

    pub fn insert_entity(&self, entity: Entity) -> Result<()> {
        self.write(|entities, _| entities.insert(entity))
    }

    pub fn get_entity(&self, id: &str, include_private: bool) -> Result<Entity> {
        self.read(|entities, _| entities.get(id, include_private).cloned())
    }

    /// Existence check that ignores the privacy flag.
    pub fn contains_entity(&self, id: &str) -> bool {
        self.read(|entities, _| entities.contains(id))
    }

    pub fn list_entities(&self, include_private: bool) -> Vec<Entity> {
        self.read(|entities, _| entities.list(include_private).cloned().collect())
    }

    pub fn filter_entities(&self, include_private: bool, filter: &dyn Filter) -> Vec<Entity> {
        self.read(|entities, _| {
            entities
                .list(include_private)
                .filter(|e| filter.matches(e))
                .cloned()
                .collect()
        })
    }

    pub fn patch_entity(&self, id: &str, updates: &[(String, String)]) -> Result<Entity> {
        let entity = self.write(|entities, _| entities.patch(id, updates).cloned())?;
        debug!(entity_id = %id, keys = updates.len(), "entity patched");
        Ok(entity)
    }

    /// Remove an entity, its properties and every link touching it.
    pub fn delete_entity(&self, id: &str) -> Result<DeleteOutcome> {
        let outcome = self.write(|entities, links| {
            let entity = entities.remove(id)?;
            let links_removed = links.delete_by_endpoint(id);
            Ok::<_, crate::Error>(DeleteOutcome {
                entity,
                links_removed,
            })
        })?;
        debug!(entity_id = %id, links_removed = outcome.links_removed, "entity deleted");
        Ok(outcome)
    }

    pub fn create_link(&self, input: NewLink) -> Link {
        let link = self.write(|_, links| links.create(input));
        debug!(link_id = %link.id, entity_a = %link.entity_a, entity_b = %link.entity_b, "link created");
        link
    }

    pub fn insert_link(&self, link: Link) -> Result<()> {
        self.write(|_, links| links.insert(link))
    }

    pub fn list_links(&self) -> Vec<Link> {
        self.read(|_, links| links.list().to_vec())
    }

    pub fn links_of(&self, entity_id: &str) -> Vec<Link> {
        self.read(|_, links| links.find_by_endpoint(entity_id).cloned().collect())
    }

    /// Entities on the far side of every link touching `entity_id`.
    ///
    /// Duplicates are kept when several links join the same pair. Endpoints
    /// that are dangling or hidden by the privacy filter are dropped.
    pub fn neighbors_of(&self, entity_id: &str, include_private: bool) -> Vec<Entity> {
        self.neighbors_by_type(entity_id, include_private, None)
    }

    /// Like [`neighbors_of`](Self::neighbors_of), restricted to links of `link_type` when given.
    pub fn neighbors_by_type(
        &self,
        entity_id: &str,
        include_private: bool,
        link_type: Option<&str>,
    ) -> Vec<Entity> {
        self.read(|entities, links| {
            links
                .find_by_endpoint(entity_id)
                .filter(|l| link_type.map_or(true, |t| l.link_type == t))
                .filter_map(|l| l.other_endpoint(entity_id))
                .filter_map(|other| entities.get(other, include_private).ok())
                .cloned()
                .collect()
        })
    }

    pub fn entity_count(&self) -> usize {
        self.read(|entities, _| entities.len())
    }

    pub fn link_count(&self) -> usize {
        self.read(|_, links| links.len())
    }

    /// Consistent copy of every record, private entities included, in creation order.
    pub fn dump(&self) -> (Vec<Entity>, Vec<Link>) {
        self.read(|entities, links| {
            (entities.list(true).cloned().collect(), links.list().to_vec())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EntityFilter, Error};

    fn person(store: &GraphStore, name: &str) -> Entity {
        store
            .create_entity(NewEntity::new("Person").with_property("name", name))
            .unwrap()
    }

    #[test]
    fn test_create_get_round_trip() {
        let store = GraphStore::new();
        let created = store
            .create_entity(
                NewEntity::new("Person")
                    .with_property("name", "Ada")
                    .with_property("field", "maths"),
            )
            .unwrap();

        let fetched = store.get_entity(&created.id, false).unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.properties.get("field"), Some("maths"));
    }

    #[test]
    fn test_create_is_not_idempotent() {
        let store = GraphStore::new();
        let a = person(&store, "Ada");
        let b = person(&store, "Ada");
        assert_ne!(a.id, b.id);
        assert_eq!(store.entity_count(), 2);
    }

    #[test]
    fn test_failed_create_leaves_nothing() {
        let store = GraphStore::new();
        let err = store
            .create_entity(NewEntity::new("Person").with_property("id", "spoof"))
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(store.entity_count(), 0);
    }

    #[test]
    fn test_patch_idempotent_and_preserves_other_keys() {
        let store = GraphStore::new();
        let e = person(&store, "Ada");
        let updates = vec![("born".to_string(), "1815".to_string())];

        let once = store.patch_entity(&e.id, &updates).unwrap();
        let twice = store.patch_entity(&e.id, &updates).unwrap();
        assert_eq!(once, twice);
        assert_eq!(twice.properties.get("name"), Some("Ada"));
        assert!(matches!(
            store.patch_entity("missing", &updates),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_delete_cascades_links() {
        let store = GraphStore::new();
        let a = person(&store, "Ada");
        let b = person(&store, "Babbage");
        let c = person(&store, "Byron");
        store.create_link(NewLink::new(a.id.clone(), b.id.clone()));
        store.create_link(NewLink::new(c.id.clone(), a.id.clone()));
        store.create_link(NewLink::new(b.id.clone(), c.id.clone()));

        let outcome = store.delete_entity(&a.id).unwrap();
        assert_eq!(outcome.links_removed, 2);
        assert!(store.links_of(&a.id).is_empty());
        assert_eq!(store.links_of(&b.id).len(), 1);
        assert!(matches!(store.get_entity(&a.id, true), Err(Error::NotFound(_))));

        // Second delete fails rather than silently succeeding
        assert!(matches!(store.delete_entity(&a.id), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_neighbors_symmetric() {
        let store = GraphStore::new();
        let a = person(&store, "Ada");
        let b = person(&store, "Babbage");
        store.create_link(NewLink::new(a.id.clone(), b.id.clone()));

        let from_a: Vec<String> = store.neighbors_of(&a.id, false).into_iter().map(|e| e.id).collect();
        let from_b: Vec<String> = store.neighbors_of(&b.id, false).into_iter().map(|e| e.id).collect();
        assert_eq!(from_a, vec![b.id.clone()]);
        assert_eq!(from_b, vec![a.id.clone()]);
    }

    #[test]
    fn test_neighbors_drop_dangling_and_private_keep_duplicates() {
        let store = GraphStore::new();
        let a = person(&store, "Ada");
        let b = person(&store, "Babbage");
        let hidden = store
            .create_entity(NewEntity::new("Diary").private(true))
            .unwrap();

        store.create_link(NewLink::new(a.id.clone(), b.id.clone()));
        store.create_link(NewLink::new(b.id.clone(), a.id.clone()).with_type("corresponds_with"));
        store.create_link(NewLink::new(a.id.clone(), "ghost"));
        store.create_link(NewLink::new(a.id.clone(), hidden.id.clone()));

        let visible = store.neighbors_of(&a.id, false);
        assert_eq!(visible.len(), 2);
        assert!(visible.iter().all(|e| e.id == b.id));

        assert_eq!(store.neighbors_of(&a.id, true).len(), 3);
        assert_eq!(store.neighbors_by_type(&a.id, false, Some("corresponds_with")).len(), 1);
        assert!(store.neighbors_of("nobody", true).is_empty());
    }

    #[test]
    fn test_links_allow_dangling_endpoints() {
        let store = GraphStore::new();
        let link = store.create_link(NewLink::new("x", "y"));
        assert_eq!(store.list_links(), vec![link]);
    }

    #[test]
    fn test_filter_entities() {
        let store = GraphStore::new();
        person(&store, "Ada");
        person(&store, "Babbage");
        store
            .create_entity(NewEntity::new("Place").with_property("name", "London"))
            .unwrap();

        let filter = EntityFilter::from_pairs(vec![("type", "Person")]).unwrap();
        assert_eq!(store.filter_entities(false, &filter).len(), 2);

        let filter = EntityFilter::from_pairs(vec![("name", "London")]).unwrap();
        let found = store.filter_entities(false, &filter);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].entity_type, "Place");
    }
}
