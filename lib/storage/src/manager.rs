use crate::snapshot::{SnapshotData, SnapshotStore};
use crate::wal::{Mutation, WriteAheadLog};
use cerebrosphere_core::property::validate_key;
use cerebrosphere_core::{
    DeleteOutcome, Entity, Error, Filter, GraphStore, Link, NewEntity, NewLink, Result,
};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct StorageOptions {
    /// Interval between background snapshots; `None` disables them
    pub save_interval: Option<Duration>,
    /// fsync the WAL after every mutation
    pub sync_wal: bool,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            save_interval: Some(Duration::from_secs(300)),
            sync_wal: false,
        }
    }
}

/// Shared state between the manager and its background save thread.
struct Durable {
    graph: Arc<GraphStore>,
    wal: WriteAheadLog,
    snapshots: SnapshotStore,
    /// Serializes writers so WAL order equals apply order, and keeps
    /// checkpoints from interleaving with a write.
    commit_lock: Mutex<()>,
    sync_wal: bool,
    last_save: AtomicI64,
}

impl Durable {
    /// Run one write as a commit: `prepare` validates against the current
    /// graph and builds the change, the change is logged, and only then is
    /// it applied. A failed append leaves the graph untouched.
    fn commit<P, T>(
        &self,
        prepare: impl FnOnce(&GraphStore) -> Result<P>,
        record: impl FnOnce(&P) -> Mutation,
        apply: impl FnOnce(&GraphStore, P) -> Result<T>,
    ) -> Result<T> {
        let _commit = self.commit_lock.lock();
        let prepared = prepare(&*self.graph)?;
        self.wal
            .append_with(&record(&prepared), self.sync_wal)
            .map_err(|e| Error::Storage(e.to_string()))?;
        apply(&*self.graph, prepared)
    }

    fn checkpoint(&self) -> Result<()> {
        let _commit = self.commit_lock.lock();
        let snapshot = SnapshotData::capture(&self.graph);
        let (entities, links) = (snapshot.entities.len(), snapshot.links.len());
        let saved_at = snapshot.saved_at.timestamp();

        self.snapshots
            .save(&snapshot)
            .map_err(|e| Error::Persistence(e.to_string()))?;
        self.wal
            .truncate()
            .map_err(|e| Error::Persistence(e.to_string()))?;

        self.last_save.store(saved_at, Ordering::Release);
        info!(entities, links, path = ?self.snapshots.path(), "snapshot saved");
        Ok(())
    }
}

/// Owns the graph and its persistence.
///
/// This is the storage handle passed to every request. Reads go straight to
/// the in-memory graph, writes are applied and then appended to the WAL.
pub struct StorageManager {
    durable: Arc<Durable>,
    data_dir: PathBuf,
    shutdown: Arc<AtomicBool>,
}

impl StorageManager {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        Self::with_options(data_dir, StorageOptions::default())
    }

    pub fn with_options<P: AsRef<Path>>(data_dir: P, options: StorageOptions) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir)?;

        let graph = Arc::new(GraphStore::new());
        let snapshots = SnapshotStore::new(&data_dir);

        if let Some(snapshot) = snapshots
            .load()
            .map_err(|e| Error::Persistence(e.to_string()))?
        {
            info!(saved_at = %snapshot.saved_at, "Loading snapshot from disk...");
            snapshot.restore_into(&graph)?;
        }

        let wal_path = data_dir.join("wal.log");
        let records = WriteAheadLog::read_all(&wal_path)
            .map_err(|e| Error::Persistence(e.to_string()))?;
        let replayed = records.len();
        for record in records {
            if let Err(e) = record.replay(&graph) {
                warn!(error = %e, "failed to replay WAL record");
            }
        }

        info!(
            entities = graph.entity_count(),
            links = graph.link_count(),
            wal_records = replayed,
            "storage recovered"
        );

        let wal = WriteAheadLog::new(&wal_path).map_err(|e| Error::Storage(e.to_string()))?;

        let durable = Arc::new(Durable {
            graph,
            wal,
            snapshots,
            commit_lock: Mutex::new(()),
            sync_wal: options.sync_wal,
            last_save: AtomicI64::new(0),
        });

        let manager = Self {
            durable,
            data_dir,
            shutdown: Arc::new(AtomicBool::new(false)),
        };

        if let Some(interval) = options.save_interval {
            manager.start_background_save(interval);
        }

        Ok(manager)
    }

    /// Start background save thread
    fn start_background_save(&self, interval: Duration) {
        let durable = self.durable.clone();
        let shutdown = self.shutdown.clone();

        std::thread::spawn(move || loop {
            std::thread::sleep(interval);
            if shutdown.load(Ordering::Acquire) {
                debug!("background save thread exiting");
                break;
            }
            if let Err(e) = durable.checkpoint() {
                error!(error = %e, "Background save error");
            }
        });
    }

    /// Read access to the in-memory graph.
    #[inline]
    pub fn graph(&self) -> &GraphStore {
        &self.durable.graph
    }

    #[inline]
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn create_entity(&self, input: NewEntity) -> Result<Entity> {
        self.durable.commit(
            |_| input.build(),
            |entity| Mutation::CreateEntity {
                entity: entity.clone(),
            },
            |graph, entity| {
                graph.insert_entity(entity.clone())?;
                debug!(entity_id = %entity.id, entity_type = %entity.entity_type, "entity created");
                Ok(entity)
            },
        )
    }

    pub fn get_entity(&self, id: &str, include_private: bool) -> Result<Entity> {
        self.graph().get_entity(id, include_private)
    }

    pub fn list_entities(&self, include_private: bool) -> Vec<Entity> {
        self.graph().list_entities(include_private)
    }

    pub fn filter_entities(&self, include_private: bool, filter: &dyn Filter) -> Vec<Entity> {
        self.graph().filter_entities(include_private, filter)
    }

    pub fn patch_entity(&self, id: &str, updates: Vec<(String, String)>) -> Result<Entity> {
        self.durable.commit(
            |graph| {
                for (key, _) in &updates {
                    validate_key(key)?;
                }
                Self::require_entity(graph, id)
            },
            |_| Mutation::PatchEntity {
                id: id.to_string(),
                updates: updates.clone(),
            },
            |graph, ()| graph.patch_entity(id, &updates),
        )
    }

    pub fn delete_entity(&self, id: &str) -> Result<DeleteOutcome> {
        self.durable.commit(
            |graph| Self::require_entity(graph, id),
            |_| Mutation::DeleteEntity { id: id.to_string() },
            |graph, ()| graph.delete_entity(id),
        )
    }

    /// Writers are serialized by the commit lock, so an entity seen here
    /// is still present when the change is applied.
    fn require_entity(graph: &GraphStore, id: &str) -> Result<()> {
        if graph.contains_entity(id) {
            Ok(())
        } else {
            Err(Error::entity_not_found())
        }
    }

    pub fn neighbors_of(
        &self,
        id: &str,
        include_private: bool,
        link_type: Option<&str>,
    ) -> Vec<Entity> {
        self.graph().neighbors_by_type(id, include_private, link_type)
    }

    pub fn create_link(&self, input: NewLink) -> Result<Link> {
        self.durable.commit(
            |_| Ok(input.into_link()),
            |link| Mutation::CreateLink { link: link.clone() },
            |graph, link| {
                graph.insert_link(link.clone())?;
                debug!(link_id = %link.id, entity_a = %link.entity_a, entity_b = %link.entity_b, "link created");
                Ok(link)
            },
        )
    }

    pub fn list_links(&self) -> Vec<Link> {
        self.graph().list_links()
    }

    /// Force save: write a snapshot and truncate the WAL
    pub fn save(&self) -> Result<()> {
        self.durable.checkpoint()
    }

    /// Unix seconds of the last successful snapshot, 0 if none this run
    pub fn last_save_time(&self) -> i64 {
        self.durable.last_save.load(Ordering::Acquire)
    }
}

impl Drop for StorageManager {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
    }
}
