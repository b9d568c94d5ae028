// Point-in-time snapshots of the whole graph
use anyhow::{anyhow, Result};
use atomicwrites::{AtomicFile, OverwriteBehavior};
use cerebrosphere_core::{Entity, GraphStore, Link};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct SnapshotData {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    /// Creation order, private entities included
    pub entities: Vec<Entity>,
    pub links: Vec<Link>,
}

impl SnapshotData {
    pub fn capture(graph: &GraphStore) -> Self {
        let (entities, links) = graph.dump();
        Self {
            version: SNAPSHOT_VERSION,
            saved_at: Utc::now(),
            entities,
            links,
        }
    }

    /// Load the records into `graph`, preserving their order.
    pub fn restore_into(self, graph: &GraphStore) -> cerebrosphere_core::Result<()> {
        for entity in self.entities {
            graph.insert_entity(entity)?;
        }
        for link in self.links {
            graph.insert_link(link)?;
        }
        Ok(())
    }
}

/// bincode snapshot file, replaced atomically on every save
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            path: data_dir.as_ref().join("graph.snapshot"),
        }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, snapshot: &SnapshotData) -> Result<()> {
        let data = bincode::serialize(snapshot)
            .map_err(|e| anyhow!("Serialization error: {}", e))?;

        AtomicFile::new(&self.path, OverwriteBehavior::AllowOverwrite)
            .write(|f| f.write_all(&data))
            .map_err(|e| anyhow!("Snapshot write error: {}", e))?;
        Ok(())
    }

    /// Load snapshot from disk (on startup)
    pub fn load(&self) -> Result<Option<SnapshotData>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let data = std::fs::read(&self.path)?;
        let snapshot: SnapshotData = bincode::deserialize(&data)
            .map_err(|e| anyhow!("Deserialization error: {}", e))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(anyhow!(
                "Unsupported snapshot version {} (expected {})",
                snapshot.version,
                SNAPSHOT_VERSION
            ));
        }
        Ok(Some(snapshot))
    }
}
