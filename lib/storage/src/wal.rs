use anyhow::Result;
use cerebrosphere_core::{Entity, Error as CoreError, GraphStore, Link};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

/// One acknowledged change to the graph.
///
/// Records carry the generated identifiers so that replay reproduces the
/// exact same records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Mutation {
    CreateEntity { entity: Entity },
    PatchEntity { id: String, updates: Vec<(String, String)> },
    DeleteEntity { id: String },
    CreateLink { link: Link },
}

impl Mutation {
    /// Re-apply a logged mutation during recovery.
    ///
    /// Records already reflected in the graph (present on create, absent on
    /// delete) are skipped.
    pub fn replay(self, graph: &GraphStore) -> cerebrosphere_core::Result<()> {
        let result = match self {
            Mutation::CreateEntity { entity } => graph.insert_entity(entity),
            Mutation::PatchEntity { id, updates } => graph.patch_entity(&id, &updates).map(|_| ()),
            Mutation::DeleteEntity { id } => graph.delete_entity(&id).map(|_| ()),
            Mutation::CreateLink { link } => graph.insert_link(link),
        };
        match result {
            Err(CoreError::Conflict(_)) | Err(CoreError::NotFound(_)) => Ok(()),
            other => other,
        }
    }
}

/// Write-Ahead Log for durability
/// Append-only JSON lines, truncated after each snapshot
pub struct WriteAheadLog {
    file: Arc<Mutex<File>>,
    path: PathBuf,
}

impl WriteAheadLog {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let torn_tail = Self::ends_mid_record(&path)?;
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        if torn_tail {
            // Terminate a torn record so the next append starts on its own line
            file.write_all(b"\n")?;
        }

        Ok(Self {
            file: Arc::new(Mutex::new(file)),
            path,
        })
    }

    fn ends_mid_record(path: &Path) -> Result<bool> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_file() && meta.len() > 0 => {
                let mut file = File::open(path)?;
                file.seek(SeekFrom::End(-1))?;
                let mut last = [0u8; 1];
                file.read_exact(&mut last)?;
                Ok(last[0] != b'\n')
            }
            _ => Ok(false),
        }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a record to the WAL
    pub fn append(&self, mutation: &Mutation) -> Result<()> {
        self.append_with(mutation, false)
    }

    /// Append a record, fsyncing it before returning when `sync` is set.
    ///
    /// On failure whatever part of the record reached the file is cut off
    /// again, so a rejected record never resurfaces on replay.
    pub fn append_with(&self, mutation: &Mutation, sync: bool) -> Result<()> {
        let mut line = serde_json::to_vec(mutation)?;
        line.push(b'\n');

        let mut file = self.file.lock();
        let start = file.metadata()?.len();
        let mut written = file.write_all(&line);
        if sync && written.is_ok() {
            written = file.sync_data();
        }
        if let Err(e) = written {
            if let Err(trunc) = file.set_len(start) {
                warn!(error = %trunc, "failed to cut partial WAL record");
            }
            return Err(e.into());
        }
        Ok(())
    }

    /// Sync WAL to disk
    /// Uses sync_data() which is equivalent to fdatasync on Unix
    #[inline]
    pub fn sync(&self) -> Result<()> {
        self.file.lock().sync_data()?;
        Ok(())
    }

    /// Discard every record; called once a snapshot covers them.
    pub fn truncate(&self) -> Result<()> {
        let file = self.file.lock();
        file.set_len(0)?;
        file.sync_all()?;
        Ok(())
    }

    /// Read every decodable record from `path`, in append order.
    ///
    /// Lines that fail to decode, typically a torn final write, are skipped.
    /// That includes lines cut inside a multi-byte character.
    pub fn read_all<P: AsRef<Path>>(path: P) -> Result<Vec<Mutation>> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(path)?);
        let mut records = Vec::new();
        for (line_no, line) in reader.split(b'\n').enumerate() {
            let line = line?;
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match serde_json::from_slice::<Mutation>(&line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(line = line_no + 1, error = %e, "skipping corrupt WAL record"),
            }
        }
        Ok(records)
    }
}
