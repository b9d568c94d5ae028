pub mod manager;
pub mod snapshot;
pub mod wal;

pub use manager::{StorageManager, StorageOptions};
pub use snapshot::{SnapshotData, SnapshotStore};
pub use wal::{Mutation, WriteAheadLog};
