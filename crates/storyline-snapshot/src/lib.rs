//! Snapshot store for storyline.
//!
//! A snapshot is an immutable capture of one version's content. Snapshots
//! are appended to a per-version history and pruned oldest-first once the
//! history grows past the configured retention limit.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use storyline_snapshot::{SnapshotConfig, SnapshotStore};
//! use storyline_storage::MemoryStorage;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = SnapshotStore::new(Arc::new(MemoryStorage::new()), SnapshotConfig::default())?;
//!
//! let first = store.create("ver_1", "Once upon a time".to_string(), None, None).await?;
//! let history = store.list("ver_1").await?;
//! assert_eq!(history[0].id, first.id);
//! # Ok(())
//! # }
//! ```

mod diff;
mod error;
mod snapshot;
mod store;

pub use diff::unified_diff;
pub use error::{SnapshotError, SnapshotResult};
pub use snapshot::{Snapshot, SnapshotId};
pub use store::{SnapshotConfig, SnapshotStore, DEFAULT_MAX_PER_VERSION, RETENTION_PRESETS};
