//! Snapshot storage implementation.

use crate::{Snapshot, SnapshotError, SnapshotId, SnapshotResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use storyline_storage::Storage;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Default retention limit per version.
pub const DEFAULT_MAX_PER_VERSION: u32 = 50;

/// Retention limits offered to users.
pub const RETENTION_PRESETS: [u32; 4] = [25, 50, 100, 200];

/// Configuration for snapshot storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Maximum number of snapshots kept per version.
    pub max_per_version: u32,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            max_per_version: DEFAULT_MAX_PER_VERSION,
        }
    }
}

impl SnapshotConfig {
    /// Create a config with the given retention limit.
    pub fn with_max_per_version(max_per_version: u32) -> Self {
        Self { max_per_version }
    }

    /// Check the config is usable.
    ///
    /// At least two snapshots must be retained: the newest one and a
    /// protected (active) one may both be older than everything else.
    pub fn validate(&self) -> SnapshotResult<()> {
        if self.max_per_version < 2 {
            return Err(SnapshotError::InvalidConfig(format!(
                "max_per_version must be at least 2 (got {})",
                self.max_per_version
            )));
        }
        Ok(())
    }
}

/// Per-version history, oldest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SnapshotManifest {
    next_seq: u64,
    entries: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ManifestEntry {
    id: SnapshotId,
    seq: u64,
    created_at: DateTime<Utc>,
}

/// Storage for version snapshots.
///
/// Layout in the underlying key-value storage:
/// ```text
/// snapshot/<snapshot_id>            # Snapshot (metadata + content)
/// snapshot_manifest/<version_id>    # Ordered history of a version
/// ```
///
/// The manifest is the source of truth for listing. Bodies are written
/// before the manifest references them and removed only after the manifest
/// has dropped them, so a listed snapshot can always be read.
pub struct SnapshotStore<S: Storage> {
    storage: Arc<S>,
    config: SnapshotConfig,
    /// Serializes manifest read-modify-write cycles.
    write_lock: Mutex<()>,
}

impl<S: Storage> SnapshotStore<S> {
    /// Create a new snapshot store.
    pub fn new(storage: Arc<S>, config: SnapshotConfig) -> SnapshotResult<Self> {
        config.validate()?;
        Ok(Self {
            storage,
            config,
            write_lock: Mutex::new(()),
        })
    }

    /// Active configuration.
    pub fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    /// Append a snapshot to a version's history.
    ///
    /// After insertion, the oldest snapshots are pruned until the history is
    /// back at `max_per_version`. Neither `protect` nor the new snapshot is
    /// ever pruned. Pruning is not reported to the caller.
    pub async fn create(
        &self,
        version_id: &str,
        content: String,
        label: Option<String>,
        protect: Option<&SnapshotId>,
    ) -> SnapshotResult<Snapshot> {
        let _guard = self.write_lock.lock().await;

        let mut manifest = self.manifest(version_id).await?;
        manifest.next_seq = manifest
            .next_seq
            .max(manifest.entries.last().map_or(0, |e| e.seq))
            + 1;

        let mut snapshot = Snapshot::new(version_id, manifest.next_seq, content);
        if let Some(label) = label {
            snapshot = snapshot.with_label(label);
        }

        self.storage
            .write(&["snapshot", snapshot.id.as_str()], &snapshot)
            .await?;

        manifest.entries.push(ManifestEntry {
            id: snapshot.id.clone(),
            seq: snapshot.seq,
            created_at: snapshot.created_at,
        });

        let pruned = self.select_pruned(&mut manifest, &snapshot.id, protect);
        self.storage
            .write(&["snapshot_manifest", version_id], &manifest)
            .await?;

        for id in &pruned {
            self.storage.remove(&["snapshot", id.as_str()]).await?;
            debug!(version_id = %version_id, snapshot_id = %id, "Pruned snapshot");
        }

        info!(
            version_id = %version_id,
            snapshot_id = %snapshot.id,
            seq = snapshot.seq,
            bytes = snapshot.size_bytes(),
            pruned = pruned.len(),
            "Created snapshot"
        );

        Ok(snapshot)
    }

    /// Remove entries past the retention limit, oldest first.
    fn select_pruned(
        &self,
        manifest: &mut SnapshotManifest,
        newest: &SnapshotId,
        protect: Option<&SnapshotId>,
    ) -> Vec<SnapshotId> {
        let limit = self.config.max_per_version as usize;
        let mut pruned = Vec::new();

        while manifest.entries.len() > limit {
            let candidate = manifest
                .entries
                .iter()
                .position(|e| &e.id != newest && Some(&e.id) != protect);
            match candidate {
                Some(idx) => pruned.push(manifest.entries.remove(idx).id),
                None => {
                    warn!("No prunable snapshot found; retention limit exceeded");
                    break;
                }
            }
        }

        pruned
    }

    /// List a version's snapshots, newest first.
    pub async fn list(&self, version_id: &str) -> SnapshotResult<Vec<Snapshot>> {
        let manifest = self.manifest(version_id).await?;
        let mut snapshots = Vec::with_capacity(manifest.entries.len());

        for entry in manifest.entries.iter().rev() {
            match self
                .storage
                .read::<Snapshot>(&["snapshot", entry.id.as_str()])
                .await?
            {
                Some(snapshot) => snapshots.push(snapshot),
                None => warn!(snapshot_id = %entry.id, "Snapshot listed but missing"),
            }
        }

        Ok(snapshots)
    }

    /// Get a snapshot by ID.
    pub async fn get(&self, snapshot_id: &SnapshotId) -> SnapshotResult<Snapshot> {
        self.storage
            .read(&["snapshot", snapshot_id.as_str()])
            .await?
            .ok_or_else(|| SnapshotError::not_found(snapshot_id.as_str()))
    }

    /// Newest snapshot of a version, if any.
    pub async fn latest(&self, version_id: &str) -> SnapshotResult<Option<Snapshot>> {
        let manifest = self.manifest(version_id).await?;
        match manifest.entries.last() {
            Some(entry) => Ok(Some(self.get(&entry.id).await?)),
            None => Ok(None),
        }
    }

    /// Number of snapshots currently retained for a version.
    pub async fn count(&self, version_id: &str) -> SnapshotResult<usize> {
        Ok(self.manifest(version_id).await?.entries.len())
    }

    /// Remove a version's entire history. Returns how many snapshots were removed.
    pub async fn delete_version(&self, version_id: &str) -> SnapshotResult<usize> {
        let _guard = self.write_lock.lock().await;

        let manifest = self.manifest(version_id).await?;
        self.storage.remove(&["snapshot_manifest", version_id]).await?;
        for entry in &manifest.entries {
            self.storage.remove(&["snapshot", entry.id.as_str()]).await?;
        }

        info!(
            version_id = %version_id,
            removed = manifest.entries.len(),
            "Deleted version history"
        );

        Ok(manifest.entries.len())
    }

    async fn manifest(&self, version_id: &str) -> SnapshotResult<SnapshotManifest> {
        Ok(self
            .storage
            .read(&["snapshot_manifest", version_id])
            .await?
            .unwrap_or_default())
    }
}
