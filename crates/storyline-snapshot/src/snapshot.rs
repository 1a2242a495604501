//! Snapshot data structures.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storyline_util::Identifier;

/// Unique identifier for a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(pub String);

impl SnapshotId {
    /// Create a new snapshot ID.
    pub fn new() -> Self {
        Self(Identifier::snapshot())
    }

    /// Create a snapshot ID from a string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the ID as a string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SnapshotId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SnapshotId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// An immutable capture of a version's content at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Unique identifier for this snapshot.
    pub id: SnapshotId,

    /// Version this snapshot belongs to.
    pub version_id: String,

    /// Position in the version's history; strictly increasing.
    pub seq: u64,

    /// Opaque serialized document.
    pub content: String,

    /// When the snapshot was taken.
    pub created_at: DateTime<Utc>,

    /// Why the snapshot was taken (e.g. a merge), if recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl Snapshot {
    /// Create a new snapshot.
    pub fn new(version_id: impl Into<String>, seq: u64, content: impl Into<String>) -> Self {
        Self {
            id: SnapshotId::new(),
            version_id: version_id.into(),
            seq,
            content: content.into(),
            created_at: Utc::now(),
            label: None,
        }
    }

    /// Set the label for this snapshot.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Size of the content payload in bytes.
    pub fn size_bytes(&self) -> usize {
        self.content.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let snapshot = Snapshot::new("ver_1", 3, "{}").with_label("merge");
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["versionId"], "ver_1");
        assert_eq!(json["seq"], 3);
        assert_eq!(json["label"], "merge");
        assert!(json["id"].as_str().unwrap().starts_with("snp_"));
    }

    #[test]
    fn test_unlabelled_snapshot_omits_label() {
        let snapshot = Snapshot::new("ver_1", 1, "text");
        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json.get("label").is_none());
        assert_eq!(snapshot.size_bytes(), 4);
    }
}
