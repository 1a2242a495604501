//! Persisted story records and their repository.
//!
//! A story owns one or more versions; each version owns an ordered history
//! of snapshots (kept by the snapshot store). The story record carries the
//! active pointers and the editor's unsaved draft.

use crate::error::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use storyline_snapshot::SnapshotId;
use storyline_storage::Storage;
use storyline_util::Identifier;
use tracing::debug;

/// Slug of the version every story is created with.
pub const ORIGINAL_SLUG: &str = "original";

/// Display name of the original version.
pub const ORIGINAL_NAME: &str = "Original";

/// A story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    /// Story ID (descending, newer sorts first).
    pub id: String,

    pub title: String,

    /// Words in the active content (draft if any, else active snapshot).
    pub word_count: u32,

    pub active_version_id: String,

    #[serde(default)]
    pub active_snapshot_id: Option<SnapshotId>,

    /// Unsaved working content pushed by the editor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub draft: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Story {
    pub(crate) fn new(title: impl Into<String>, active_version_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Identifier::story(),
            title: title.into(),
            word_count: 0,
            active_version_id: active_version_id.into(),
            active_snapshot_id: None,
            draft: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Update the last modified time.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// A named, independent line of content within a story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    pub id: String,
    pub story_id: String,

    /// Display name. Mutable, not unique.
    pub name: String,

    /// Unique within the story and never changed after creation.
    pub slug: String,

    /// Slug of the version this one was forked from.
    #[serde(default)]
    pub parent_slug: Option<String>,

    #[serde(default)]
    pub is_original: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Version {
    pub(crate) fn new(
        story_id: impl Into<String>,
        name: impl Into<String>,
        slug: impl Into<String>,
        parent_slug: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Identifier::version(),
            story_id: story_id.into(),
            name: name.into(),
            slug: slug.into(),
            parent_slug,
            is_original: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn original(story_id: impl Into<String>) -> Self {
        let mut version = Self::new(story_id, ORIGINAL_NAME, ORIGINAL_SLUG, None);
        version.is_original = true;
        version
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Common-ancestor content recorded for an ordered pair of versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeBase {
    pub content: String,
    pub recorded_at: DateTime<Utc>,
}

impl MergeBase {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            recorded_at: Utc::now(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct VersionOwner {
    story_id: String,
}

/// Repository for stories, versions and merge bases.
pub struct StoryRepository<S: Storage> {
    storage: Arc<S>,
}

impl<S: Storage> StoryRepository<S> {
    pub fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    // ========================================================================
    // Stories
    // ========================================================================

    pub async fn get_story(&self, story_id: &str) -> CoreResult<Story> {
        self.storage
            .read(&["story", story_id])
            .await?
            .ok_or_else(|| CoreError::not_found(format!("story {story_id}")))
    }

    pub async fn save_story(&self, story: &Story) -> CoreResult<()> {
        self.storage.write(&["story", &story.id], story).await?;
        debug!(story_id = %story.id, "Saved story");
        Ok(())
    }

    /// All stories, newest first.
    pub async fn list_stories(&self) -> CoreResult<Vec<Story>> {
        let mut stories: Vec<Story> = self.storage.read_all(&["story"]).await?;
        stories.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(stories)
    }

    // ========================================================================
    // Versions
    // ========================================================================

    /// Get a version of a specific story.
    pub async fn get_version(&self, story_id: &str, version_id: &str) -> CoreResult<Version> {
        self.storage
            .read(&["version", story_id, version_id])
            .await?
            .ok_or_else(|| CoreError::not_found(format!("version {version_id}")))
    }

    /// Get a version by ID alone, through the owner index.
    pub async fn find_version(&self, version_id: &str) -> CoreResult<Version> {
        let owner: VersionOwner = self
            .storage
            .read(&["version_owner", version_id])
            .await?
            .ok_or_else(|| CoreError::not_found(format!("version {version_id}")))?;
        self.get_version(&owner.story_id, version_id).await
    }

    /// Save a version and its owner index entry.
    pub async fn save_version(&self, version: &Version) -> CoreResult<()> {
        self.storage
            .write(&["version", &version.story_id, &version.id], version)
            .await?;
        let owner = VersionOwner {
            story_id: version.story_id.clone(),
        };
        self.storage
            .write(&["version_owner", &version.id], &owner)
            .await?;
        Ok(())
    }

    /// Remove a version record, its owner entry and every merge base that
    /// mentions it.
    pub async fn remove_version(&self, version: &Version) -> CoreResult<()> {
        for other in self.list_versions(&version.story_id).await? {
            self.storage
                .remove(&["merge_base", &other.id, &version.id])
                .await?;
        }
        for key in self.storage.list(&["merge_base", &version.id]).await? {
            let key: Vec<&str> = key.iter().map(String::as_str).collect();
            self.storage.remove(&key).await?;
        }
        self.storage
            .remove(&["version", &version.story_id, &version.id])
            .await?;
        self.storage.remove(&["version_owner", &version.id]).await?;
        Ok(())
    }

    /// Versions of a story in creation order, the original first.
    pub async fn list_versions(&self, story_id: &str) -> CoreResult<Vec<Version>> {
        let mut versions: Vec<Version> = self.storage.read_all(&["version", story_id]).await?;
        versions.sort_by(|a, b| {
            b.is_original
                .cmp(&a.is_original)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        Ok(versions)
    }

    /// Find a version by slug.
    pub async fn version_by_slug(&self, story_id: &str, slug: &str) -> CoreResult<Version> {
        self.list_versions(story_id)
            .await?
            .into_iter()
            .find(|v| v.slug == slug)
            .ok_or_else(|| CoreError::not_found(format!("variation {slug}")))
    }

    // ========================================================================
    // Merge bases
    // ========================================================================

    pub async fn merge_base(&self, into_id: &str, from_id: &str) -> CoreResult<Option<MergeBase>> {
        Ok(self.storage.read(&["merge_base", into_id, from_id]).await?)
    }

    pub async fn record_merge_base(
        &self,
        into_id: &str,
        from_id: &str,
        content: &str,
    ) -> CoreResult<()> {
        self.storage
            .write(&["merge_base", into_id, from_id], &MergeBase::new(content))
            .await?;
        debug!(into = %into_id, from = %from_id, "Recorded merge base");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyline_storage::MemoryStorage;

    fn repo() -> StoryRepository<MemoryStorage> {
        StoryRepository::new(Arc::new(MemoryStorage::new()))
    }

    #[tokio::test]
    async fn test_story_crud() {
        let repo = repo();
        let story = Story::new("Harbor Lights", "ver_x");
        repo.save_story(&story).await.unwrap();

        let read = repo.get_story(&story.id).await.unwrap();
        assert_eq!(read, story);

        let missing = repo.get_story("sty_missing").await;
        assert!(matches!(missing, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_find_version_through_owner_index() {
        let repo = repo();
        let version = Version::original("sty_1");
        repo.save_version(&version).await.unwrap();

        let found = repo.find_version(&version.id).await.unwrap();
        assert_eq!(found.story_id, "sty_1");
        assert!(found.is_original);
        assert_eq!(found.slug, ORIGINAL_SLUG);
    }

    #[tokio::test]
    async fn test_list_versions_original_first() {
        let repo = repo();
        let draft = Version::new("sty_1", "Draft", "draft", None);
        repo.save_version(&draft).await.unwrap();
        let original = Version::original("sty_1");
        repo.save_version(&original).await.unwrap();
        let later = Version::new("sty_1", "Later", "later", Some("draft".to_string()));
        repo.save_version(&later).await.unwrap();

        let slugs: Vec<String> = repo
            .list_versions("sty_1")
            .await
            .unwrap()
            .into_iter()
            .map(|v| v.slug)
            .collect();
        assert_eq!(slugs, vec!["original", "draft", "later"]);

        let by_slug = repo.version_by_slug("sty_1", "later").await.unwrap();
        assert_eq!(by_slug.parent_slug.as_deref(), Some("draft"));
    }

    #[tokio::test]
    async fn test_remove_version_clears_merge_bases() {
        let repo = repo();
        let original = Version::original("sty_1");
        let fork = Version::new("sty_1", "Fork", "fork", Some(ORIGINAL_SLUG.to_string()));
        repo.save_version(&original).await.unwrap();
        repo.save_version(&fork).await.unwrap();
        repo.record_merge_base(&fork.id, &original.id, "base")
            .await
            .unwrap();
        repo.record_merge_base(&original.id, &fork.id, "merged")
            .await
            .unwrap();

        repo.remove_version(&fork).await.unwrap();

        assert!(repo.find_version(&fork.id).await.is_err());
        assert!(repo
            .merge_base(&fork.id, &original.id)
            .await
            .unwrap()
            .is_none());
        assert!(repo
            .merge_base(&original.id, &fork.id)
            .await
            .unwrap()
            .is_none());
        assert_eq!(repo.list_versions("sty_1").await.unwrap().len(), 1);
    }
}
