//! The story library: one entry point that owns storage, the snapshot
//! store, story locks, merge sessions and the event bus.
//!
//! The engines are implemented as `impl<S: Storage> Library<S>` blocks in
//! their own modules (`version`, `variation`, `merge`); this module holds
//! construction, story lifecycle and the helpers they share.

use crate::bus::{Bus, SnapshotCreated, StoryCreated, VersionCreated, VersionSwitched};
use crate::config::{Config, VersioningSettings};
use crate::content::ContentTree;
use crate::document::EMPTY_DOCUMENT;
use crate::error::{CoreError, CoreResult};
use crate::lock::StoryLocks;
use crate::merge::MergeSessions;
use crate::story::{Story, StoryRepository, Version};
use std::path::Path;
use std::sync::Arc;
use storyline_snapshot::{Snapshot, SnapshotConfig, SnapshotStore};
use storyline_storage::{JsonStorage, MemoryStorage, Storage};
use tracing::{debug, info};

/// A collection of stories backed by one storage.
pub struct Library<S: Storage> {
    pub(crate) repo: StoryRepository<S>,
    pub(crate) snapshots: SnapshotStore<S>,
    pub(crate) locks: StoryLocks,
    pub(crate) merges: MergeSessions<S>,
    bus: Bus,
    settings: VersioningSettings,
}

impl<S: Storage> Library<S> {
    /// Create a library over a storage backend.
    pub fn new(storage: Arc<S>, settings: VersioningSettings) -> CoreResult<Self> {
        settings.validate()?;
        let snapshot_config =
            SnapshotConfig::with_max_per_version(settings.max_snapshots_per_version);
        Ok(Self {
            repo: StoryRepository::new(storage.clone()),
            merges: MergeSessions::new(storage.clone()),
            snapshots: SnapshotStore::new(storage, snapshot_config)?,
            locks: StoryLocks::new(),
            bus: Bus::new(),
            settings,
        })
    }

    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    pub fn settings(&self) -> &VersioningSettings {
        &self.settings
    }

    // ========================================================================
    // Stories
    // ========================================================================

    /// Create a story with its original version and one initial snapshot.
    pub async fn create_story(&self, title: &str, content: Option<String>) -> CoreResult<Story> {
        let title = title.trim();
        if title.is_empty() {
            return Err(CoreError::invalid_argument("story title must not be empty"));
        }
        let content = content.unwrap_or_else(|| EMPTY_DOCUMENT.to_string());

        let mut story = Story::new(title, "");
        let _guard = self.locks.lock(&story.id).await;

        let version = Version::original(&story.id);
        self.repo.save_version(&version).await?;
        let snapshot = self
            .snapshots
            .create(&version.id, content.clone(), None, None)
            .await?;

        story.active_version_id = version.id.clone();
        story.active_snapshot_id = Some(snapshot.id.clone());
        story.word_count = ContentTree::parse(&content).word_count();
        // The story record goes last so a half-created story is never listed
        self.repo.save_story(&story).await?;

        info!(story_id = %story.id, title = %story.title, "Created story");
        self.bus
            .publish(StoryCreated {
                story_id: story.id.clone(),
                title: story.title.clone(),
            })
            .await;
        self.bus
            .publish(VersionCreated {
                story_id: story.id.clone(),
                version_id: version.id.clone(),
                slug: version.slug.clone(),
                parent_slug: None,
            })
            .await;

        Ok(story)
    }

    pub async fn get_story(&self, story_id: &str) -> CoreResult<Story> {
        self.repo.get_story(story_id).await
    }

    /// All stories, newest first.
    pub async fn list_stories(&self) -> CoreResult<Vec<Story>> {
        self.repo.list_stories().await
    }

    /// Content the editor should show: the draft if any, else the active
    /// snapshot, else the active version's newest snapshot.
    pub async fn active_content(&self, story: &Story) -> CoreResult<String> {
        if let Some(draft) = &story.draft {
            return Ok(draft.clone());
        }
        self.saved_content(story).await
    }

    /// Content of the active snapshot, ignoring any draft.
    pub(crate) async fn saved_content(&self, story: &Story) -> CoreResult<String> {
        if let Some(snapshot_id) = &story.active_snapshot_id {
            return Ok(self.snapshots.get(snapshot_id).await?.content);
        }
        Ok(self
            .head_content(&story.active_version_id)
            .await?
            .unwrap_or_default())
    }

    /// Whether the story has edits that no snapshot holds.
    pub async fn has_unsaved_changes(&self, story: &Story) -> CoreResult<bool> {
        match &story.draft {
            None => Ok(false),
            Some(draft) => {
                let saved = self.saved_content(story).await?;
                Ok(!crate::content::equivalent(draft, &saved))
            }
        }
    }

    /// Content of a version's newest snapshot.
    pub(crate) async fn head_content(&self, version_id: &str) -> CoreResult<Option<String>> {
        Ok(self
            .snapshots
            .latest(version_id)
            .await?
            .map(|snapshot| snapshot.content))
    }

    // ========================================================================
    // Shared helpers (callers hold the story lock)
    // ========================================================================

    /// Append a snapshot to a version, keeping the story's pointers valid.
    ///
    /// The story's active snapshot is protected from pruning. When the
    /// version is the active one the new snapshot becomes active and the
    /// draft is cleared.
    pub(crate) async fn commit_snapshot(
        &self,
        story: &mut Story,
        version: &mut Version,
        content: String,
        label: Option<String>,
    ) -> CoreResult<Snapshot> {
        let word_count = ContentTree::parse(&content).word_count();
        let snapshot = self
            .snapshots
            .create(
                &version.id,
                content,
                label,
                story.active_snapshot_id.as_ref(),
            )
            .await?;

        version.touch();
        self.repo.save_version(version).await?;

        if version.id == story.active_version_id {
            story.active_snapshot_id = Some(snapshot.id.clone());
            story.draft = None;
            story.word_count = word_count;
            story.touch();
            self.repo.save_story(story).await?;
        }

        debug!(
            story_id = %story.id,
            version_id = %version.id,
            seq = snapshot.seq,
            "Committed snapshot"
        );
        self.bus
            .publish(SnapshotCreated {
                story_id: story.id.clone(),
                version_id: version.id.clone(),
                snapshot_id: snapshot.id.to_string(),
                seq: snapshot.seq,
            })
            .await;

        Ok(snapshot)
    }

    /// Point the story at a version's newest snapshot, dropping the draft.
    pub(crate) async fn activate_version(
        &self,
        story: &mut Story,
        version: &Version,
    ) -> CoreResult<()> {
        let head = self.snapshots.latest(&version.id).await?;
        story.active_version_id = version.id.clone();
        story.word_count = head
            .as_ref()
            .map(|snapshot| ContentTree::parse(&snapshot.content).word_count())
            .unwrap_or(0);
        story.active_snapshot_id = head.map(|snapshot| snapshot.id);
        story.draft = None;
        story.touch();
        self.repo.save_story(story).await?;

        info!(story_id = %story.id, version = %version.slug, "Switched version");
        self.bus
            .publish(VersionSwitched {
                story_id: story.id.clone(),
                version_id: version.id.clone(),
                snapshot_id: story.active_snapshot_id.as_ref().map(|id| id.to_string()),
            })
            .await;
        Ok(())
    }
}

impl Library<MemoryStorage> {
    /// A library that lives only in memory.
    pub fn in_memory(settings: VersioningSettings) -> CoreResult<Self> {
        Self::new(Arc::new(MemoryStorage::new()), settings)
    }
}

impl Library<JsonStorage> {
    /// Open (or create) a library of JSON files under `root`.
    pub fn open(root: &Path, config: &Config) -> CoreResult<Self> {
        let settings = config.versioning()?;
        let storage = storyline_storage::json::library_storage(root);
        info!(path = %storage.base_path().display(), "Opened library");
        Self::new(Arc::new(storage), settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library() -> Library<MemoryStorage> {
        Library::in_memory(VersioningSettings::default()).unwrap()
    }

    #[tokio::test]
    async fn test_create_story_has_original_and_snapshot() {
        let library = library();
        let story = library.create_story("Night Train", None).await.unwrap();

        let versions = library.repo.list_versions(&story.id).await.unwrap();
        assert_eq!(versions.len(), 1);
        assert!(versions[0].is_original);
        assert_eq!(story.active_version_id, versions[0].id);

        let snapshots = library.snapshots.list(&versions[0].id).await.unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(story.active_snapshot_id.as_ref(), Some(&snapshots[0].id));
        assert_eq!(snapshots[0].content, EMPTY_DOCUMENT);
        assert_eq!(story.word_count, 0);
    }

    #[tokio::test]
    async fn test_create_story_rejects_blank_title() {
        let library = library();
        let err = library.create_story("   ", None).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));
        assert!(library.list_stories().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_active_content_prefers_draft() {
        let library = library();
        let mut story = library
            .create_story("Draft", Some("first words".to_string()))
            .await
            .unwrap();
        assert_eq!(story.word_count, 2);
        assert_eq!(library.active_content(&story).await.unwrap(), "first words");
        assert!(!library.has_unsaved_changes(&story).await.unwrap());

        story.draft = Some("first words and more".to_string());
        assert_eq!(
            library.active_content(&story).await.unwrap(),
            "first words and more"
        );
        assert!(library.has_unsaved_changes(&story).await.unwrap());
    }

    #[test]
    fn test_rejects_invalid_settings() {
        let settings = VersioningSettings::default().with_max_snapshots(1);
        assert!(matches!(
            Library::in_memory(settings),
            Err(CoreError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_open_json_library() {
        let dir = tempfile::tempdir().unwrap();
        let library = Library::open(dir.path(), &Config::default()).unwrap();
        let story = library.create_story("On Disk", None).await.unwrap();

        let reopened = Library::open(dir.path(), &Config::default()).unwrap();
        let read = reopened.get_story(&story.id).await.unwrap();
        assert_eq!(read.title, "On Disk");
    }
}
