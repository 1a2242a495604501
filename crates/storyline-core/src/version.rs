//! Version manager: versions of a story and their snapshot histories.

use crate::bus::{VersionCreated, VersionDeleted, VersionSwitched};
use crate::content::{equivalent, ContentTree};
use crate::error::{CoreError, CoreResult};
use crate::library::Library;
use crate::lock::StoryGuard;
use crate::story::{Story, Version};
use storyline_snapshot::{unified_diff, Snapshot, SnapshotId};
use storyline_storage::Storage;
use storyline_util::unique_slug;
use tracing::{debug, info};

impl<S: Storage> Library<S> {
    /// Resolve a version's story and lock it. The version is re-read under
    /// the lock so a concurrent delete is observed.
    pub(crate) async fn lock_version(&self, version_id: &str) -> CoreResult<(StoryGuard, Version)> {
        let version = self.repo.find_version(version_id).await?;
        let guard = self.locks.lock(&version.story_id).await;
        let version = self.repo.get_version(&version.story_id, version_id).await?;
        Ok((guard, version))
    }

    // ========================================================================
    // Snapshots
    // ========================================================================

    /// Append a snapshot to a version.
    pub async fn create_snapshot(&self, version_id: &str, content: String) -> CoreResult<Snapshot> {
        let (_guard, mut version) = self.lock_version(version_id).await?;
        let mut story = self.repo.get_story(&version.story_id).await?;
        self.commit_snapshot(&mut story, &mut version, content, None)
            .await
    }

    /// Snapshots of a version, newest first.
    pub async fn list_snapshots(&self, version_id: &str) -> CoreResult<Vec<Snapshot>> {
        self.repo.find_version(version_id).await?;
        Ok(self.snapshots.list(version_id).await?)
    }

    pub async fn get_snapshot(&self, snapshot_id: &SnapshotId) -> CoreResult<Snapshot> {
        Ok(self.snapshots.get(snapshot_id).await?)
    }

    /// Make a historical snapshot the active one. The active version follows
    /// the snapshot's owner.
    pub async fn switch_snapshot(&self, story_id: &str, snapshot_id: &SnapshotId) -> CoreResult<Story> {
        let _guard = self.locks.lock(story_id).await;
        let mut story = self.repo.get_story(story_id).await?;
        let snapshot = self.snapshots.get(snapshot_id).await?;
        let version = self
            .repo
            .get_version(story_id, &snapshot.version_id)
            .await
            .map_err(|_| CoreError::not_found(format!("snapshot {snapshot_id} in story {story_id}")))?;

        story.active_version_id = version.id.clone();
        story.active_snapshot_id = Some(snapshot.id.clone());
        story.draft = None;
        story.word_count = ContentTree::parse(&snapshot.content).word_count();
        story.touch();
        self.repo.save_story(&story).await?;

        info!(story_id = %story_id, snapshot_id = %snapshot.id, seq = snapshot.seq, "Restored snapshot");
        self.bus()
            .publish(VersionSwitched {
                story_id: story_id.to_string(),
                version_id: version.id,
                snapshot_id: Some(snapshot.id.to_string()),
            })
            .await;
        Ok(story)
    }

    /// Store the editor's working content without taking a snapshot.
    pub async fn update_snapshot_content(
        &self,
        story_id: &str,
        content: String,
        word_count: u32,
    ) -> CoreResult<Story> {
        let _guard = self.locks.lock(story_id).await;
        let mut story = self.repo.get_story(story_id).await?;
        story.draft = Some(content);
        story.word_count = word_count;
        story.touch();
        self.repo.save_story(&story).await?;
        debug!(story_id = %story_id, word_count, "Saved draft");
        Ok(story)
    }

    /// Line diff of two snapshots' text.
    pub async fn diff_snapshots(&self, from: &SnapshotId, to: &SnapshotId) -> CoreResult<String> {
        let from = self.snapshots.get(from).await?;
        let to = self.snapshots.get(to).await?;
        let old_text = ContentTree::parse(&from.content).plain_text();
        let new_text = ContentTree::parse(&to.content).plain_text();
        Ok(unified_diff(
            &old_text,
            &new_text,
            &format!("{}#{}", from.version_id, from.seq),
            &format!("{}#{}", to.version_id, to.seq),
        ))
    }

    // ========================================================================
    // Versions
    // ========================================================================

    /// Versions of a story in creation order, the original first.
    pub async fn list_versions(&self, story_id: &str) -> CoreResult<Vec<Version>> {
        self.repo.get_story(story_id).await?;
        self.repo.list_versions(story_id).await
    }

    /// Create a new version seeded with `seed_content`. The active version
    /// is unchanged.
    pub async fn create_version(
        &self,
        story_id: &str,
        name: &str,
        seed_content: String,
    ) -> CoreResult<Version> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CoreError::invalid_argument("version name must not be empty"));
        }

        let _guard = self.locks.lock(story_id).await;
        let mut story = self.repo.get_story(story_id).await?;
        let versions = self.repo.list_versions(story_id).await?;
        let slug = unique_slug(name, |candidate| versions.iter().any(|v| v.slug == candidate));

        // Seeded from the active head: remember where it came from
        let active = versions
            .iter()
            .find(|v| v.id == story.active_version_id)
            .ok_or_else(|| CoreError::not_found(format!("version {}", story.active_version_id)))?;
        let forked_from_active = self
            .head_content(&active.id)
            .await?
            .is_some_and(|head| equivalent(&head, &seed_content));
        let parent_slug = forked_from_active.then(|| active.slug.clone());

        let mut version = Version::new(story_id, name, slug, parent_slug.clone());
        self.repo.save_version(&version).await?;
        if forked_from_active {
            self.repo
                .record_merge_base(&version.id, &active.id, &seed_content)
                .await?;
        }
        self.commit_snapshot(&mut story, &mut version, seed_content, None)
            .await?;

        info!(story_id = %story_id, version = %version.slug, "Created version");
        self.bus()
            .publish(VersionCreated {
                story_id: story_id.to_string(),
                version_id: version.id.clone(),
                slug: version.slug.clone(),
                parent_slug,
            })
            .await;
        Ok(version)
    }

    /// Make a version active. Any unsaved draft is dropped.
    pub async fn switch_version(&self, story_id: &str, version_id: &str) -> CoreResult<Story> {
        let _guard = self.locks.lock(story_id).await;
        let mut story = self.repo.get_story(story_id).await?;
        let version = self.repo.get_version(story_id, version_id).await?;
        self.activate_version(&mut story, &version).await?;
        Ok(story)
    }

    /// Change a version's display name. The slug is unaffected.
    pub async fn rename_version(&self, version_id: &str, new_name: &str) -> CoreResult<Version> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(CoreError::invalid_argument("version name must not be empty"));
        }
        let (_guard, mut version) = self.lock_version(version_id).await?;
        version.name = new_name.to_string();
        version.touch();
        self.repo.save_version(&version).await?;
        info!(version_id = %version_id, name = %new_name, "Renamed version");
        Ok(version)
    }

    /// Delete a version and its snapshots.
    ///
    /// If it is the active version, the most recently updated remaining
    /// version becomes active first.
    pub async fn delete_version(&self, version_id: &str) -> CoreResult<()> {
        let (_guard, version) = self.lock_version(version_id).await?;
        self.delete_version_locked(version).await
    }

    pub(crate) async fn delete_version_locked(&self, version: Version) -> CoreResult<()> {
        let story_id = version.story_id.clone();
        let mut story = self.repo.get_story(&story_id).await?;
        let versions = self.repo.list_versions(&story_id).await?;

        if versions.len() <= 1 {
            return Err(CoreError::invalid_operation("cannot delete the only version"));
        }
        if version.is_original {
            return Err(CoreError::invalid_operation(
                "cannot delete the original version",
            ));
        }
        if self.merges.involves(&story_id, &version.id).await? {
            return Err(CoreError::invalid_operation(format!(
                "version '{}' is part of a pending merge",
                version.slug
            )));
        }

        if story.active_version_id == version.id {
            let replacement = versions
                .iter()
                .filter(|v| v.id != version.id)
                .max_by_key(|v| v.updated_at)
                .ok_or_else(|| CoreError::invalid_operation("cannot delete the only version"))?;
            // Move the pointer before anything is removed
            self.activate_version(&mut story, replacement).await?;
        }

        let removed = self.snapshots.delete_version(&version.id).await?;
        self.repo.remove_version(&version).await?;

        info!(story_id = %story_id, version = %version.slug, removed, "Deleted version");
        self.bus()
            .publish(VersionDeleted {
                story_id,
                version_id: version.id,
                snapshots_removed: removed,
            })
            .await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::VersioningSettings;
    use crate::error::CoreError;
    use crate::library::Library;
    use storyline_storage::MemoryStorage;

    fn library() -> Library<MemoryStorage> {
        Library::in_memory(VersioningSettings::default()).unwrap()
    }

    #[tokio::test]
    async fn test_create_snapshot_on_active_version_moves_pointer() {
        let library = library();
        let story = library.create_story("Tide", None).await.unwrap();
        library
            .update_snapshot_content(&story.id, "draft text".to_string(), 2)
            .await
            .unwrap();

        let snapshot = library
            .create_snapshot(&story.active_version_id, "saved text here".to_string())
            .await
            .unwrap();

        let story = library.get_story(&story.id).await.unwrap();
        assert_eq!(story.active_snapshot_id, Some(snapshot.id));
        assert!(story.draft.is_none());
        assert_eq!(story.word_count, 3);
        assert_eq!(snapshot.seq, 2);
    }

    #[tokio::test]
    async fn test_create_snapshot_unknown_version() {
        let library = library();
        let err = library
            .create_snapshot("ver_missing", "x".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_create_version_records_parent_when_forked_from_active() {
        let library = library();
        let story = library
            .create_story("Fork", Some("shared start".to_string()))
            .await
            .unwrap();

        let forked = library
            .create_version(&story.id, "Darker", "shared start".to_string())
            .await
            .unwrap();
        assert_eq!(forked.parent_slug.as_deref(), Some("original"));
        assert!(library
            .repo
            .merge_base(&forked.id, &story.active_version_id)
            .await
            .unwrap()
            .is_some());

        let fresh = library
            .create_version(&story.id, "Blank Slate", String::new())
            .await
            .unwrap();
        assert!(fresh.parent_slug.is_none());
        assert_eq!(fresh.slug, "blank-slate");
    }

    #[tokio::test]
    async fn test_create_version_unique_slugs() {
        let library = library();
        let story = library.create_story("Dupes", None).await.unwrap();
        let a = library
            .create_version(&story.id, "Take", String::new())
            .await
            .unwrap();
        let b = library
            .create_version(&story.id, "Take", String::new())
            .await
            .unwrap();
        let c = library
            .create_version(&story.id, "Original", String::new())
            .await
            .unwrap();
        assert_eq!(a.slug, "take");
        assert_eq!(b.slug, "take-2");
        assert_eq!(c.slug, "original-2");
        assert!(!c.is_original);
    }

    #[tokio::test]
    async fn test_rename_keeps_slug() {
        let library = library();
        let story = library.create_story("Names", None).await.unwrap();
        let version = library
            .create_version(&story.id, "First Try", String::new())
            .await
            .unwrap();

        let renamed = library
            .rename_version(&version.id, "  Second Try ")
            .await
            .unwrap();
        assert_eq!(renamed.name, "Second Try");
        assert_eq!(renamed.slug, "first-try");

        let err = library.rename_version(&version.id, "   ").await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn test_switch_snapshot_restores_old_content() {
        let library = library();
        let story = library
            .create_story("Restore", Some("one".to_string()))
            .await
            .unwrap();
        let first = story.active_snapshot_id.clone().unwrap();
        library
            .create_snapshot(&story.active_version_id, "one two three".to_string())
            .await
            .unwrap();

        let restored = library.switch_snapshot(&story.id, &first).await.unwrap();
        assert_eq!(restored.active_snapshot_id, Some(first));
        assert_eq!(restored.word_count, 1);
        assert_eq!(library.active_content(&restored).await.unwrap(), "one");
    }

    #[tokio::test]
    async fn test_switch_snapshot_from_other_story_is_not_found() {
        let library = library();
        let a = library.create_story("A", None).await.unwrap();
        let b = library.create_story("B", None).await.unwrap();
        let foreign = b.active_snapshot_id.unwrap();

        let err = library.switch_snapshot(&a.id, &foreign).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_diff_snapshots() {
        let library = library();
        let story = library
            .create_story("Diff", Some("alpha\nbeta".to_string()))
            .await
            .unwrap();
        let first = story.active_snapshot_id.clone().unwrap();
        let second = library
            .create_snapshot(&story.active_version_id, "alpha\ngamma".to_string())
            .await
            .unwrap();

        let diff = library.diff_snapshots(&first, &second.id).await.unwrap();
        assert!(diff.contains("-beta"));
        assert!(diff.contains("+gamma"));
    }
}
