//! Automatic snapshots while a story is being edited.
//!
//! An [`EditSession`] receives every content change the editor pushes. In
//! `character-count` mode it snapshots the active version each time enough
//! characters were edited; in `on-editor-close` mode it snapshots once when
//! the editor closes, if the content changed.

use crate::config::{SnapshotTrigger, VersioningSettings};
use crate::content::{equivalent, ContentTree};
use crate::error::CoreResult;
use crate::library::Library;
use std::time::Duration;
use storyline_snapshot::Snapshot;
use storyline_storage::Storage;
use tracing::{debug, warn};

/// Upper bound on the time spent diffing one edit.
const DELTA_TIMEOUT: Duration = Duration::from_millis(250);

/// Number of characters inserted plus deleted going from `old` to `new`.
pub fn edit_delta(old: &str, new: &str) -> u32 {
    let diff = similar::TextDiff::configure()
        .timeout(DELTA_TIMEOUT)
        .diff_chars(old, new);
    let changed: usize = diff
        .iter_all_changes()
        .filter(|change| change.tag() != similar::ChangeTag::Equal)
        .map(|change| change.value().chars().count())
        .sum();
    u32::try_from(changed).unwrap_or(u32::MAX)
}

/// Decides when edits become snapshots.
#[derive(Debug, Clone, Copy)]
pub struct AutoSnapshotPolicy {
    settings: VersioningSettings,
}

impl AutoSnapshotPolicy {
    pub fn new(settings: VersioningSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &VersioningSettings {
        &self.settings
    }

    /// Start tracking edits to a story.
    pub async fn begin<'a, S: Storage>(
        &self,
        library: &'a Library<S>,
        story_id: &str,
    ) -> CoreResult<EditSession<'a, S>> {
        library.get_story(story_id).await?;
        Ok(EditSession {
            library,
            story_id: story_id.to_string(),
            settings: self.settings,
            accumulated: 0,
        })
    }
}

/// Edits to one story between editor open and close.
pub struct EditSession<'a, S: Storage> {
    library: &'a Library<S>,
    story_id: String,
    settings: VersioningSettings,
    accumulated: u32,
}

impl<S: Storage> EditSession<'_, S> {
    pub fn story_id(&self) -> &str {
        &self.story_id
    }

    /// Characters edited since the last automatic snapshot.
    pub fn accumulated(&self) -> u32 {
        self.accumulated
    }

    /// Save the editor's content as the draft and snapshot it if the
    /// character threshold was reached.
    ///
    /// The counter is reset only after the snapshot is stored, so a failed
    /// snapshot is retried on the next change.
    pub async fn record_change(&mut self, content: String, delta: u32) -> CoreResult<Option<Snapshot>> {
        let word_count = ContentTree::parse(&content).word_count();
        self.library
            .update_snapshot_content(&self.story_id, content, word_count)
            .await?;

        if self.settings.trigger != SnapshotTrigger::CharacterCount {
            return Ok(None);
        }

        self.accumulated = self.accumulated.saturating_add(delta);
        if self.accumulated < self.settings.threshold {
            return Ok(None);
        }

        match self.library.commit_draft(&self.story_id, false).await {
            Ok(snapshot) => {
                debug!(
                    story_id = %self.story_id,
                    edited = self.accumulated,
                    "Character threshold reached"
                );
                self.accumulated = 0;
                Ok(snapshot)
            }
            Err(e) => {
                warn!(story_id = %self.story_id, error = %e, "Automatic snapshot failed");
                Err(e)
            }
        }
    }

    /// End the session. In `on-editor-close` mode the draft is snapshotted
    /// when it differs from the active snapshot.
    pub async fn close(self) -> CoreResult<Option<Snapshot>> {
        match self.settings.trigger {
            SnapshotTrigger::OnEditorClose => self.library.commit_draft(&self.story_id, true).await,
            SnapshotTrigger::CharacterCount => Ok(None),
        }
    }
}

impl<S: Storage> Library<S> {
    /// Start an edit session with the library's own settings.
    pub async fn begin_editing(&self, story_id: &str) -> CoreResult<EditSession<'_, S>> {
        AutoSnapshotPolicy::new(*self.settings())
            .begin(self, story_id)
            .await
    }

    /// Snapshot the story's draft onto the active version.
    ///
    /// Returns `None` when there is no draft, or when `only_if_changed` is
    /// set and the draft matches the active snapshot.
    pub async fn commit_draft(
        &self,
        story_id: &str,
        only_if_changed: bool,
    ) -> CoreResult<Option<Snapshot>> {
        let _guard = self.locks.lock(story_id).await;
        let mut story = self.repo.get_story(story_id).await?;
        let Some(draft) = story.draft.clone() else {
            return Ok(None);
        };
        if only_if_changed && equivalent(&draft, &self.saved_content(&story).await?) {
            return Ok(None);
        }
        let mut version = self
            .repo
            .get_version(story_id, &story.active_version_id)
            .await?;
        let snapshot = self
            .commit_snapshot(&mut story, &mut version, draft, None)
            .await?;
        Ok(Some(snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyline_storage::MemoryStorage;

    fn library(settings: VersioningSettings) -> Library<MemoryStorage> {
        Library::in_memory(settings).unwrap()
    }

    #[test]
    fn test_edit_delta() {
        assert_eq!(edit_delta("hello", "hello"), 0);
        assert_eq!(edit_delta("hello", "hello world"), 6);
        assert_eq!(edit_delta("hello world", "hello"), 6);
        assert_eq!(edit_delta("cat", "cut"), 2);
        assert_eq!(edit_delta("", "héllo"), 5);
    }

    #[tokio::test]
    async fn test_character_count_snapshots_once_per_crossing() {
        let library = library(VersioningSettings::character_count(10));
        let story = library.create_story("Counting", None).await.unwrap();
        let mut session = library.begin_editing(&story.id).await.unwrap();

        assert!(session.record_change("abcd".into(), 4).await.unwrap().is_none());
        assert_eq!(session.accumulated(), 4);
        assert!(session.record_change("abcdefgh".into(), 4).await.unwrap().is_none());

        let snapshot = session
            .record_change("abcdefghijkl".into(), 4)
            .await
            .unwrap()
            .expect("threshold crossed");
        assert_eq!(snapshot.content, "abcdefghijkl");
        assert_eq!(session.accumulated(), 0);

        let snapshots = library.list_snapshots(&story.active_version_id).await.unwrap();
        assert_eq!(snapshots.len(), 2);

        // Closing in character-count mode takes no snapshot
        session.record_change("abcdefghijklm".into(), 1).await.unwrap();
        assert!(session.close().await.unwrap().is_none());
        let story = library.get_story(&story.id).await.unwrap();
        assert_eq!(story.draft.as_deref(), Some("abcdefghijklm"));
    }

    #[tokio::test]
    async fn test_failed_snapshot_keeps_counter() {
        let library = library(VersioningSettings::character_count(5));
        let story = library.create_story("Doomed", None).await.unwrap();
        let mut session = library.begin_editing(&story.id).await.unwrap();
        session.record_change("abc".into(), 3).await.unwrap();

        // Break the active pointer so the snapshot cannot be committed
        let mut broken = library.get_story(&story.id).await.unwrap();
        broken.active_version_id = "ver_gone".to_string();
        library.repo.save_story(&broken).await.unwrap();

        assert!(session.record_change("abcdef".into(), 3).await.is_err());
        assert_eq!(session.accumulated(), 6);
    }

    #[tokio::test]
    async fn test_on_close_snapshots_only_changes() {
        let library = library(VersioningSettings::default());
        let story = library
            .create_story("Closing", Some("same".to_string()))
            .await
            .unwrap();

        let mut session = library.begin_editing(&story.id).await.unwrap();
        session.record_change("same".into(), 0).await.unwrap();
        assert!(session.close().await.unwrap().is_none());

        let mut session = library.begin_editing(&story.id).await.unwrap();
        let delta = edit_delta("same", "different");
        assert!(session
            .record_change("different".into(), delta)
            .await
            .unwrap()
            .is_none());
        let snapshot = session.close().await.unwrap().expect("content changed");
        assert_eq!(snapshot.content, "different");

        let story = library.get_story(&story.id).await.unwrap();
        assert_eq!(story.active_snapshot_id, Some(snapshot.id));
        assert!(story.draft.is_none());
    }

    #[tokio::test]
    async fn test_begin_unknown_story() {
        let library = library(VersioningSettings::default());
        assert!(library.begin_editing("sty_missing").await.is_err());
    }
}
