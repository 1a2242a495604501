//! Test fixtures for creating reproducible test environments.
//!
//! [`TestLibrary`] is a story library stored in a temporary directory that is
//! removed when the fixture is dropped.

use std::path::Path;
use std::sync::Arc;
use storyline_core::{
    CommandRouter, Config, Library, Story, VersioningConfig, VersioningSettings,
};
use storyline_storage::JsonStorage;
use tempfile::TempDir;

/// A temporary on-disk library.
///
/// # Example
///
/// ```rust,no_run
/// use storyline_test_utils::fixtures::TestLibrary;
///
/// # async fn demo() {
/// let lib = TestLibrary::with_max_snapshots(3);
/// let story = lib.story("Retention", "first").await;
/// lib.assert_pointers_valid(&story.id).await;
/// # }
/// ```
pub struct TestLibrary {
    temp_dir: TempDir,
    library: Arc<Library<JsonStorage>>,
}

impl TestLibrary {
    /// A library with default versioning settings.
    pub fn new() -> Self {
        Self::with_settings(VersioningSettings::default())
    }

    /// A library with the given versioning settings.
    pub fn with_settings(settings: VersioningSettings) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = Config {
            versioning: Some(VersioningConfig {
                trigger: Some(settings.trigger),
                threshold: Some(settings.threshold),
                max_snapshots_per_version: Some(settings.max_snapshots_per_version),
            }),
            ..Default::default()
        };
        let library = Library::open(temp_dir.path(), &config).expect("Failed to open library");
        Self {
            temp_dir,
            library: Arc::new(library),
        }
    }

    /// A library that keeps at most `max` snapshots per version.
    pub fn with_max_snapshots(max: u32) -> Self {
        Self::with_settings(VersioningSettings::default().with_max_snapshots(max))
    }

    /// A library that snapshots every `threshold` edited characters.
    pub fn character_count(threshold: u32) -> Self {
        Self::with_settings(VersioningSettings::character_count(threshold))
    }

    /// Root of the library directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn library(&self) -> &Library<JsonStorage> {
        &self.library
    }

    /// A shared handle for spawned tasks.
    pub fn shared(&self) -> Arc<Library<JsonStorage>> {
        self.library.clone()
    }

    /// A command router over this library.
    pub fn router(&self) -> CommandRouter<JsonStorage> {
        CommandRouter::new(self.library.clone())
    }

    /// Create a story with initial content.
    pub async fn story(&self, title: &str, content: &str) -> Story {
        self.library
            .create_story(title, Some(content.to_string()))
            .await
            .expect("Failed to create story")
    }

    /// Reopen the same directory as a fresh library.
    pub fn reopen(&self) -> Library<JsonStorage> {
        Library::open(self.temp_dir.path(), &Config::default()).expect("Failed to reopen library")
    }

    /// Assert that the story's active pointers resolve: the active version
    /// belongs to the story and the active snapshot belongs to that version.
    pub async fn assert_pointers_valid(&self, story_id: &str) {
        let story = self
            .library
            .get_story(story_id)
            .await
            .expect("story should exist");
        let versions = self
            .library
            .list_versions(story_id)
            .await
            .expect("versions should list");
        assert!(
            versions.iter().any(|v| v.id == story.active_version_id),
            "active version {} is not one of the story's versions",
            story.active_version_id
        );
        assert_eq!(
            versions.iter().filter(|v| v.is_original).count(),
            1,
            "story must have exactly one original version"
        );

        if let Some(snapshot_id) = &story.active_snapshot_id {
            let snapshot = self
                .library
                .get_snapshot(snapshot_id)
                .await
                .unwrap_or_else(|e| panic!("active snapshot {snapshot_id} is missing: {e}"));
            assert_eq!(
                snapshot.version_id, story.active_version_id,
                "active snapshot belongs to another version"
            );
        }
    }
}

impl Default for TestLibrary {
    fn default() -> Self {
        Self::new()
    }
}
