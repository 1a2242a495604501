//! Variations: the branch view of a story's versions.
//!
//! A variation is a version addressed by its slug, with lineage (the slug of
//! the variation it was forked from). Variations can be forked, switched,
//! diffed unit by unit and deleted.

use crate::bus::VersionCreated;
use crate::content::{diff_units, ContentTree, UnitChange};
use crate::error::{CoreError, CoreResult};
use crate::library::Library;
use crate::story::{Story, Version};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use storyline_snapshot::SnapshotId;
use storyline_storage::Storage;
use storyline_util::{is_reserved, slugify};
use tracing::info;

/// A version seen as a variation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariationInfo {
    pub slug: String,
    pub display_name: String,
    pub version_id: String,
    pub parent_slug: Option<String>,
    pub is_original: bool,
    pub is_current: bool,
    pub updated_at: DateTime<Utc>,
}

impl VariationInfo {
    fn from_version(version: &Version, story: &Story) -> Self {
        Self {
            slug: version.slug.clone(),
            display_name: version.name.clone(),
            version_id: version.id.clone(),
            parent_slug: version.parent_slug.clone(),
            is_original: version.is_original,
            is_current: version.id == story.active_version_id,
            updated_at: version.updated_at,
        }
    }
}

/// What to do with unsaved edits when switching variations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnsavedChanges {
    /// Fail with a conflict.
    #[default]
    Refuse,
    /// Snapshot them onto the current variation first.
    Save,
    /// Drop them.
    Discard,
}

/// Unit-level differences between two variations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffResult {
    pub from: String,
    pub to: String,
    pub changes: Vec<UnitChange>,
}

impl DiffResult {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

impl<S: Storage> Library<S> {
    /// Fork a new variation from `parent_slug` (the current variation when
    /// `None`), optionally from one of the parent's historical snapshots.
    pub async fn create_variation(
        &self,
        story_id: &str,
        display_name: &str,
        parent_slug: Option<&str>,
        at_snapshot: Option<&SnapshotId>,
    ) -> CoreResult<VariationInfo> {
        let name = display_name.trim();
        if name.is_empty() {
            return Err(CoreError::invalid_argument("variation name must not be empty"));
        }
        if is_reserved(name) {
            return Err(CoreError::invalid_argument(format!("reserved name: {name}")));
        }
        let slug = slugify(name);

        let _guard = self.locks.lock(story_id).await;
        let mut story = self.repo.get_story(story_id).await?;
        let versions = self.repo.list_versions(story_id).await?;
        if versions.iter().any(|v| v.slug == slug) {
            return Err(CoreError::invalid_argument(format!(
                "variation '{slug}' already exists"
            )));
        }

        let parent = match parent_slug {
            Some(parent_slug) => versions.iter().find(|v| v.slug == parent_slug),
            None => versions.iter().find(|v| v.id == story.active_version_id),
        }
        .ok_or_else(|| {
            CoreError::not_found(format!(
                "variation {}",
                parent_slug.unwrap_or(story.active_version_id.as_str())
            ))
        })?;

        let content = match at_snapshot {
            Some(snapshot_id) => {
                let snapshot = self.snapshots.get(snapshot_id).await?;
                if snapshot.version_id != parent.id {
                    return Err(CoreError::not_found(format!(
                        "snapshot {snapshot_id} in variation {}",
                        parent.slug
                    )));
                }
                snapshot.content
            }
            None => self.head_content(&parent.id).await?.unwrap_or_default(),
        };

        let mut version = Version::new(story_id, name, slug, Some(parent.slug.clone()));
        self.repo.save_version(&version).await?;
        self.repo
            .record_merge_base(&version.id, &parent.id, &content)
            .await?;
        self.commit_snapshot(&mut story, &mut version, content, None)
            .await?;

        info!(
            story_id = %story_id,
            variation = %version.slug,
            parent = %parent.slug,
            "Created variation"
        );
        self.bus()
            .publish(VersionCreated {
                story_id: story_id.to_string(),
                version_id: version.id.clone(),
                slug: version.slug.clone(),
                parent_slug: version.parent_slug.clone(),
            })
            .await;

        Ok(VariationInfo::from_version(&version, &story))
    }

    /// Make the variation with `slug` current.
    pub async fn switch_variation(
        &self,
        story_id: &str,
        slug: &str,
        unsaved: UnsavedChanges,
    ) -> CoreResult<Story> {
        let _guard = self.locks.lock(story_id).await;
        let mut story = self.repo.get_story(story_id).await?;
        let target = self.repo.version_by_slug(story_id, slug).await?;

        if self.has_unsaved_changes(&story).await? {
            match unsaved {
                UnsavedChanges::Refuse => {
                    return Err(CoreError::conflict("uncommitted changes"));
                }
                UnsavedChanges::Save => {
                    let draft = story.draft.clone().unwrap_or_default();
                    let mut current = self
                        .repo
                        .get_version(story_id, &story.active_version_id)
                        .await?;
                    self.commit_snapshot(&mut story, &mut current, draft, None)
                        .await?;
                }
                UnsavedChanges::Discard => {
                    info!(story_id = %story_id, "Discarding unsaved changes");
                }
            }
        }

        self.activate_version(&mut story, &target).await?;
        Ok(story)
    }

    /// All variations, the original first, then by creation.
    pub async fn list_variations(&self, story_id: &str) -> CoreResult<Vec<VariationInfo>> {
        let story = self.repo.get_story(story_id).await?;
        let versions = self.repo.list_versions(story_id).await?;
        Ok(versions
            .iter()
            .map(|version| VariationInfo::from_version(version, &story))
            .collect())
    }

    /// Delete a variation. The original can never be deleted.
    pub async fn delete_variation(&self, story_id: &str, slug: &str) -> CoreResult<()> {
        let _guard = self.locks.lock(story_id).await;
        let version = self.repo.version_by_slug(story_id, slug).await?;
        self.delete_version_locked(version).await
    }

    /// Unit-level changes going from variation `from` to variation `to`.
    pub async fn diff_variations(&self, story_id: &str, from: &str, to: &str) -> CoreResult<DiffResult> {
        let from_version = self.repo.version_by_slug(story_id, from).await?;
        let to_version = self.repo.version_by_slug(story_id, to).await?;
        let from_tree = ContentTree::parse(
            &self.head_content(&from_version.id).await?.unwrap_or_default(),
        );
        let to_tree =
            ContentTree::parse(&self.head_content(&to_version.id).await?.unwrap_or_default());

        Ok(DiffResult {
            from: from_version.slug,
            to: to_version.slug,
            changes: diff_units(&from_tree, &to_tree),
        })
    }

    /// The version behind a slug.
    pub async fn resolve_slug(&self, story_id: &str, slug: &str) -> CoreResult<Version> {
        self.repo.version_by_slug(story_id, slug).await
    }
}
