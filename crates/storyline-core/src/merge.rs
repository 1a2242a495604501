//! Merging one variation into another.
//!
//! A merge compares the source and target variations unit by unit against
//! their most recent common ancestor (the merge base). Units changed on only
//! one side merge automatically. Units changed on both sides become
//! conflicts that must each be resolved before the merge can be finalized.
//!
//! ```text
//! Idle -> Attempting -> CleanMerge      -> Committed
//!                    -> ConflictPending -> Committed | Aborted
//! ```
//!
//! The target is not written until a merge commits, so an abandoned merge
//! leaves it untouched. A pending merge is stored under
//! `merge_session/<story>` until it is committed or aborted, so it survives
//! a restart of the process.

use crate::bus::{MergeAborted, MergeCommitted};
use crate::content::{all_paths, merge_unit, ContentTree, UnitMerge};
use crate::error::{CoreError, CoreResult};
use crate::library::Library;
use crate::story::{MergeBase, Story, Version};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use storyline_snapshot::SnapshotId;
use storyline_storage::Storage;
use storyline_util::Identifier;
use tracing::{debug, info};

/// Where a merge stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeState {
    Idle,
    Attempting,
    CleanMerge,
    ConflictPending,
    Committed,
    Aborted,
}

/// Which side wins a conflicting unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    KeepSource,
    KeepTarget,
}

/// Outcome of a merge attempt or finalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeResult {
    pub success: bool,
    pub message: String,
    /// Paths of the units still in conflict.
    pub conflicts: Vec<String>,
    /// The snapshot committed to the target, if any.
    pub snapshot_id: Option<SnapshotId>,
    pub state: MergeState,
}

/// Resolution state of one conflicting unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictStatus {
    pub path: String,
    pub resolution: Option<Resolution>,
}

/// A pending merge as seen from outside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeStatus {
    pub id: String,
    pub from_slug: String,
    pub into_slug: String,
    pub state: MergeState,
    pub conflicts: Vec<ConflictStatus>,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConflictUnit {
    source: Option<String>,
    target: Option<String>,
    resolution: Option<Resolution>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct MergeSession {
    id: String,
    from_version_id: String,
    from_slug: String,
    into_version_id: String,
    into_slug: String,
    /// Target head when the merge was attempted.
    target_head: Option<SnapshotId>,
    /// Source content being merged, recorded as the next merge base.
    source_content: String,
    /// Units that merged without conflict.
    merged: BTreeMap<String, String>,
    conflicts: BTreeMap<String, ConflictUnit>,
    state: MergeState,
    started_at: DateTime<Utc>,
}

impl MergeSession {
    fn status(&self) -> MergeStatus {
        MergeStatus {
            id: self.id.clone(),
            from_slug: self.from_slug.clone(),
            into_slug: self.into_slug.clone(),
            state: self.state,
            conflicts: self
                .conflicts
                .iter()
                .map(|(path, unit)| ConflictStatus {
                    path: path.clone(),
                    resolution: unit.resolution,
                })
                .collect(),
            started_at: self.started_at,
        }
    }

    fn unresolved(&self) -> Vec<String> {
        self.conflicts
            .iter()
            .filter(|(_, unit)| unit.resolution.is_none())
            .map(|(path, _)| path.clone())
            .collect()
    }

    /// The merged tree with every resolution applied.
    fn resolved_tree(&self) -> ContentTree {
        let mut tree = ContentTree::from_units(self.merged.clone());
        for (path, unit) in &self.conflicts {
            let chosen = match unit.resolution {
                Some(Resolution::KeepSource) => &unit.source,
                Some(Resolution::KeepTarget) | None => &unit.target,
            };
            match chosen {
                Some(payload) => tree.insert(path.clone(), payload.clone()),
                None => {
                    tree.remove(path);
                }
            }
        }
        tree
    }
}

/// Pending merges, at most one per story.
pub(crate) struct MergeSessions<S: Storage> {
    storage: Arc<S>,
}

impl<S: Storage> MergeSessions<S> {
    pub(crate) fn new(storage: Arc<S>) -> Self {
        Self { storage }
    }

    async fn get(&self, story_id: &str) -> CoreResult<Option<MergeSession>> {
        Ok(self.storage.read(&["merge_session", story_id]).await?)
    }

    async fn save(&self, story_id: &str, session: &MergeSession) -> CoreResult<()> {
        self.storage
            .write(&["merge_session", story_id], session)
            .await?;
        Ok(())
    }

    async fn remove(&self, story_id: &str) -> CoreResult<Option<MergeSession>> {
        let session = self.get(story_id).await?;
        if session.is_some() {
            self.storage.remove(&["merge_session", story_id]).await?;
        }
        Ok(session)
    }

    /// Whether a pending merge of the story uses this version.
    pub(crate) async fn involves(&self, story_id: &str, version_id: &str) -> CoreResult<bool> {
        Ok(self.get(story_id).await?.is_some_and(|session| {
            session.from_version_id == version_id || session.into_version_id == version_id
        }))
    }
}

/// A version followed by its ancestors, nearest first.
///
/// The walk stops at a missing parent or a repeated slug.
fn lineage(version: &Version, versions: &[Version]) -> Vec<Version> {
    let mut chain = vec![version.clone()];
    let mut next = version.parent_slug.clone();
    while let Some(slug) = next {
        if chain.iter().any(|v| v.slug == slug) {
            break;
        }
        let Some(parent) = versions.iter().find(|v| v.slug == slug) else {
            break;
        };
        next = parent.parent_slug.clone();
        chain.push(parent.clone());
    }
    chain
}

fn no_session() -> CoreError {
    CoreError::invalid_operation("no merge in progress")
}

impl<S: Storage> Library<S> {
    /// Most recent common ancestor content of two variations.
    ///
    /// Candidates are the bases recorded for the pair in either direction
    /// (earlier merges, or a direct fork) and the lineage fork point: the
    /// nearest version both descend from, as it was when the earlier of the
    /// two lines forked off it. The newest candidate wins.
    async fn find_merge_base(&self, from: &Version, into: &Version) -> CoreResult<Option<String>> {
        let mut candidates: Vec<MergeBase> = Vec::new();
        candidates.extend(self.repo.merge_base(&into.id, &from.id).await?);
        candidates.extend(self.repo.merge_base(&from.id, &into.id).await?);
        candidates.extend(self.lineage_fork_point(from, into).await?);

        Ok(candidates
            .into_iter()
            .max_by_key(|base| base.recorded_at)
            .map(|base| base.content))
    }

    async fn lineage_fork_point(
        &self,
        from: &Version,
        into: &Version,
    ) -> CoreResult<Option<MergeBase>> {
        let versions = self.repo.list_versions(&from.story_id).await?;
        let from_line = lineage(from, &versions);
        let into_line = lineage(into, &versions);

        let Some((from_depth, into_depth)) = from_line.iter().enumerate().find_map(|(i, v)| {
            into_line
                .iter()
                .position(|w| w.id == v.id)
                .map(|j| (i, j))
        }) else {
            return Ok(None);
        };
        let ancestor = &from_line[from_depth];

        // The child of the ancestor on each side, unless that side is the ancestor
        let mut forks = Vec::new();
        for (line, depth) in [(&from_line, from_depth), (&into_line, into_depth)] {
            if depth > 0 {
                forks.extend(self.repo.merge_base(&line[depth - 1].id, &ancestor.id).await?);
            }
        }
        debug!(ancestor = %ancestor.slug, forks = forks.len(), "Resolved lineage fork point");
        Ok(forks.into_iter().min_by_key(|base| base.recorded_at))
    }

    /// Merge variation `from_slug` into `into_slug`.
    ///
    /// A clean merge commits one snapshot to the target immediately. A merge
    /// with conflicts stays pending until every conflict is resolved and
    /// [`finalize_merge`](Self::finalize_merge) is called, or it is aborted.
    pub async fn attempt_merge(
        &self,
        story_id: &str,
        from_slug: &str,
        into_slug: &str,
    ) -> CoreResult<MergeResult> {
        if from_slug == into_slug {
            return Err(CoreError::invalid_argument(
                "cannot merge a variation into itself",
            ));
        }

        let _guard = self.locks.lock(story_id).await;
        let mut story = self.repo.get_story(story_id).await?;
        if self.merges.get(story_id).await?.is_some() {
            return Err(CoreError::invalid_operation("a merge is already in progress"));
        }

        let from = self.repo.version_by_slug(story_id, from_slug).await?;
        let mut into = self.repo.version_by_slug(story_id, into_slug).await?;
        // Both sides are read from snapshots, so neither may hide a draft
        let active = story.active_version_id.as_str();
        if (into.id == active || from.id == active) && self.has_unsaved_changes(&story).await? {
            return Err(CoreError::conflict("uncommitted changes"));
        }

        debug!(story_id = %story_id, from = %from_slug, into = %into_slug, state = ?MergeState::Attempting, "Attempting merge");

        let source_content = self.head_content(&from.id).await?.unwrap_or_default();
        let target_head = self.snapshots.latest(&into.id).await?;
        let target_content = target_head
            .as_ref()
            .map(|snapshot| snapshot.content.clone())
            .unwrap_or_default();
        let base = self.find_merge_base(&from, &into).await?;

        let source = ContentTree::parse(&source_content);
        let target = ContentTree::parse(&target_content);
        let base = base.map(|content| ContentTree::parse(&content));

        let mut merged = BTreeMap::new();
        let mut conflicts = BTreeMap::new();
        let trees: Vec<&ContentTree> = [Some(&source), Some(&target), base.as_ref()]
            .into_iter()
            .flatten()
            .collect();
        for path in all_paths(&trees) {
            let source_unit = source.get(&path);
            let target_unit = target.get(&path);
            let base_unit = base.as_ref().map(|tree| tree.get(&path));
            match merge_unit(base_unit, source_unit, target_unit) {
                UnitMerge::Take(Some(payload)) => {
                    merged.insert(path, payload);
                }
                UnitMerge::Take(None) => {}
                UnitMerge::Conflict => {
                    conflicts.insert(
                        path,
                        ConflictUnit {
                            source: source_unit.map(str::to_string),
                            target: target_unit.map(str::to_string),
                            resolution: None,
                        },
                    );
                }
            }
        }

        if !conflicts.is_empty() {
            let paths: Vec<String> = conflicts.keys().cloned().collect();
            let session = MergeSession {
                id: Identifier::merge(),
                from_version_id: from.id.clone(),
                from_slug: from.slug.clone(),
                into_version_id: into.id.clone(),
                into_slug: into.slug.clone(),
                target_head: target_head.map(|snapshot| snapshot.id),
                source_content,
                merged,
                conflicts,
                state: MergeState::ConflictPending,
                started_at: Utc::now(),
            };
            info!(
                story_id = %story_id,
                merge_id = %session.id,
                conflicts = paths.len(),
                "Merge has conflicts"
            );
            self.merges.save(story_id, &session).await?;
            return Ok(MergeResult {
                success: false,
                message: format!("{} conflicting unit(s) need resolution", paths.len()),
                conflicts: paths,
                snapshot_id: None,
                state: MergeState::ConflictPending,
            });
        }

        let merged = ContentTree::from_units(merged);
        if crate::content::diff_units(&target, &merged).is_empty() {
            info!(story_id = %story_id, from = %from_slug, into = %into_slug, "Already up to date");
            return Ok(MergeResult {
                success: true,
                message: "already up to date".to_string(),
                conflicts: Vec::new(),
                snapshot_id: None,
                state: MergeState::CleanMerge,
            });
        }

        let snapshot_id = self
            .commit_merge(&mut story, &from, &mut into, &merged, &source_content)
            .await?;
        Ok(MergeResult {
            success: true,
            message: format!("merged '{}' into '{}'", from.slug, into.slug),
            conflicts: Vec::new(),
            snapshot_id: Some(snapshot_id),
            state: MergeState::Committed,
        })
    }

    /// Choose a side for one conflicting unit of the pending merge.
    pub async fn resolve_conflict_unit(
        &self,
        story_id: &str,
        unit: &str,
        resolution: Resolution,
    ) -> CoreResult<()> {
        let _guard = self.locks.lock(story_id).await;
        let mut session = self.merges.get(story_id).await?.ok_or_else(no_session)?;
        let conflict = session
            .conflicts
            .get_mut(unit)
            .ok_or_else(|| CoreError::not_found(format!("conflict unit {unit}")))?;
        conflict.resolution = Some(resolution);
        self.merges.save(story_id, &session).await?;
        debug!(story_id = %story_id, unit = %unit, ?resolution, "Resolved conflict");
        Ok(())
    }

    /// Commit a pending merge once every conflict is resolved.
    pub async fn finalize_merge(&self, story_id: &str) -> CoreResult<MergeResult> {
        let _guard = self.locks.lock(story_id).await;
        let session = self.merges.get(story_id).await?.ok_or_else(no_session)?;

        let unresolved = session.unresolved();
        if !unresolved.is_empty() {
            return Err(CoreError::invalid_operation(format!(
                "unresolved conflicts: {}",
                unresolved.join(", ")
            )));
        }

        let mut story = self.repo.get_story(story_id).await?;
        let from = self
            .repo
            .get_version(story_id, &session.from_version_id)
            .await?;
        let mut into = self
            .repo
            .get_version(story_id, &session.into_version_id)
            .await?;

        let current_head = self.snapshots.latest(&into.id).await?.map(|s| s.id);
        if current_head != session.target_head {
            return Err(CoreError::conflict(format!(
                "variation '{}' changed since the merge started",
                into.slug
            )));
        }
        if into.id == story.active_version_id && self.has_unsaved_changes(&story).await? {
            return Err(CoreError::conflict("uncommitted changes"));
        }

        let resolved = session.resolved_tree();
        let snapshot_id = self
            .commit_merge(&mut story, &from, &mut into, &resolved, &session.source_content)
            .await?;
        self.merges.remove(story_id).await?;

        Ok(MergeResult {
            success: true,
            message: format!("merged '{}' into '{}'", from.slug, into.slug),
            conflicts: Vec::new(),
            snapshot_id: Some(snapshot_id),
            state: MergeState::Committed,
        })
    }

    /// Abandon the pending merge, if any. The target is untouched.
    pub async fn abort_merge(&self, story_id: &str) -> CoreResult<MergeState> {
        let _guard = self.locks.lock(story_id).await;
        let Some(session) = self.merges.remove(story_id).await? else {
            return Ok(MergeState::Idle);
        };

        info!(story_id = %story_id, merge_id = %session.id, "Aborted merge");
        self.bus()
            .publish(MergeAborted {
                story_id: story_id.to_string(),
                from_slug: session.from_slug,
                into_slug: session.into_slug,
            })
            .await;
        Ok(MergeState::Aborted)
    }

    /// The pending merge of a story, if any.
    pub async fn merge_status(&self, story_id: &str) -> CoreResult<Option<MergeStatus>> {
        Ok(self.merges.get(story_id).await?.map(|session| session.status()))
    }

    /// Finalize the pending merge, or snapshot the draft when there is none.
    pub async fn commit_all(&self, story_id: &str) -> CoreResult<MergeResult> {
        if self.merges.get(story_id).await?.is_some() {
            return self.finalize_merge(story_id).await;
        }
        let snapshot = self.commit_draft(story_id, true).await?;
        let message = match snapshot {
            Some(_) => "committed changes",
            None => "nothing to commit",
        };
        Ok(MergeResult {
            success: true,
            message: message.to_string(),
            conflicts: Vec::new(),
            snapshot_id: snapshot.map(|s| s.id),
            state: MergeState::Idle,
        })
    }

    async fn commit_merge(
        &self,
        story: &mut Story,
        from: &Version,
        into: &mut Version,
        merged: &ContentTree,
        source_content: &str,
    ) -> CoreResult<SnapshotId> {
        let label = format!("merge from {}", from.slug);
        let snapshot = self
            .commit_snapshot(story, into, merged.encode(), Some(label))
            .await?;
        self.repo
            .record_merge_base(&into.id, &from.id, source_content)
            .await?;

        info!(
            story_id = %story.id,
            from = %from.slug,
            into = %into.slug,
            snapshot_id = %snapshot.id,
            "Committed merge"
        );
        self.bus()
            .publish(MergeCommitted {
                story_id: story.id.clone(),
                from_slug: from.slug.clone(),
                into_slug: into.slug.clone(),
                snapshot_id: snapshot.id.to_string(),
            })
            .await;
        Ok(snapshot.id)
    }
}
