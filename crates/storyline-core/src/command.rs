//! Command surface for the UI layer.
//!
//! Commands are invoked by name with a JSON payload (camelCase fields) and
//! answer with JSON, mirroring a Tauri `invoke` boundary. The `git_*`
//! commands keep the legacy branch vocabulary: `repoPath` carries the story
//! id and branches are variation slugs.

use crate::error::{CoreError, ErrorKind};
use crate::library::Library;
use crate::merge::Resolution;
use crate::variation::UnsavedChanges;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::sync::Arc;
use storyline_snapshot::SnapshotId;
use storyline_storage::Storage;
use thiserror::Error;
use tracing::debug;

/// Every command the router answers.
pub const COMMANDS: [&str; 23] = [
    "create_story",
    "get_story",
    "list_stories",
    "list_story_versions",
    "create_story_version",
    "switch_story_version",
    "rename_story_version",
    "delete_story_version",
    "list_story_snapshots",
    "switch_story_snapshot",
    "create_story_snapshot",
    "update_snapshot_content",
    "diff_story_snapshots",
    "git_list_branches",
    "git_create_branch",
    "git_checkout_branch",
    "git_delete_branch",
    "git_diff_branches",
    "git_merge_branches",
    "git_resolve_conflict",
    "git_commit_all",
    "git_abort_merge",
    "git_merge_status",
];

/// Errors returned across the command boundary.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl CommandError {
    /// Stable machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownCommand(_) => "unknown_command",
            Self::InvalidPayload(_) => "invalid_payload",
            Self::Core(e) => match e.kind() {
                ErrorKind::NotFound => "not_found",
                ErrorKind::InvalidOperation => "invalid_operation",
                ErrorKind::InvalidArgument => "invalid_argument",
                ErrorKind::Conflict => "conflict",
                ErrorKind::Internal => "internal",
            },
        }
    }
}

impl Serialize for CommandError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Wire<'a> {
            kind: &'a str,
            message: String,
        }
        Wire {
            kind: self.kind(),
            message: self.to_string(),
        }
        .serialize(serializer)
    }
}

// ============================================================================
// Payloads
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateStory {
    title: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoryRef {
    story_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VersionRef {
    version_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateVersion {
    story_id: String,
    name: String,
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwitchVersion {
    story_id: String,
    version_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RenameVersion {
    version_id: String,
    new_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SwitchSnapshot {
    story_id: String,
    snapshot_id: SnapshotId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSnapshot {
    version_id: String,
    content: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateContent {
    story_id: String,
    content: String,
    word_count: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiffSnapshots {
    from_snapshot_id: SnapshotId,
    to_snapshot_id: SnapshotId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepoRef {
    repo_path: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateBranch {
    repo_path: String,
    name: String,
    #[serde(default)]
    parent: Option<String>,
    #[serde(default)]
    at_snapshot: Option<SnapshotId>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckoutBranch {
    repo_path: String,
    branch: String,
    #[serde(default)]
    unsaved: UnsavedChanges,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BranchRef {
    repo_path: String,
    branch: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiffBranches {
    repo_path: String,
    from: String,
    to: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MergeBranches {
    repo_path: String,
    from_branch: String,
    into_branch: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResolveConflict {
    repo_path: String,
    file_path: String,
    /// `true` keeps the incoming (source) side.
    take_theirs: bool,
}

fn parse<T: DeserializeOwned>(payload: Value) -> Result<T, CommandError> {
    serde_json::from_value(payload).map_err(|e| CommandError::InvalidPayload(e.to_string()))
}

fn reply<T: Serialize>(value: T) -> Result<Value, CommandError> {
    serde_json::to_value(value).map_err(|e| CommandError::Core(CoreError::Json(e)))
}

/// Dispatches named commands to a library.
pub struct CommandRouter<S: Storage> {
    library: Arc<Library<S>>,
}

impl<S: Storage> CommandRouter<S> {
    pub fn new(library: Arc<Library<S>>) -> Self {
        Self { library }
    }

    pub fn library(&self) -> &Library<S> {
        &self.library
    }

    /// Run one command.
    pub async fn invoke(&self, name: &str, payload: Value) -> Result<Value, CommandError> {
        debug!(command = %name, "Invoking command");
        let library = &self.library;

        match name {
            "create_story" => {
                let p: CreateStory = parse(payload)?;
                reply(library.create_story(&p.title, p.content).await?)
            }
            "get_story" => {
                let p: StoryRef = parse(payload)?;
                reply(library.get_story(&p.story_id).await?)
            }
            "list_stories" => reply(library.list_stories().await?),
            "list_story_versions" => {
                let p: StoryRef = parse(payload)?;
                reply(library.list_versions(&p.story_id).await?)
            }
            "create_story_version" => {
                let p: CreateVersion = parse(payload)?;
                reply(library.create_version(&p.story_id, &p.name, p.content).await?)
            }
            "switch_story_version" => {
                let p: SwitchVersion = parse(payload)?;
                reply(library.switch_version(&p.story_id, &p.version_id).await?)
            }
            "rename_story_version" => {
                let p: RenameVersion = parse(payload)?;
                library.rename_version(&p.version_id, &p.new_name).await?;
                Ok(Value::Null)
            }
            "delete_story_version" => {
                let p: VersionRef = parse(payload)?;
                library.delete_version(&p.version_id).await?;
                Ok(Value::Null)
            }
            "list_story_snapshots" => {
                let p: VersionRef = parse(payload)?;
                reply(library.list_snapshots(&p.version_id).await?)
            }
            "switch_story_snapshot" => {
                let p: SwitchSnapshot = parse(payload)?;
                reply(library.switch_snapshot(&p.story_id, &p.snapshot_id).await?)
            }
            "create_story_snapshot" => {
                let p: CreateSnapshot = parse(payload)?;
                reply(library.create_snapshot(&p.version_id, p.content).await?)
            }
            "update_snapshot_content" => {
                let p: UpdateContent = parse(payload)?;
                library
                    .update_snapshot_content(&p.story_id, p.content, p.word_count)
                    .await?;
                Ok(Value::Null)
            }
            "diff_story_snapshots" => {
                let p: DiffSnapshots = parse(payload)?;
                reply(
                    library
                        .diff_snapshots(&p.from_snapshot_id, &p.to_snapshot_id)
                        .await?,
                )
            }
            "git_list_branches" => {
                let p: RepoRef = parse(payload)?;
                reply(library.list_variations(&p.repo_path).await?)
            }
            "git_create_branch" => {
                let p: CreateBranch = parse(payload)?;
                reply(
                    library
                        .create_variation(
                            &p.repo_path,
                            &p.name,
                            p.parent.as_deref(),
                            p.at_snapshot.as_ref(),
                        )
                        .await?,
                )
            }
            "git_checkout_branch" => {
                let p: CheckoutBranch = parse(payload)?;
                reply(
                    library
                        .switch_variation(&p.repo_path, &p.branch, p.unsaved)
                        .await?,
                )
            }
            "git_delete_branch" => {
                let p: BranchRef = parse(payload)?;
                library.delete_variation(&p.repo_path, &p.branch).await?;
                Ok(Value::Null)
            }
            "git_diff_branches" => {
                let p: DiffBranches = parse(payload)?;
                reply(library.diff_variations(&p.repo_path, &p.from, &p.to).await?)
            }
            "git_merge_branches" => {
                let p: MergeBranches = parse(payload)?;
                reply(
                    library
                        .attempt_merge(&p.repo_path, &p.from_branch, &p.into_branch)
                        .await?,
                )
            }
            "git_resolve_conflict" => {
                let p: ResolveConflict = parse(payload)?;
                let resolution = if p.take_theirs {
                    Resolution::KeepSource
                } else {
                    Resolution::KeepTarget
                };
                library
                    .resolve_conflict_unit(&p.repo_path, &p.file_path, resolution)
                    .await?;
                Ok(Value::Null)
            }
            "git_commit_all" => {
                let p: RepoRef = parse(payload)?;
                reply(library.commit_all(&p.repo_path).await?)
            }
            "git_abort_merge" => {
                let p: RepoRef = parse(payload)?;
                library.abort_merge(&p.repo_path).await?;
                Ok(Value::Null)
            }
            "git_merge_status" => {
                let p: RepoRef = parse(payload)?;
                reply(library.merge_status(&p.repo_path).await?)
            }
            other => Err(CommandError::UnknownCommand(other.to_string())),
        }
    }
}
