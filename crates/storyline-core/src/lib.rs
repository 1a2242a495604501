//! Core engine for storyline.
//!
//! This crate provides story versioning and variation management:
//! - Versions with append-only snapshot histories and retention
//! - Automatic snapshots driven by editor activity
//! - Variations (branches) with slugs, lineage and unit-level diffs
//! - Three-way merges with explicit per-unit conflict resolution
//! - Configuration management (multi-source, JSONC support)
//! - Event bus and a named-command surface for the UI layer

pub mod autosnapshot;
pub mod bus;
pub mod command;
pub mod config;
pub mod content;
pub mod document;
pub mod error;
pub mod library;
pub mod lock;
pub mod merge;
pub mod story;
pub mod variation;
pub mod version;

pub use autosnapshot::{edit_delta, AutoSnapshotPolicy, EditSession};
pub use bus::{Bus, BusEvent, Event};
pub use command::{CommandError, CommandRouter, COMMANDS};
pub use config::{Config, SnapshotTrigger, VersioningConfig, VersioningSettings};
pub use content::{ChangeStatus, ContentTree, UnitChange};
pub use document::{Node, Visitor, EMPTY_DOCUMENT};
pub use error::{ConfigError, CoreError, CoreResult, ErrorKind};
pub use library::Library;
pub use lock::StoryLocks;
pub use merge::{ConflictStatus, MergeResult, MergeState, MergeStatus, Resolution};
pub use story::{MergeBase, Story, StoryRepository, Version, ORIGINAL_SLUG};
pub use variation::{DiffResult, UnsavedChanges, VariationInfo};

pub use storyline_snapshot::{Snapshot, SnapshotId};
