//! Event bus for inter-component communication.
//!
//! The event bus provides a publish/subscribe mechanism so observers (a UI
//! shell, a sync agent, tests) can follow story changes without coupling to
//! the engines. Publishing never fails the operation that triggered it.
//!
//! # Example
//!
//! ```ignore
//! let bus = Bus::new();
//!
//! let mut rx = bus.subscribe::<VersionSwitched>().await;
//! tokio::spawn(async move {
//!     while let Ok(event) = rx.recv().await {
//!         println!("Now on version {}", event.version_id);
//!     }
//! });
//! ```

use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::RwLock;

/// Default channel capacity.
const DEFAULT_CAPACITY: usize = 256;

/// Trait for events that can be published on the bus.
pub trait Event: Clone + Send + Sync + 'static {
    /// Event type name for serialization/logging.
    fn event_type() -> &'static str;
}

/// The event bus for pub/sub communication.
#[derive(Clone)]
pub struct Bus {
    inner: Arc<BusInner>,
}

struct BusInner {
    /// Typed channels by TypeId.
    channels: RwLock<HashMap<TypeId, Box<dyn Any + Send + Sync>>>,
    /// Wildcard subscribers (receive all events as JSON).
    wildcard: broadcast::Sender<BusEvent>,
}

/// A serialized event for wildcard subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusEvent {
    /// Event type name.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event payload as JSON.
    pub payload: serde_json::Value,
}

impl Bus {
    /// Create a new event bus.
    pub fn new() -> Self {
        let (wildcard, _) = broadcast::channel(DEFAULT_CAPACITY);
        Self {
            inner: Arc::new(BusInner {
                channels: RwLock::new(HashMap::new()),
                wildcard,
            }),
        }
    }

    /// Publish an event to all subscribers.
    pub async fn publish<E: Event + Serialize>(&self, event: E) {
        let type_id = TypeId::of::<E>();

        let channels = self.inner.channels.read().await;
        if let Some(sender) = channels.get(&type_id) {
            if let Some(tx) = sender.downcast_ref::<broadcast::Sender<E>>() {
                // No receivers is fine
                let _ = tx.send(event.clone());
            }
        }
        drop(channels);

        if let Ok(payload) = serde_json::to_value(&event) {
            let bus_event = BusEvent {
                event_type: E::event_type().to_string(),
                payload,
            };
            let _ = self.inner.wildcard.send(bus_event);
        }
    }

    /// Subscribe to events of type E.
    pub async fn subscribe<E: Event>(&self) -> broadcast::Receiver<E> {
        let type_id = TypeId::of::<E>();

        {
            let channels = self.inner.channels.read().await;
            if let Some(sender) = channels.get(&type_id) {
                if let Some(tx) = sender.downcast_ref::<broadcast::Sender<E>>() {
                    return tx.subscribe();
                }
            }
        }

        let mut channels = self.inner.channels.write().await;
        // Another subscriber may have raced us here
        if let Some(tx) = channels
            .get(&type_id)
            .and_then(|sender| sender.downcast_ref::<broadcast::Sender<E>>())
        {
            return tx.subscribe();
        }
        let (tx, rx) = broadcast::channel::<E>(DEFAULT_CAPACITY);
        channels.insert(type_id, Box::new(tx));
        rx
    }

    /// Subscribe to all events (wildcard).
    pub fn subscribe_all(&self) -> broadcast::Receiver<BusEvent> {
        self.inner.wildcard.subscribe()
    }
}

impl Default for Bus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Bus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bus").finish_non_exhaustive()
    }
}

// ============================================================================
// Story Events
// ============================================================================

/// Story created event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryCreated {
    pub story_id: String,
    pub title: String,
}

impl Event for StoryCreated {
    fn event_type() -> &'static str {
        "story.created"
    }
}

/// Version (or variation) created event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionCreated {
    pub story_id: String,
    pub version_id: String,
    pub slug: String,
    pub parent_slug: Option<String>,
}

impl Event for VersionCreated {
    fn event_type() -> &'static str {
        "version.created"
    }
}

/// The active version or snapshot changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionSwitched {
    pub story_id: String,
    pub version_id: String,
    pub snapshot_id: Option<String>,
}

impl Event for VersionSwitched {
    fn event_type() -> &'static str {
        "version.switched"
    }
}

/// Version deleted event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionDeleted {
    pub story_id: String,
    pub version_id: String,
    pub snapshots_removed: usize,
}

impl Event for VersionDeleted {
    fn event_type() -> &'static str {
        "version.deleted"
    }
}

/// Snapshot created event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotCreated {
    pub story_id: String,
    pub version_id: String,
    pub snapshot_id: String,
    pub seq: u64,
}

impl Event for SnapshotCreated {
    fn event_type() -> &'static str {
        "snapshot.created"
    }
}

/// A merge was committed to the target version.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeCommitted {
    pub story_id: String,
    pub from_slug: String,
    pub into_slug: String,
    pub snapshot_id: String,
}

impl Event for MergeCommitted {
    fn event_type() -> &'static str {
        "merge.committed"
    }
}

/// A pending merge was abandoned.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeAborted {
    pub story_id: String,
    pub from_slug: String,
    pub into_slug: String,
}

impl Event for MergeAborted {
    fn event_type() -> &'static str {
        "merge.aborted"
    }
}
