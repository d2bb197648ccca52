//! Events emitted by the publish store.

use serde::Serialize;

use clipcast_models::{PostId, PostStatusView};

/// Broadcast event describing a store change.
///
/// Consumers (UI bridges, the snapshot writer) subscribe via
/// `PublishStore::subscribe`; a slow consumer only loses events, it never
/// blocks a mutator.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PublishEvent {
    /// A post was created or changed; carries its current status view
    PostChanged { post: PostStatusView },

    /// A post was removed from the store
    PostRemoved { id: PostId },

    /// The queue drained: nothing queued and nothing in flight
    RunCompleted { completed: usize, failed: usize },
}
