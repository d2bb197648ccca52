//! Publish orchestration.
//!
//! This crate provides:
//! - The post store: the authoritative, transition-checked record of every
//!   scheduled publish job, with the queue derived from status
//! - The scheduler: drains the queue one post at a time through render,
//!   upload initiation and status polling
//! - Platform adapters owning each destination's credential refresh and
//!   async publish protocol
//! - Snapshot persistence and the `clipcast-publishd` daemon

pub mod adapters;
pub mod config;
pub mod credentials;
pub mod error;
pub mod events;
pub mod project;
pub mod render;
pub mod retry;
pub mod scheduler;
pub mod snapshot;
pub mod store;

pub use adapters::{AdapterRegistry, ExternalJobId, PlatformAdapter, PollOutcome};
pub use config::{DaemonConfig, PlatformSettings, RenderServiceConfig, SchedulerConfig};
pub use credentials::{
    AccountMeta, CredentialStore, JsonFileCredentialStore, MemoryCredentialStore, StoredCredential,
    CREDENTIAL_REFRESH_THRESHOLD,
};
pub use error::{PublishError, PublishResult};
pub use events::PublishEvent;
pub use project::{ClipEntry, ClipProject, ClipSource, ProjectLibrary};
pub use render::{ClipRenderer, HttpRenderService, RenderedMedia};
pub use scheduler::PublishScheduler;
pub use store::{PublishStore, RunSummary};
