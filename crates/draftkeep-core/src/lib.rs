//! Draft persistence and recovery for long-form authoring.
//!
//! This crate provides:
//! - `AutosaveScheduler`: debounced local and remote saves with single-flight remote writes
//! - `ExitGuard`: interception of link, history and unload exits with a forced save
//! - `RecoveryReconciler`: offering a locally persisted draft back at mount
//! - `LocalDraftStore` / `RemoteDraftGateway`: the storage and network seams
//! - `AuthoringSession`: all of the above wired together for one mounted surface

mod document;
mod error;
mod gateway;
mod guard;
mod recovery;
mod scheduler;
mod session;
mod storage;

pub mod test_utils;

pub use document::{DocumentState, LocalDraftRecord, SaveStatus, Snapshot};
pub use error::{DraftError, GatewayError, StoreError};
pub use gateway::{RemoteDraftGateway, SavedDraft};
pub use guard::{
    Destination, ExitGuard, ExitIntent, ExitOutcome, GuardState, Interception, Navigator,
    SafeDestinations,
};
pub use recovery::RecoveryReconciler;
pub use scheduler::{AutosaveScheduler, SaveOutcome};
pub use session::AuthoringSession;
pub use storage::{FileDraftStore, LocalDraftStore, MemoryDraftStore};

// Re-export config types that hosts need to mount a session
pub use draftkeep_common::AutosaveConfig;
