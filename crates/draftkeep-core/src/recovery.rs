//! Offers a locally persisted draft back to the user at session start.
//!
//! Runs exactly once per mount, before any edit can reach the autosave
//! timers. Later divergence is the scheduler's business, not recovery's.

use chrono::{DateTime, Utc};

use crate::document::{DocumentState, LocalDraftRecord};
use crate::storage::LocalDraftStore;

pub struct RecoveryReconciler<S> {
    store: S,
    pending: Option<LocalDraftRecord>,
    checked: bool,
}

impl<S: LocalDraftStore> RecoveryReconciler<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            pending: None,
            checked: false,
        }
    }

    /// Look for a recoverable draft.
    ///
    /// A record is offered unless it matches `current` already, or the
    /// server copy (`remote_updated_at`) is at least as new as it. Corrupt or
    /// unreadable records are treated as absent. Only the first call per
    /// reconciler reads the store.
    pub fn check(
        &mut self,
        current: &DocumentState,
        remote_updated_at: Option<DateTime<Utc>>,
    ) -> Option<&LocalDraftRecord> {
        if self.checked {
            return self.pending.as_ref();
        }
        self.checked = true;

        let record = match self.store.load() {
            Ok(Some(record)) => record,
            Ok(None) => {
                tracing::debug!("no local draft to recover");
                return None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "could not read local draft, skipping recovery");
                return None;
            }
        };

        if record.snapshot() == current.snapshot() {
            tracing::debug!("local draft matches loaded document");
            return None;
        }
        if remote_updated_at.is_some_and(|remote| remote >= record.saved_at) {
            tracing::debug!(saved_at = %record.saved_at, "server copy is newer than local draft");
            return None;
        }

        tracing::info!(
            saved_at = %record.saved_at,
            title = %record.title,
            "recoverable local draft found"
        );
        self.pending = Some(record);
        self.pending.as_ref()
    }

    /// Record awaiting a decision, for rendering the recovery prompt.
    pub fn pending(&self) -> Option<&LocalDraftRecord> {
        self.pending.as_ref()
    }

    pub fn has_checked(&self) -> bool {
        self.checked
    }

    /// Restore the pending record into `doc`, adopting its draft id when it
    /// has one so saves continue the same remote draft.
    ///
    /// Returns false when nothing was pending.
    pub fn recover(&mut self, doc: &mut DocumentState) -> bool {
        let Some(record) = self.pending.take() else {
            return false;
        };
        doc.title = record.title;
        doc.content = record.content;
        doc.tags = record.tags;
        if record.draft_id.is_some() {
            doc.draft_id = record.draft_id;
        }
        tracing::info!(draft_id = ?doc.draft_id, "local draft recovered");
        true
    }

    /// Drop the pending record and delete it from storage.
    ///
    /// A slot that was overwritten since the record was offered belongs to the
    /// current session and is left alone. Returns false when nothing was
    /// pending.
    pub fn discard(&mut self) -> bool {
        let Some(offered) = self.pending.take() else {
            return false;
        };
        match self.store.load() {
            Ok(Some(stored)) if stored != offered => {
                tracing::debug!("local draft rewritten since it was offered, keeping it");
            }
            _ => {
                if let Err(e) = self.store.clear() {
                    tracing::warn!(error = %e, "could not delete discarded local draft");
                }
            }
        }
        tracing::info!("local draft discarded");
        true
    }
}
