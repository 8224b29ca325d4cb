//! One mounted authoring surface: scheduler, exit guard and recovery wired
//! together over a shared local store.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use draftkeep_common::AutosaveConfig;
use smol_str::SmolStr;
use tokio::sync::watch;

use crate::document::{DocumentState, LocalDraftRecord, SaveStatus};
use crate::error::DraftError;
use crate::gateway::RemoteDraftGateway;
use crate::guard::{ExitGuard, Navigator, SafeDestinations};
use crate::recovery::RecoveryReconciler;
use crate::scheduler::{AutosaveScheduler, SaveOutcome};
use crate::storage::LocalDraftStore;

/// Autosave, exit guard and recovery for one mount.
///
/// Dropping a session cancels its pending autosave timers. Call
/// [`unmount`](Self::unmount) to flush unsaved work first.
pub struct AuthoringSession<S, G, N> {
    scheduler: AutosaveScheduler<Arc<S>, G>,
    guard: ExitGuard<Arc<S>, G, N>,
    recovery: RecoveryReconciler<Arc<S>>,
}

impl<S, G, N> AuthoringSession<S, G, N>
where
    S: LocalDraftStore,
    G: RemoteDraftGateway,
    N: Navigator,
{
    /// Mount the authoring surface for `initial`.
    ///
    /// Runs the recovery check against `initial` and arms the exit guard.
    /// `remote_updated_at` is the server copy's last modification time when
    /// editing an existing draft. Must be called inside a tokio runtime.
    pub fn mount(
        config: &AutosaveConfig,
        store: S,
        gateway: G,
        navigator: N,
        initial: DocumentState,
        remote_updated_at: Option<DateTime<Utc>>,
    ) -> Self {
        let store = Arc::new(store);

        let mut recovery = RecoveryReconciler::new(Arc::clone(&store));
        recovery.check(&initial, remote_updated_at);

        let scheduler = AutosaveScheduler::new(store, gateway, config, initial);
        let mut guard = ExitGuard::new(
            scheduler.clone(),
            navigator,
            SafeDestinations::from_config(config),
        );
        guard.arm();
        tracing::debug!(
            recoverable = recovery.pending().is_some(),
            "authoring session mounted"
        );

        Self {
            scheduler,
            guard,
            recovery,
        }
    }

    /// Current document, including any draft id assigned since mount.
    pub fn document(&self) -> DocumentState {
        self.scheduler.document()
    }

    /// Save indicator.
    pub fn status(&self) -> SaveStatus {
        self.scheduler.status()
    }

    /// Watch the save indicator.
    pub fn subscribe_status(&self) -> watch::Receiver<SaveStatus> {
        self.scheduler.subscribe_status()
    }

    /// Apply an edit to the current document and feed it to autosave.
    pub fn edit(&self, f: impl FnOnce(&mut DocumentState)) {
        let mut doc = self.scheduler.document();
        f(&mut doc);
        self.scheduler.on_document_changed(doc);
    }

    /// Local draft offered for recovery, if the prompt should be shown.
    pub fn pending_recovery(&self) -> Option<&LocalDraftRecord> {
        self.recovery.pending()
    }

    /// Accept the recovery offer. The restored content goes through autosave
    /// like any other edit.
    pub fn recover(&mut self) -> bool {
        let mut doc = self.scheduler.document();
        if !self.recovery.recover(&mut doc) {
            return false;
        }
        self.scheduler.on_document_changed(doc);
        true
    }

    /// Decline the recovery offer.
    pub fn discard_recovery(&mut self) -> bool {
        self.recovery.discard()
    }

    /// Exit guard state, for rendering the confirmation dialog.
    pub fn guard(&self) -> &ExitGuard<Arc<S>, G, N> {
        &self.guard
    }

    /// Exit guard, for reporting navigation events and the user's answer.
    pub fn guard_mut(&mut self) -> &mut ExitGuard<Arc<S>, G, N> {
        &mut self.guard
    }

    /// Underlying autosave scheduler, e.g. for an explicit "save now" control.
    pub fn scheduler(&self) -> &AutosaveScheduler<Arc<S>, G> {
        &self.scheduler
    }

    /// Publish succeeded on the host side; retire the draft.
    pub async fn published(&self, published_id: impl Into<SmolStr>) {
        self.scheduler.complete_publish(published_id).await;
    }

    /// Tear the surface down: cancel both timers and make one final remote
    /// save attempt, whichever way the user left.
    pub async fn unmount(self) -> Result<SaveOutcome, DraftError> {
        let result = self.scheduler.force_save().await;
        match &result {
            Ok(outcome) => tracing::debug!(?outcome, "authoring session unmounted"),
            Err(e) => tracing::warn!(error = %e, "could not save draft on unmount"),
        }
        result
    }
}

impl<S, G, N> Drop for AuthoringSession<S, G, N> {
    fn drop(&mut self) {
        self.scheduler.cancel_timers();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryDraftStore;
    use crate::test_utils::{RecordingGateway, RecordingNavigator};

    fn mount(
        store: MemoryDraftStore,
        initial: DocumentState,
    ) -> (
        AuthoringSession<MemoryDraftStore, Arc<RecordingGateway>, RecordingNavigator>,
        Arc<RecordingGateway>,
    ) {
        let gateway = Arc::new(RecordingGateway::new());
        let session = AuthoringSession::mount(
            &AutosaveConfig::default(),
            store,
            gateway.clone(),
            RecordingNavigator::new(),
            initial,
            None,
        );
        (session, gateway)
    }

    #[tokio::test(start_paused = true)]
    async fn test_edit_keeps_identifiers() {
        let initial = DocumentState::from_remote_draft("d-3", "T", "B", vec![]);
        let (session, _) = mount(MemoryDraftStore::new("s"), initial);
        session.edit(|doc| doc.content.push_str(" more"));

        let doc = session.document();
        assert_eq!(doc.content, "B more");
        assert_eq!(doc.draft_id.as_deref(), Some("d-3"));
        assert_eq!(session.status(), SaveStatus::Unsaved);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recover_feeds_autosave() {
        let store = MemoryDraftStore::new("s");
        let record = DocumentState::new()
            .with_title("Lost")
            .to_local_record(Utc::now());
        store.save(&record).unwrap();

        let (mut session, _) = mount(store, DocumentState::new());
        assert_eq!(session.pending_recovery(), Some(&record));
        assert!(session.recover());
        assert_eq!(session.document().title, "Lost");
        assert!(session.scheduler().has_unsaved_changes());
        assert!(session.pending_recovery().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmount_flushes() {
        let (session, gateway) = mount(MemoryDraftStore::new("s"), DocumentState::new());
        session.edit(|doc| doc.title = "bye".into());

        let outcome = session.unmount().await.unwrap();
        assert!(matches!(outcome, SaveOutcome::Saved { .. }));
        assert_eq!(gateway.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_without_unmount_stops_timers() {
        let store = MemoryDraftStore::new("s");
        let (session, gateway) = mount(store.clone(), DocumentState::new());
        session.edit(|doc| doc.title = "gone".into());
        drop(session);

        tokio::time::advance(std::time::Duration::from_secs(120)).await;
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
        assert_eq!(gateway.calls(), 0);
        assert!(store.load().unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmount_after_publish_writes_nothing() {
        let (session, gateway) = mount(MemoryDraftStore::new("s"), DocumentState::new());
        session.edit(|doc| doc.title = "to publish".into());
        session.scheduler().force_save().await.unwrap();
        session.published("post-9").await;

        assert_eq!(session.unmount().await.unwrap(), SaveOutcome::Retired);
        assert_eq!(gateway.calls(), 1);
        assert_eq!(gateway.deleted(), vec![SmolStr::new("draft-1")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmount_untouched_published_document() {
        let initial = DocumentState::editing_published("post-1", "Live", "text", vec![]);
        let (session, gateway) = mount(MemoryDraftStore::new("s"), initial);

        assert_eq!(session.unmount().await.unwrap(), SaveOutcome::Unchanged);
        assert_eq!(gateway.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mount_arms_guard() {
        let gateway = Arc::new(RecordingGateway::new());
        let navigator = RecordingNavigator::new();
        let _session = AuthoringSession::mount(
            &AutosaveConfig::default(),
            MemoryDraftStore::new("s"),
            gateway,
            navigator.clone(),
            DocumentState::new(),
            None,
        );
        assert_eq!(navigator.events(), vec![crate::test_utils::NavEvent::Sentinel]);
    }
}
