//! Dual-tier autosave.
//!
//! Every edit restarts two debounce timers. The short one writes the local
//! draft slot; the long one writes the remote draft through the gateway.
//! Remote writes are single-flight: a tick or forced save that arrives while
//! one is outstanding is dropped, never queued, since the next opportunity
//! carries the latest document anyway.
//!
//! Timers are spawned tokio tasks, so the scheduler must be driven from
//! inside a tokio runtime.

use std::pin::pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use draftkeep_common::AutosaveConfig;
use smol_str::SmolStr;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;

use crate::document::{DocumentState, SaveStatus, Snapshot};
use crate::error::{DraftError, GatewayError};
use crate::gateway::RemoteDraftGateway;
use crate::storage::LocalDraftStore;

/// What a remote save attempt ended up doing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The gateway accepted the document.
    Saved { draft_id: SmolStr },
    /// Nothing changed since the last remote write.
    Unchanged,
    /// Blank document with no remote draft yet; nothing was created.
    Empty,
    /// Another remote write was outstanding; this request was dropped.
    InFlight,
    /// The document was published; autosave no longer writes anywhere.
    Retired,
}

/// One cancellable delayed task per tier.
///
/// The generation counter lets a timer that already woke up notice it was
/// superseded before it takes the state lock.
#[derive(Default)]
struct TimerSlot {
    handle: Option<JoinHandle<()>>,
    generation: u64,
}

impl TimerSlot {
    fn cancel(&mut self) -> bool {
        self.generation = self.generation.wrapping_add(1);
        match self.handle.take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation == generation
    }
}

struct SchedulerState {
    current: DocumentState,
    last_local: Option<Snapshot>,
    last_remote: Option<Snapshot>,
    in_flight: bool,
    local_timer: TimerSlot,
    remote_timer: TimerSlot,
    last_saved_at: Option<DateTime<Utc>>,
    /// Set once publishing completes.
    retired: bool,
}

struct Shared<S, G> {
    store: S,
    gateway: G,
    local_debounce: Duration,
    remote_debounce: Duration,
    state: Mutex<SchedulerState>,
    status: watch::Sender<SaveStatus>,
    settled: Notify,
}

impl<S, G> Shared<S, G> {
    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_status(&self, status: SaveStatus) {
        self.status.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
    }
}

/// Clears the in-flight flag if a remote write is abandoned mid-await.
struct FlightGuard<'a, S, G> {
    shared: &'a Shared<S, G>,
    armed: bool,
}

impl<S, G> Drop for FlightGuard<'_, S, G> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        {
            let mut state = self.shared.lock();
            state.in_flight = false;
        }
        self.shared.set_status(SaveStatus::Unsaved);
        self.shared.settled.notify_waiters();
        tracing::debug!("remote draft write abandoned before settling");
    }
}

/// Autosave scheduler bound to one authoring session.
///
/// Cheap to clone; clones drive the same state.
pub struct AutosaveScheduler<S, G> {
    shared: Arc<Shared<S, G>>,
}

impl<S, G> Clone for AutosaveScheduler<S, G> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S, G> AutosaveScheduler<S, G> {
    /// Cancel both pending timers without saving.
    ///
    /// A remote write already in flight is left to finish.
    pub fn cancel_timers(&self) {
        let mut state = self.shared.lock();
        let local = state.local_timer.cancel();
        let remote = state.remote_timer.cancel();
        if local || remote {
            tracing::debug!(local, remote, "autosave timers cancelled");
        }
    }
}

impl<S, G> AutosaveScheduler<S, G>
where
    S: LocalDraftStore,
    G: RemoteDraftGateway,
{
    /// Create a scheduler for a freshly mounted document.
    ///
    /// A document hydrated from the server (it has a draft or published id)
    /// counts as already saved remotely, so leaving it untouched never
    /// triggers a write.
    pub fn new(store: S, gateway: G, config: &AutosaveConfig, initial: DocumentState) -> Self {
        let snapshot = initial.snapshot();
        let hydrated = initial.draft_id.is_some() || initial.published_id.is_some();
        let state = SchedulerState {
            last_local: Some(snapshot.clone()),
            last_remote: hydrated.then_some(snapshot),
            current: initial,
            in_flight: false,
            local_timer: TimerSlot::default(),
            remote_timer: TimerSlot::default(),
            last_saved_at: None,
            retired: false,
        };
        let (status, _) = watch::channel(SaveStatus::Saved);

        Self {
            shared: Arc::new(Shared {
                store,
                gateway,
                local_debounce: config.local_debounce,
                remote_debounce: config.remote_debounce,
                state: Mutex::new(state),
                status,
                settled: Notify::new(),
            }),
        }
    }

    /// Current save indicator.
    pub fn status(&self) -> SaveStatus {
        *self.shared.status.borrow()
    }

    /// Subscribe to save indicator changes.
    pub fn subscribe_status(&self) -> watch::Receiver<SaveStatus> {
        self.shared.status.subscribe()
    }

    /// Time of the last successful write to either tier.
    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        self.shared.lock().last_saved_at
    }

    /// The document as the scheduler currently sees it, including any draft
    /// id assigned by the server.
    pub fn document(&self) -> DocumentState {
        self.shared.lock().current.clone()
    }

    /// True while a remote write is outstanding.
    pub fn is_saving(&self) -> bool {
        self.shared.lock().in_flight
    }

    /// True when leaving now could lose work that has not reached the remote store.
    pub fn has_unsaved_changes(&self) -> bool {
        let state = self.shared.lock();
        if state.retired || (state.current.is_blank() && state.current.draft_id.is_none()) {
            return false;
        }
        state.last_remote.as_ref() != Some(&state.current.snapshot())
    }

    /// Feed the latest document. Call on every meaningful edit.
    ///
    /// Identifiers missing from `doc` are carried over from the scheduler's
    /// copy, so editors may pass plain title/content/tags updates.
    pub fn on_document_changed(&self, mut doc: DocumentState) {
        let mut state = self.shared.lock();
        if doc.draft_id.is_none() {
            doc.draft_id = state.current.draft_id.clone();
        }
        if doc.published_id.is_none() {
            doc.published_id = state.current.published_id.clone();
        }
        let snapshot = doc.snapshot();
        state.current = doc;

        if state.retired {
            return;
        }
        if state.last_local.as_ref() == Some(&snapshot) {
            // Back to what the local tier holds; a pending local write has nothing to add.
            state.local_timer.cancel();
            if !state.in_flight {
                self.shared.set_status(SaveStatus::Saved);
            }
            return;
        }

        self.shared.set_status(SaveStatus::Unsaved);
        self.arm_local(&mut state);
        self.arm_remote(&mut state);
    }

    fn arm_local(&self, state: &mut SchedulerState) {
        state.local_timer.cancel();
        if state.current.is_published() {
            // Published records have their own save path; only the remote tier runs.
            return;
        }
        let generation = state.local_timer.generation;
        let delay = self.shared.local_debounce;
        let this = self.clone();
        state.local_timer.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            this.on_local_timer(generation);
        }));
        tracing::trace!(delay_ms = delay.as_millis() as u64, "local autosave armed");
    }

    fn arm_remote(&self, state: &mut SchedulerState) {
        state.remote_timer.cancel();
        let generation = state.remote_timer.generation;
        let delay = self.shared.remote_debounce;
        let this = self.clone();
        state.remote_timer.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            this.on_remote_timer(generation).await;
        }));
        tracing::trace!(delay_ms = delay.as_millis() as u64, "remote autosave armed");
    }

    fn on_local_timer(&self, generation: u64) {
        let mut state = self.shared.lock();
        if !state.local_timer.is_current(generation) {
            return;
        }
        state.local_timer.handle = None;
        self.write_local(&mut state);
    }

    /// Write the current document to the local slot. Failures are logged and
    /// swallowed; the remote tier remains the durability backstop.
    fn write_local(&self, state: &mut SchedulerState) {
        if state.current.is_published() {
            return;
        }
        let now = Utc::now();
        let record = state.current.to_local_record(now);
        match self.shared.store.save(&record) {
            Ok(()) => {
                state.last_local = Some(record.snapshot());
                state.last_saved_at = Some(now);
                if !state.in_flight {
                    self.shared.set_status(SaveStatus::Saved);
                }
                tracing::debug!(title = %record.title, "draft written to local storage");
            }
            Err(e) => {
                tracing::warn!(error = %e, "local draft write failed");
            }
        }
    }

    async fn on_remote_timer(&self, generation: u64) {
        {
            let mut state = self.shared.lock();
            if !state.remote_timer.is_current(generation) {
                return;
            }
            // Detach from the slot so cancelling timers never aborts a write in flight.
            state.remote_timer.handle = None;
        }
        if let Err(e) = self.save_remote().await {
            tracing::debug!(error = %e, "autosave will retry on the next edit or forced save");
        }
    }

    /// Shared remote-save routine used by the timer and [`force_save`](Self::force_save).
    async fn save_remote(&self) -> Result<SaveOutcome, DraftError> {
        let (doc, snapshot) = {
            let mut state = self.shared.lock();
            if state.retired {
                tracing::debug!("document published, remote autosave retired");
                return Ok(SaveOutcome::Retired);
            }
            if state.in_flight {
                tracing::debug!("remote draft write already in flight, dropping request");
                return Ok(SaveOutcome::InFlight);
            }
            let doc = state.current.clone();
            if doc.is_blank() && doc.draft_id.is_none() {
                tracing::debug!("blank document without a remote draft, skipping");
                return Ok(SaveOutcome::Empty);
            }
            let snapshot = doc.snapshot();
            let has_remote = doc.draft_id.is_some() || doc.published_id.is_some();
            if has_remote && state.last_remote.as_ref() == Some(&snapshot) {
                tracing::debug!("document unchanged since last remote write");
                return Ok(SaveOutcome::Unchanged);
            }
            state.in_flight = true;
            self.shared.set_status(SaveStatus::Saving);
            (doc, snapshot)
        };

        let mut flight = FlightGuard {
            shared: &self.shared,
            armed: true,
        };
        let result = self.shared.gateway.create_or_update_draft(&doc).await;
        flight.armed = false;

        let outcome = {
            let mut state = self.shared.lock();
            state.in_flight = false;
            match result {
                Ok(saved) => {
                    let now = Utc::now();
                    state.current.draft_id = Some(saved.draft_id.clone());
                    let current_matches = state.current.snapshot() == snapshot;
                    state.last_remote = Some(snapshot.clone());
                    state.last_local = Some(snapshot);
                    state.last_saved_at = Some(now);
                    self.shared.set_status(if current_matches {
                        SaveStatus::Saved
                    } else {
                        SaveStatus::Unsaved
                    });
                    // The local copy is redundant once the remote one matches it.
                    // Keep it when newer edits landed during the write.
                    if !doc.is_published() && current_matches {
                        if let Err(e) = self.shared.store.clear() {
                            tracing::warn!(error = %e, "could not clear local draft after remote save");
                        }
                    }
                    tracing::info!(draft_id = %saved.draft_id, "draft saved remotely");
                    Ok(SaveOutcome::Saved {
                        draft_id: saved.draft_id,
                    })
                }
                Err(e) => {
                    self.shared.set_status(SaveStatus::Unsaved);
                    tracing::warn!(error = %e, "remote draft save failed");
                    Err(DraftError::Gateway(e))
                }
            }
        };
        self.shared.settled.notify_waiters();
        outcome
    }

    /// Wait until no remote write is outstanding.
    async fn wait_for_flight(&self) {
        loop {
            let mut notified = pin!(self.shared.settled.notified());
            notified.as_mut().enable();
            if !self.shared.lock().in_flight {
                return;
            }
            notified.await;
        }
    }

    /// Cancel both timers and run the remote save now.
    ///
    /// Resolves once the attempt has settled. When a write is already in
    /// flight this waits for it and reports [`SaveOutcome::InFlight`] without
    /// issuing a second one. A pending local write is flushed first so a
    /// failed remote attempt still leaves the latest edit on disk.
    pub async fn force_save(&self) -> Result<SaveOutcome, DraftError> {
        let in_flight = {
            let mut state = self.shared.lock();
            if state.local_timer.cancel() {
                self.write_local(&mut state);
            }
            state.remote_timer.cancel();
            state.in_flight
        };
        if in_flight {
            tracing::debug!("forced save waiting on the write already in flight");
            self.wait_for_flight().await;
            return Ok(SaveOutcome::InFlight);
        }
        self.save_remote().await
    }

    /// Fire a remote save without waiting for it.
    ///
    /// For teardown paths (tab close, reload) where nothing can be awaited.
    /// The write may not finish before the host goes away.
    pub fn save_in_background(&self) {
        let this = self.clone();
        tokio::spawn(async move {
            if let Err(e) = this.save_remote().await {
                tracing::debug!(error = %e, "background draft save failed");
            }
        });
    }

    /// Cancel both timers and delete the local draft slot.
    pub fn clear_autosave(&self) {
        {
            let mut state = self.shared.lock();
            state.local_timer.cancel();
            state.remote_timer.cancel();
            state.last_local = Some(state.current.snapshot());
        }
        if let Err(e) = self.shared.store.clear() {
            tracing::warn!(error = %e, "could not clear local draft");
        }
        tracing::debug!("autosave cleared");
    }

    /// Finish a publish: stop autosaving, mark the document as published and
    /// delete the remote draft it was saved into.
    ///
    /// Afterwards edits are still tracked but neither tier is written again;
    /// remote saves report [`SaveOutcome::Retired`].
    pub async fn complete_publish(&self, published_id: impl Into<SmolStr>) {
        let published_id = published_id.into();
        self.wait_for_flight().await;
        self.clear_autosave();

        let draft_id = {
            let mut state = self.shared.lock();
            state.retired = true;
            state.current.published_id = Some(published_id.clone());
            let draft_id = state.current.draft_id.take();
            let snapshot = state.current.snapshot();
            state.last_remote = Some(snapshot.clone());
            state.last_local = Some(snapshot);
            state.last_saved_at = Some(Utc::now());
            self.shared.set_status(SaveStatus::Saved);
            draft_id
        };
        tracing::info!(published_id = %published_id, "document published");

        let Some(draft_id) = draft_id else {
            return;
        };
        match self.shared.gateway.delete_draft(&draft_id).await {
            Ok(()) => tracing::debug!(draft_id = %draft_id, "remote draft deleted after publish"),
            Err(GatewayError::NotFound(_)) => {
                tracing::debug!(draft_id = %draft_id, "remote draft already gone")
            }
            Err(e) => {
                tracing::warn!(draft_id = %draft_id, error = %e, "failed to delete remote draft after publish")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::storage::MemoryDraftStore;
    use crate::test_utils::{CountingStore, RecordingGateway};

    const LOCAL: Duration = Duration::from_secs(5);
    const REMOTE: Duration = Duration::from_secs(60);

    type TestScheduler = AutosaveScheduler<Arc<CountingStore>, Arc<RecordingGateway>>;

    fn scheduler(
        initial: DocumentState,
    ) -> (TestScheduler, Arc<CountingStore>, Arc<RecordingGateway>) {
        let store = Arc::new(CountingStore::new(MemoryDraftStore::new("test")));
        let gateway = Arc::new(RecordingGateway::new());
        let scheduler = AutosaveScheduler::new(
            store.clone(),
            gateway.clone(),
            &AutosaveConfig::default(),
            initial,
        );
        (scheduler, store, gateway)
    }

    /// Let spawned timer tasks observe the advanced clock.
    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    async fn advance(by: Duration) {
        tokio::time::advance(by).await;
        settle().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_collapses_into_one_local_write() {
        let (scheduler, store, _) = scheduler(DocumentState::new());

        for i in 0..10 {
            scheduler.on_document_changed(DocumentState::new().with_title(format!("t{i}")));
            advance(Duration::from_secs(1)).await;
        }
        assert_eq!(store.saves(), 0);
        assert_eq!(scheduler.status(), SaveStatus::Unsaved);

        advance(LOCAL).await;
        assert_eq!(store.saves(), 1);
        assert_eq!(store.load().unwrap().unwrap().title, "t9");
        assert_eq!(scheduler.status(), SaveStatus::Saved);
        assert!(scheduler.last_saved_at().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_collapses_into_one_remote_write() {
        let (scheduler, store, gateway) = scheduler(DocumentState::new());

        for i in 0..5 {
            scheduler.on_document_changed(DocumentState::new().with_content(format!("body {i}")));
            advance(Duration::from_secs(30)).await;
        }
        assert_eq!(gateway.calls(), 0);

        advance(REMOTE).await;
        assert_eq!(gateway.calls(), 1);
        assert_eq!(gateway.last_doc().unwrap().content, "body 4");
        assert_eq!(scheduler.document().draft_id.as_deref(), Some("draft-1"));
        assert!(store.load().unwrap().is_none());
        assert_eq!(scheduler.status(), SaveStatus::Saved);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_document_never_creates_remote_draft() {
        let (scheduler, _, gateway) = scheduler(DocumentState::new().with_title("x"));

        scheduler.on_document_changed(DocumentState::new().with_tags(["only-tags"]));
        advance(REMOTE + LOCAL).await;
        assert_eq!(gateway.calls(), 0);

        assert_eq!(scheduler.force_save().await.unwrap(), SaveOutcome::Empty);
        assert_eq!(gateway.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_save_twice_hits_network_once() {
        let (scheduler, _, gateway) = scheduler(DocumentState::new());
        scheduler.on_document_changed(DocumentState::new().with_title("Draft A"));

        let first = scheduler.force_save().await.unwrap();
        let second = scheduler.force_save().await.unwrap();
        assert!(matches!(first, SaveOutcome::Saved { .. }));
        assert_eq!(second, SaveOutcome::Unchanged);
        assert_eq!(gateway.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_save_cancels_timers_and_flushes_local() {
        let (scheduler, store, gateway) = scheduler(DocumentState::new());
        gateway.fail_next("offline");
        scheduler.on_document_changed(DocumentState::new().with_title("keep me"));

        assert!(scheduler.force_save().await.is_err());
        assert_eq!(store.saves(), 1);
        assert_eq!(store.load().unwrap().unwrap().title, "keep me");
        assert_eq!(scheduler.status(), SaveStatus::Unsaved);

        // Timers were cancelled; nothing else fires.
        advance(REMOTE * 2).await;
        assert_eq!(gateway.calls(), 1);
        assert_eq!(store.saves(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_remote_write_retries_full_document() {
        let (scheduler, _, gateway) = scheduler(DocumentState::new());
        gateway.fail_next("500");
        scheduler.on_document_changed(DocumentState::new().with_title("retry"));

        advance(REMOTE).await;
        assert_eq!(gateway.calls(), 1);
        assert_eq!(scheduler.status(), SaveStatus::Unsaved);
        assert!(scheduler.document().draft_id.is_none());

        let outcome = scheduler.force_save().await.unwrap();
        assert!(matches!(outcome, SaveOutcome::Saved { .. }));
        assert_eq!(gateway.calls(), 2);
        assert_eq!(gateway.last_doc().unwrap().title, "retry");
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_flight_drops_concurrent_requests() {
        let (scheduler, store, gateway) = scheduler(DocumentState::new());
        let gate = gateway.hold();
        scheduler.on_document_changed(DocumentState::new().with_title("slow"));

        let first = tokio::spawn({
            let scheduler = scheduler.clone();
            async move { scheduler.force_save().await }
        });
        settle().await;
        assert!(scheduler.is_saving());
        assert_eq!(scheduler.status(), SaveStatus::Saving);

        // Timer-driven attempt while in flight is dropped.
        scheduler.on_document_changed(DocumentState::new().with_title("slower"));
        advance(REMOTE).await;
        assert_eq!(gateway.calls(), 1);
        assert_eq!(gateway.max_concurrent(), 1);

        gate.release();
        let outcome = first.await.unwrap().unwrap();
        assert!(matches!(outcome, SaveOutcome::Saved { .. }));
        assert!(!scheduler.is_saving());
        // Edits landed during the write, so the indicator stays unsaved and
        // the local slot keeps the newer text.
        assert_eq!(scheduler.status(), SaveStatus::Unsaved);
        assert!(scheduler.has_unsaved_changes());
        assert_eq!(store.load().unwrap().unwrap().title, "slower");
        assert_eq!(store.clears(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_local_clear_after_remote_save_is_ignored() {
        let (scheduler, store, gateway) = scheduler(DocumentState::new());
        scheduler.on_document_changed(DocumentState::new().with_title("remote only"));
        store.set_unavailable(true);

        let outcome = scheduler.force_save().await.unwrap();
        assert_eq!(
            outcome,
            SaveOutcome::Saved {
                draft_id: SmolStr::new("draft-1")
            }
        );
        assert_eq!(gateway.calls(), 1);
        assert_eq!(scheduler.status(), SaveStatus::Saved);
        assert_eq!(scheduler.document().draft_id.as_deref(), Some("draft-1"));
        assert!(!scheduler.has_unsaved_changes());
        assert_eq!(store.clears(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_untouched_published_document_is_not_rewritten() {
        let initial = DocumentState::editing_published("post-1", "Live", "text", vec![]);
        let (scheduler, _, gateway) = scheduler(initial);

        assert_eq!(scheduler.force_save().await.unwrap(), SaveOutcome::Unchanged);
        scheduler.save_in_background();
        advance(Duration::ZERO).await;
        assert_eq!(gateway.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_remote_writes_after_publish() {
        let (scheduler, store, gateway) = scheduler(DocumentState::new());
        scheduler.on_document_changed(DocumentState::new().with_title("ship it"));
        scheduler.force_save().await.unwrap();
        scheduler.complete_publish("post-9").await;

        assert_eq!(scheduler.force_save().await.unwrap(), SaveOutcome::Retired);
        scheduler.on_document_changed(scheduler.document().with_content("typo fix"));
        assert!(!scheduler.has_unsaved_changes());
        advance(REMOTE + LOCAL).await;

        assert_eq!(gateway.calls(), 1);
        assert_eq!(gateway.deleted(), vec![SmolStr::new("draft-1")]);
        assert!(store.load().unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_timers_stops_pending_writes() {
        let (scheduler, store, gateway) = scheduler(DocumentState::new());
        scheduler.on_document_changed(DocumentState::new().with_title("abandoned"));
        scheduler.cancel_timers();

        advance(REMOTE * 2).await;
        assert_eq!(store.saves(), 0);
        assert_eq!(gateway.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_save_waits_for_write_in_flight() {
        let (scheduler, _, gateway) = scheduler(DocumentState::new());
        let gate = gateway.hold();
        scheduler.on_document_changed(DocumentState::new().with_title("a"));
        advance(REMOTE).await;
        assert!(scheduler.is_saving());

        let forced = tokio::spawn({
            let scheduler = scheduler.clone();
            async move { scheduler.force_save().await }
        });
        settle().await;
        assert!(!forced.is_finished());

        gate.release();
        assert_eq!(forced.await.unwrap().unwrap(), SaveOutcome::InFlight);
        assert_eq!(gateway.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_published_document_skips_local_tier() {
        let initial = DocumentState::editing_published("post-1", "Live", "text", vec![]);
        let (scheduler, store, gateway) = scheduler(initial.clone());
        assert!(!scheduler.has_unsaved_changes());

        scheduler.on_document_changed(initial.with_content("edited"));
        advance(LOCAL).await;
        assert_eq!(store.saves(), 0);

        advance(REMOTE).await;
        assert_eq!(gateway.calls(), 1);
        assert_eq!(store.clears(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hydrated_draft_is_not_rewritten() {
        let initial = DocumentState::from_remote_draft("d-9", "Title", "Body", vec![]);
        let (scheduler, _, gateway) = scheduler(initial.clone());

        scheduler.on_document_changed(initial);
        advance(REMOTE).await;
        assert_eq!(scheduler.force_save().await.unwrap(), SaveOutcome::Unchanged);
        assert_eq!(gateway.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_local_write_failure_is_swallowed() {
        let (scheduler, store, _) = scheduler(DocumentState::new());
        store.set_unavailable(true);
        scheduler.on_document_changed(DocumentState::new().with_title("quota"));

        advance(LOCAL).await;
        assert_eq!(store.saves(), 0);
        assert_eq!(scheduler.status(), SaveStatus::Unsaved);
        assert!(scheduler.last_saved_at().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_autosave_cancels_and_deletes() {
        let (scheduler, store, gateway) = scheduler(DocumentState::new());
        scheduler.on_document_changed(DocumentState::new().with_title("t"));
        advance(LOCAL).await;
        assert!(store.load().unwrap().is_some());

        scheduler.on_document_changed(DocumentState::new().with_title("t2"));
        scheduler.clear_autosave();
        advance(REMOTE * 2).await;
        assert!(store.load().unwrap().is_none());
        assert_eq!(gateway.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_complete_publish_deletes_remote_draft() {
        let (scheduler, store, gateway) = scheduler(DocumentState::new());
        scheduler.on_document_changed(DocumentState::new().with_title("ship it"));
        scheduler.force_save().await.unwrap();

        scheduler.complete_publish("post-42").await;
        assert_eq!(gateway.deleted(), vec![SmolStr::new("draft-1")]);
        assert!(store.load().unwrap().is_none());

        let doc = scheduler.document();
        assert_eq!(doc.published_id.as_deref(), Some("post-42"));
        assert!(doc.draft_id.is_none());
        assert!(!scheduler.has_unsaved_changes());
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_subscription_sees_transitions() {
        let (scheduler, _, _) = scheduler(DocumentState::new());
        let mut rx = scheduler.subscribe_status();
        assert_eq!(*rx.borrow_and_update(), SaveStatus::Saved);

        scheduler.on_document_changed(DocumentState::new().with_title("x"));
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), SaveStatus::Unsaved);

        scheduler.force_save().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), SaveStatus::Saved);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reverting_to_saved_state_restores_saved_status() {
        let (scheduler, store, _) = scheduler(DocumentState::new());
        scheduler.on_document_changed(DocumentState::new().with_title("a"));
        advance(LOCAL).await;
        scheduler.on_document_changed(DocumentState::new().with_title("ab"));
        assert_eq!(scheduler.status(), SaveStatus::Unsaved);

        scheduler.on_document_changed(DocumentState::new().with_title("a"));
        assert_eq!(scheduler.status(), SaveStatus::Saved);
        advance(LOCAL).await;
        // The revert cancelled the pending "ab" write.
        assert_eq!(store.saves(), 1);
    }
}
