//! Test doubles for draftkeep-core.
//!
//! Shared by the unit tests and the integration tests under `tests/`, and
//! usable by hosts that want to exercise their own wiring.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use smol_str::{SmolStr, format_smolstr};
use tokio::sync::watch;

use crate::document::{DocumentState, LocalDraftRecord};
use crate::error::{GatewayError, StoreError};
use crate::gateway::{RemoteDraftGateway, SavedDraft};
use crate::guard::Navigator;
use crate::storage::{LocalDraftStore, MemoryDraftStore};

/// Wraps a [`MemoryDraftStore`] and counts successful writes and clears.
#[derive(Debug)]
pub struct CountingStore {
    inner: MemoryDraftStore,
    saves: AtomicUsize,
    clears: AtomicUsize,
    unavailable: AtomicBool,
}

impl CountingStore {
    pub fn new(inner: MemoryDraftStore) -> Self {
        Self {
            inner,
            saves: AtomicUsize::new(0),
            clears: AtomicUsize::new(0),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Make every operation fail as if storage were disabled.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn clears(&self) -> usize {
        self.clears.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &MemoryDraftStore {
        &self.inner
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("quota exceeded".into()));
        }
        Ok(())
    }
}

impl LocalDraftStore for CountingStore {
    fn load(&self) -> Result<Option<LocalDraftRecord>, StoreError> {
        self.check()?;
        self.inner.load()
    }

    fn save(&self, record: &LocalDraftRecord) -> Result<(), StoreError> {
        self.check()?;
        self.inner.save(record)?;
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.check()?;
        self.inner.clear()?;
        self.clears.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Gateway double that records every call.
///
/// New drafts get ids `draft-1`, `draft-2`, ... in creation order.
#[derive(Debug)]
pub struct RecordingGateway {
    docs: Mutex<Vec<DocumentState>>,
    deleted: Mutex<Vec<SmolStr>>,
    fail_next: Mutex<Option<GatewayError>>,
    created: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    open: Arc<watch::Sender<bool>>,
}

/// Holds gateway writes in flight until released.
#[derive(Debug)]
pub struct GatewayGate {
    open: Arc<watch::Sender<bool>>,
}

impl GatewayGate {
    /// Let held and future writes complete.
    pub fn release(&self) {
        self.open.send_replace(true);
    }
}

impl Default for RecordingGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingGateway {
    pub fn new() -> Self {
        let (open, _) = watch::channel(true);
        Self {
            docs: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            fail_next: Mutex::new(None),
            created: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            open: Arc::new(open),
        }
    }

    /// Fail the next write with a network error.
    pub fn fail_next(&self, message: &str) {
        *self.fail_next.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(GatewayError::Network(message.into()));
    }

    /// Block writes until the returned gate is released.
    pub fn hold(&self) -> GatewayGate {
        self.open.send_replace(false);
        GatewayGate {
            open: Arc::clone(&self.open),
        }
    }

    /// Number of `create_or_update_draft` calls, including failed ones.
    pub fn calls(&self) -> usize {
        self.docs.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Document passed to the most recent write.
    pub fn last_doc(&self) -> Option<DocumentState> {
        self.docs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    /// Highest number of writes observed in flight at once.
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn deleted(&self) -> Vec<SmolStr> {
        self.deleted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl RemoteDraftGateway for RecordingGateway {
    async fn create_or_update_draft(&self, doc: &DocumentState) -> Result<SavedDraft, GatewayError> {
        self.docs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(doc.clone());
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        let mut open = self.open.subscribe();
        // The sender lives in self, so waiting can only end by release.
        let _ = open.wait_for(|open| *open).await;
        self.active.fetch_sub(1, Ordering::SeqCst);

        let failure = self
            .fail_next
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(e) = failure {
            return Err(e);
        }
        let draft_id = match &doc.draft_id {
            Some(id) => id.clone(),
            None => {
                let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
                format_smolstr!("draft-{n}")
            }
        };
        Ok(SavedDraft { draft_id })
    }

    async fn delete_draft(&self, draft_id: &str) -> Result<(), GatewayError> {
        self.deleted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SmolStr::new(draft_id));
        Ok(())
    }
}

/// Navigation performed by the guard.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NavEvent {
    To(SmolStr),
    Back(usize),
    Sentinel,
}

/// Navigator double that records what it was asked to do.
///
/// Clones share the same log.
#[derive(Clone, Debug, Default)]
pub struct RecordingNavigator {
    events: Arc<Mutex<Vec<NavEvent>>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<NavEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Events other than sentinel pushes.
    pub fn navigations(&self) -> Vec<NavEvent> {
        self.events()
            .into_iter()
            .filter(|e| *e != NavEvent::Sentinel)
            .collect()
    }

    fn push(&self, event: NavEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl Navigator for RecordingNavigator {
    fn navigate_to(&self, path: &str) {
        self.push(NavEvent::To(SmolStr::new(path)));
    }

    fn navigate_back(&self, entries: usize) {
        self.push(NavEvent::Back(entries));
    }

    fn push_sentinel(&self) {
        self.push(NavEvent::Sentinel);
    }
}
