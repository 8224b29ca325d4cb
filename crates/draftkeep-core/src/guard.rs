//! Exit interception.
//!
//! Routes every way of leaving the authoring surface through one small state
//! machine so unsaved work gets a forced save before the document is
//! abandoned:
//!
//! ```text
//! Idle ──intercept──▶ Intercepted(intent) ──confirm──▶ Exiting ──▶ (host navigates)
//!   ▲                        │
//!   └────────cancel──────────┘
//! ```
//!
//! Browser back is made interceptable by keeping a sentinel history entry on
//! top of the authoring page: the first back press only pops the sentinel,
//! which the guard observes and immediately re-pushes.

use draftkeep_common::AutosaveConfig;
use smol_str::SmolStr;

use crate::error::DraftError;
use crate::gateway::RemoteDraftGateway;
use crate::scheduler::{AutosaveScheduler, SaveOutcome};
use crate::storage::LocalDraftStore;

/// Navigation primitives supplied by the host router.
pub trait Navigator: Send + Sync {
    /// Navigate to an in-app path.
    fn navigate_to(&self, path: &str);

    /// Go back `entries` history entries.
    fn navigate_back(&self, entries: usize);

    /// Push the sentinel entry that makes back navigation observable.
    fn push_sentinel(&self);
}

/// Where an intercepted navigation was headed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExitIntent {
    /// In-app link to this path.
    Navigate(SmolStr),
    /// Browser back/forward.
    HistoryBack,
}

/// Guard state, for rendering the confirmation dialog.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum GuardState {
    #[default]
    Idle,
    /// Prompt open, waiting on the user.
    Intercepted(ExitIntent),
    /// Exit confirmed; interception is off so the guard's own navigation passes.
    Exiting,
}

/// What the host should do with the navigation event it just reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interception {
    /// Let the navigation happen.
    Proceed,
    /// Navigation was stopped and the prompt is open.
    Prompt,
}

/// Classification of a link target.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Destination {
    /// Another origin or a non-navigational scheme; never intercepted.
    CrossOrigin,
    /// Designated safe by the host, e.g. within the authoring surface.
    Safe,
    /// Same-origin path that leaves the authoring surface.
    Guarded(SmolStr),
}

/// Destinations that never trigger the exit prompt.
#[derive(Clone, Debug, Default)]
pub struct SafeDestinations {
    origin: Option<SmolStr>,
    prefixes: Vec<SmolStr>,
}

impl SafeDestinations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from the configured safe path prefixes.
    pub fn from_config(config: &AutosaveConfig) -> Self {
        Self {
            origin: None,
            prefixes: config.safe_paths.iter().map(SmolStr::new).collect(),
        }
    }

    /// Our own origin (e.g. `https://example.com`); absolute links to it are
    /// treated as in-app paths.
    pub fn with_origin(mut self, origin: impl AsRef<str>) -> Self {
        self.origin = Some(SmolStr::new(origin.as_ref().trim_end_matches('/')));
        self
    }

    /// Mark a path prefix as safe.
    pub fn with_path(mut self, prefix: impl Into<SmolStr>) -> Self {
        self.prefixes.push(prefix.into());
        self
    }

    pub fn classify(&self, href: &str) -> Destination {
        let href = href.trim();
        let path = match self.origin.as_deref().and_then(|o| href.strip_prefix(o)) {
            Some("") => "/",
            Some(rest) if rest.starts_with(['/', '?', '#']) => rest,
            _ => {
                if href.starts_with("//") || has_scheme(href) {
                    return Destination::CrossOrigin;
                }
                href
            }
        };
        if path.starts_with('#') || self.prefixes.iter().any(|p| matches_prefix(path, p)) {
            return Destination::Safe;
        }
        Destination::Guarded(SmolStr::new(path))
    }
}

/// `scheme:` before any path, query or fragment delimiter.
fn has_scheme(href: &str) -> bool {
    let Some(colon) = href.find(':') else {
        return false;
    };
    let scheme = &href[..colon];
    let mut chars = scheme.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

fn matches_prefix(path: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return false;
    }
    match path.strip_prefix(prefix) {
        Some("") => true,
        Some(rest) => prefix.ends_with('/') || rest.starts_with(['/', '?', '#']),
        None => false,
    }
}

/// Result of a confirmed exit.
#[derive(Debug)]
pub struct ExitOutcome {
    pub intent: ExitIntent,
    /// The forced save. An error here never blocked the exit.
    pub save: Result<SaveOutcome, DraftError>,
}

impl ExitOutcome {
    pub fn save_failed(&self) -> bool {
        self.save.is_err()
    }

    /// Toast text for the host, when there is something to tell the user.
    pub fn notice(&self) -> Option<&'static str> {
        self.save_failed()
            .then_some("Could not save your draft, exiting anyway")
    }
}

/// Intercepts navigation away from the authoring surface.
pub struct ExitGuard<S, G, N> {
    scheduler: AutosaveScheduler<S, G>,
    navigator: N,
    safe: SafeDestinations,
    state: GuardState,
    sentinel_pushed: bool,
}

impl<S, G, N> ExitGuard<S, G, N>
where
    S: LocalDraftStore,
    G: RemoteDraftGateway,
    N: Navigator,
{
    pub fn new(scheduler: AutosaveScheduler<S, G>, navigator: N, safe: SafeDestinations) -> Self {
        Self {
            scheduler,
            navigator,
            safe,
            state: GuardState::Idle,
            sentinel_pushed: false,
        }
    }

    /// Push the history sentinel. Call once when the authoring surface mounts.
    pub fn arm(&mut self) {
        if !self.sentinel_pushed {
            self.navigator.push_sentinel();
            self.sentinel_pushed = true;
        }
    }

    pub fn state(&self) -> &GuardState {
        &self.state
    }

    pub fn is_prompt_open(&self) -> bool {
        matches!(self.state, GuardState::Intercepted(_))
    }

    /// Target of the open prompt.
    pub fn pending_intent(&self) -> Option<&ExitIntent> {
        match &self.state {
            GuardState::Intercepted(intent) => Some(intent),
            _ => None,
        }
    }

    pub fn is_exiting(&self) -> bool {
        self.state == GuardState::Exiting
    }

    /// An in-app link was activated.
    ///
    /// On [`Interception::Prompt`] the host must prevent the default navigation.
    pub fn on_link_activated(&mut self, href: &str) -> Interception {
        if self.is_exiting() {
            return Interception::Proceed;
        }
        let path = match self.safe.classify(href) {
            Destination::Guarded(path) => path,
            other => {
                tracing::trace!(href, destination = ?other, "navigation not guarded");
                return Interception::Proceed;
            }
        };
        if !self.scheduler.has_unsaved_changes() {
            tracing::debug!(%path, "nothing unsaved, letting navigation through");
            return Interception::Proceed;
        }
        tracing::debug!(%path, "navigation intercepted");
        self.state = GuardState::Intercepted(ExitIntent::Navigate(path));
        Interception::Prompt
    }

    /// The browser popped a history entry (back/forward).
    pub fn on_history_pop(&mut self) -> Interception {
        // The pop consumed the sentinel.
        self.sentinel_pushed = false;
        if self.is_exiting() {
            return Interception::Proceed;
        }
        if !self.scheduler.has_unsaved_changes() {
            tracing::debug!("nothing unsaved, leaving via history");
            self.state = GuardState::Exiting;
            self.navigator.navigate_back(1);
            return Interception::Proceed;
        }
        self.arm();
        tracing::debug!("history navigation intercepted");
        self.state = GuardState::Intercepted(ExitIntent::HistoryBack);
        Interception::Prompt
    }

    /// The tab is closing or reloading.
    ///
    /// Nothing can be awaited here, so this fires a background save and
    /// returns whether the host should ask for the platform's native
    /// "unsaved changes" confirmation. The write may not finish before the
    /// page goes away.
    pub fn on_unload(&self) -> bool {
        if self.is_exiting() {
            return false;
        }
        let unsaved = self.scheduler.has_unsaved_changes();
        if unsaved {
            tracing::debug!("unload with unsaved changes, saving in background");
            self.scheduler.save_in_background();
        }
        unsaved
    }

    /// The user confirmed leaving.
    ///
    /// Forces a save, waits for it to settle either way, then navigates.
    /// Returns `None` when no prompt was open.
    pub async fn confirm(&mut self) -> Option<ExitOutcome> {
        let intent = match std::mem::take(&mut self.state) {
            GuardState::Intercepted(intent) => intent,
            other => {
                self.state = other;
                return None;
            }
        };
        self.state = GuardState::Exiting;

        let save = self.scheduler.force_save().await;
        if let Err(e) = &save {
            tracing::warn!(error = %e, "could not save draft, exiting anyway");
        }

        match &intent {
            ExitIntent::Navigate(path) => self.navigator.navigate_to(path),
            ExitIntent::HistoryBack => {
                // Step over the re-pushed sentinel as well as the authoring page.
                let entries = if self.sentinel_pushed { 2 } else { 1 };
                self.sentinel_pushed = false;
                self.navigator.navigate_back(entries);
            }
        }
        tracing::info!(intent = ?intent, "exit confirmed");
        Some(ExitOutcome { intent, save })
    }

    /// The user chose to stay. The guard stays armed.
    pub fn cancel(&mut self) {
        if let GuardState::Intercepted(intent) = &self.state {
            tracing::debug!(intent = ?intent, "exit cancelled");
            self.state = GuardState::Idle;
        }
    }
}
