//! Per-kind edit/draft/baseline orchestration.
//!
//! [`SyncController`] owns, for each manifest kind, the last fetched
//! baseline and the working copy being edited. Every mutation recomputes
//! the [`Diff`] and [`Signature`] from scratch, so whatever a renderer reads
//! through [`SyncController::state`] is always consistent.
//!
//! # States
//!
//! ```text
//!            edit (changes)              autosave / manual save
//!   Clean ─────────────────────▶ Dirty ─────────────────────────▶ Drafted
//!     ▲                            │                                 │
//!     └── edit (no changes), discard, refresh matching local edits ──┘
//! ```
//!
//! Saving a draft does not clear dirtiness: the baseline is unchanged, so the
//! working copy still differs from it.
//!
//! # Autosave
//!
//! Each kind has one debounce deadline. An edit that leaves changes arms it
//! at `now + autosave_delay`, replacing any pending deadline, so bursts of
//! edits coalesce into one write. The host calls
//! [`run_due_autosaves`](SyncController::run_due_autosaves) from its event
//! loop; [`next_autosave_due`](SyncController::next_autosave_due) says when.
//! An edit that leaves no changes clears the stored draft immediately.
//!
//! # Overlapping fetches
//!
//! Refresh, discard and load capture a [`FetchTicket`] before fetching. A
//! newer fetch for the same kind bumps the generation, and a completion
//! carrying an older ticket is dropped as [`Superseded`](RefreshOutcome::Superseded)
//! instead of overwriting fresher state. Hosts that run fetches themselves
//! use [`begin_fetch`](SyncController::begin_fetch) and the `apply_*`
//! methods directly.

use chrono::{DateTime, TimeDelta, Utc};
use serde_json::Value;
use std::fmt;
use tracing::{debug, info, warn};

use crate::config::ComposerConfig;
use crate::diff::{Diff, diff};
use crate::draft::{DraftStore, Storage};
use crate::normalize::{normalize, renormalize};
use crate::order::{OrderDiff, order_diff};
use crate::signature::{Signature, signature};
use crate::source::{ManifestSource, SourceError};
use crate::types::{Kind, Manifest};

/// Time source for autosave deadlines and draft timestamps.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Working copy equals the baseline.
    Clean,
    /// Working copy differs and no draft holds it yet.
    Dirty,
    /// Working copy differs and a draft has been saved.
    Drafted,
}

/// In-memory record of the last draft written for a kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DraftMeta {
    pub saved_at: DateTime<Utc>,
    pub baseline_signature: Signature,
    /// Written by [`SyncController::manual_save`] rather than autosave.
    pub last_manual: bool,
}

/// Everything the controller knows about one manifest kind.
#[derive(Debug, Clone)]
pub struct KindState {
    kind: Kind,
    baseline: Manifest,
    working: Manifest,
    diff: Diff,
    signature: Signature,
    baseline_signature: Signature,
    draft: Option<DraftMeta>,
    autosave_due: Option<DateTime<Utc>>,
    generation: u64,
}

impl KindState {
    fn new(kind: Kind) -> Self {
        let mut state = Self {
            kind,
            baseline: Manifest::empty(),
            working: Manifest::empty(),
            diff: Diff::default(),
            signature: Signature::empty(),
            baseline_signature: Signature::empty(),
            draft: None,
            autosave_due: None,
            generation: 0,
        };
        state.recompute();
        state.baseline_signature = signature(kind, Some(&state.baseline));
        state
    }

    fn recompute(&mut self) {
        self.diff = diff(self.kind, Some(&self.working), Some(&self.baseline));
        self.signature = signature(self.kind, Some(&self.working));
    }

    fn set_baseline(&mut self, baseline: Manifest) -> bool {
        let sig = signature(self.kind, Some(&baseline));
        let changed = sig != self.baseline_signature;
        self.baseline = baseline;
        self.baseline_signature = sig;
        changed
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn baseline(&self) -> &Manifest {
        &self.baseline
    }

    pub fn working(&self) -> &Manifest {
        &self.working
    }

    pub fn diff(&self) -> &Diff {
        &self.diff
    }

    /// Signature of the working copy.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn baseline_signature(&self) -> &Signature {
        &self.baseline_signature
    }

    pub fn draft(&self) -> Option<&DraftMeta> {
        self.draft.as_ref()
    }

    pub fn autosave_due(&self) -> Option<DateTime<Utc>> {
        self.autosave_due
    }

    pub fn state(&self) -> SyncState {
        match (self.diff.has_changes, self.draft.is_some()) {
            (false, _) => SyncState::Clean,
            (true, false) => SyncState::Dirty,
            (true, true) => SyncState::Drafted,
        }
    }

    /// Key-order alignment of the working copy against the baseline.
    pub fn order_diff(&self) -> OrderDiff {
        order_diff(Some(&self.working), Some(&self.baseline))
    }
}

/// Generation captured when a fetch starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    kind: Kind,
    generation: u64,
}

impl FetchTicket {
    pub fn kind(&self) -> Kind {
        self.kind
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    NothingToSave,
    Saved(DraftMeta),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// No local edits were pending; the working copy now equals the new baseline.
    Pulled { baseline_changed: bool },
    /// Local edits were kept on top of the new baseline.
    Rebased { baseline_changed: bool },
    Failed(String),
    Superseded,
}

impl RefreshOutcome {
    /// Whether the remote moved since the previous baseline.
    pub fn baseline_changed(&self) -> bool {
        match self {
            RefreshOutcome::Pulled { baseline_changed }
            | RefreshOutcome::Rebased { baseline_changed } => *baseline_changed,
            RefreshOutcome::Failed(_) | RefreshOutcome::Superseded => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscardOutcome {
    /// Working copy reset to a freshly fetched baseline.
    Discarded,
    /// The fetch failed; working copy reset to the last-known baseline.
    DiscardedOffline(String),
    Superseded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    /// A stored draft was restored over the fetched baseline. `stale` means
    /// the draft was edited against a different baseline than the one
    /// just fetched.
    RestoredDraft { stale: bool },
    Failed(String),
    Superseded,
}

impl fmt::Display for SaveOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveOutcome::NothingToSave => f.write_str("Nothing to save"),
            SaveOutcome::Saved(_) => f.write_str("Draft saved"),
        }
    }
}

impl fmt::Display for RefreshOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshOutcome::Pulled { baseline_changed: true } => f.write_str("Pulled latest changes"),
            RefreshOutcome::Pulled { baseline_changed: false } => f.write_str("Already up to date"),
            RefreshOutcome::Rebased { baseline_changed: true } => {
                f.write_str("Remote changed while you were editing; local edits kept")
            }
            RefreshOutcome::Rebased { baseline_changed: false } => {
                f.write_str("Remote unchanged; local edits kept")
            }
            RefreshOutcome::Failed(e) => write!(f, "Refresh failed: {e}"),
            RefreshOutcome::Superseded => f.write_str("Superseded by a newer request"),
        }
    }
}

impl fmt::Display for DiscardOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscardOutcome::Discarded => f.write_str("Local changes discarded"),
            DiscardOutcome::DiscardedOffline(e) => {
                write!(f, "Local changes discarded; could not fetch latest ({e})")
            }
            DiscardOutcome::Superseded => f.write_str("Superseded by a newer request"),
        }
    }
}

impl fmt::Display for LoadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadOutcome::Loaded => f.write_str("Loaded"),
            LoadOutcome::RestoredDraft { stale: false } => f.write_str("Restored unsaved draft"),
            LoadOutcome::RestoredDraft { stale: true } => {
                f.write_str("Restored unsaved draft; remote changed since it was saved")
            }
            LoadOutcome::Failed(e) => write!(f, "Load failed: {e}"),
            LoadOutcome::Superseded => f.write_str("Superseded by a newer request"),
        }
    }
}

/// Index and tabs state side by side; the kinds never interact.
#[derive(Debug, Clone)]
struct PerKind {
    index: KindState,
    tabs: KindState,
}

impl PerKind {
    fn get(&self, kind: Kind) -> &KindState {
        match kind {
            Kind::Index => &self.index,
            Kind::Tabs => &self.tabs,
        }
    }

    fn get_mut(&mut self, kind: Kind) -> &mut KindState {
        match kind {
            Kind::Index => &mut self.index,
            Kind::Tabs => &mut self.tabs,
        }
    }
}

pub struct SyncController<S, P, C = SystemClock> {
    source: S,
    drafts: DraftStore<P>,
    clock: C,
    autosave_delay: TimeDelta,
    states: PerKind,
}

impl<S: ManifestSource, P: Storage> SyncController<S, P, SystemClock> {
    pub fn new(source: S, storage: P, config: &ComposerConfig) -> Self {
        Self::with_clock(source, storage, SystemClock, config)
    }
}

impl<S: ManifestSource, P: Storage, C: Clock> SyncController<S, P, C> {
    pub fn with_clock(source: S, storage: P, clock: C, config: &ComposerConfig) -> Self {
        Self {
            source,
            drafts: DraftStore::new(storage, config.drafts.storage_key.clone()),
            clock,
            autosave_delay: config.drafts.autosave_delay(),
            states: PerKind {
                index: KindState::new(Kind::Index),
                tabs: KindState::new(Kind::Tabs),
            },
        }
    }

    pub fn state(&self, kind: Kind) -> &KindState {
        self.states.get(kind)
    }

    pub fn drafts(&self) -> &DraftStore<P> {
        &self.drafts
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    // =========================================================================
    // Editing and drafts
    // =========================================================================

    /// Mutate the working copy of `kind`, then recompute its diff and
    /// signature and schedule (or cancel) the autosave. The working copy is
    /// renormalized after `f`, so entries inserted without an `order` slot
    /// are appended and orphaned `order` keys get empty entries.
    pub fn edit(&mut self, kind: Kind, f: impl FnOnce(&mut Manifest)) -> &Diff {
        let now = self.clock.now();
        let state = self.states.get_mut(kind);
        f(&mut state.working);
        // `f` may touch `order`/`entries` directly; restore their invariants.
        state.working = renormalize(kind, &state.working);
        state.recompute();

        if state.diff.has_changes {
            state.autosave_due = Some(
                now.checked_add_signed(self.autosave_delay)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
            );
        } else {
            state.autosave_due = None;
            state.draft = None;
            self.drafts.clear(kind);
        }
        &self.states.get(kind).diff
    }

    /// Earliest pending autosave deadline across both kinds.
    pub fn next_autosave_due(&self) -> Option<DateTime<Utc>> {
        Kind::ALL
            .iter()
            .filter_map(|k| self.states.get(*k).autosave_due)
            .min()
    }

    /// Fire every autosave whose deadline has passed. Returns the kinds
    /// that were autosaved.
    pub fn run_due_autosaves(&mut self) -> Vec<Kind> {
        let now = self.clock.now();
        let mut fired = Vec::new();
        for kind in Kind::ALL {
            let state = self.states.get_mut(kind);
            if state.autosave_due.is_some_and(|due| due <= now) {
                state.autosave_due = None;
                self.autosave(kind);
                fired.push(kind);
            }
        }
        fired
    }

    fn autosave(&mut self, kind: Kind) {
        if self.states.get(kind).diff.has_changes {
            self.write_draft(kind, false);
            debug!("Autosaved {} draft", kind);
        } else {
            self.states.get_mut(kind).draft = None;
            self.drafts.clear(kind);
        }
    }

    /// Save the working copy now. A no-op when there is nothing to save.
    pub fn manual_save(&mut self, kind: Kind) -> SaveOutcome {
        if !self.states.get(kind).diff.has_changes {
            return SaveOutcome::NothingToSave;
        }
        self.states.get_mut(kind).autosave_due = None;
        let meta = self.write_draft(kind, true);
        info!("Saved {} draft", kind);
        SaveOutcome::Saved(meta)
    }

    fn write_draft(&mut self, kind: Kind, manual: bool) -> DraftMeta {
        let now = self.clock.now();
        let state = self.states.get_mut(kind);
        let draft = self
            .drafts
            .save(kind, &state.working, Some(&state.baseline), now);
        let meta = DraftMeta {
            saved_at: draft.saved_at,
            baseline_signature: draft.baseline_signature,
            last_manual: manual,
        };
        state.draft = Some(meta.clone());
        meta
    }

    // =========================================================================
    // Fetch-driven operations
    // =========================================================================

    /// Start a fetch for `kind`, invalidating any fetch already in flight.
    pub fn begin_fetch(&mut self, kind: Kind) -> FetchTicket {
        let state = self.states.get_mut(kind);
        state.generation = state.generation.wrapping_add(1);
        FetchTicket {
            kind,
            generation: state.generation,
        }
    }

    pub fn is_current(&self, ticket: FetchTicket) -> bool {
        self.states.get(ticket.kind).generation == ticket.generation
    }

    /// Fetch the baseline for `kind` and restore its stored draft, if any.
    pub async fn load(&mut self, kind: Kind) -> LoadOutcome {
        let ticket = self.begin_fetch(kind);
        let result = self.source.fetch(kind).await;
        self.apply_load(ticket, result)
    }

    pub fn apply_load(&mut self, ticket: FetchTicket, result: Result<Value, SourceError>) -> LoadOutcome {
        let kind = ticket.kind;
        if !self.is_current(ticket) {
            debug!("Dropping superseded {} load", kind);
            return LoadOutcome::Superseded;
        }

        let stored = self.drafts.load();
        let state = self.states.get_mut(kind);
        let failure = match result {
            Ok(doc) => {
                state.set_baseline(normalize(kind, &doc));
                None
            }
            Err(e) => {
                warn!("Failed to load {} manifest, keeping last-known baseline: {e}", kind);
                Some(e.to_string())
            }
        };
        state.working = state.baseline.clone();
        state.autosave_due = None;
        state.draft = None;

        let restored = match stored.get(kind) {
            Some(draft) => {
                state.working = draft.data.clone();
                state.recompute();
                state.diff.has_changes.then(|| {
                    state.draft = Some(DraftMeta {
                        saved_at: draft.saved_at,
                        baseline_signature: draft.baseline_signature.clone(),
                        last_manual: false,
                    });
                    draft.baseline_signature != state.baseline_signature
                })
            }
            None => {
                state.recompute();
                None
            }
        };

        if let Some(message) = failure {
            return LoadOutcome::Failed(message);
        }
        match restored {
            Some(stale) => {
                info!("Restored {} draft ({})", kind, state.diff);
                LoadOutcome::RestoredDraft { stale }
            }
            None => {
                if stored.get(kind).is_some() {
                    // The remote already contains everything the draft held.
                    self.drafts.clear(kind);
                }
                info!("Loaded {} manifest ({} entries)", kind, state.baseline.len());
                LoadOutcome::Loaded
            }
        }
    }

    /// Fetch a new baseline for `kind`, keeping local edits if there are any.
    pub async fn refresh(&mut self, kind: Kind) -> RefreshOutcome {
        let ticket = self.begin_fetch(kind);
        let result = self.source.fetch(kind).await;
        self.apply_refresh(ticket, result)
    }

    pub fn apply_refresh(
        &mut self,
        ticket: FetchTicket,
        result: Result<Value, SourceError>,
    ) -> RefreshOutcome {
        let kind = ticket.kind;
        if !self.is_current(ticket) {
            debug!("Dropping superseded {} refresh", kind);
            return RefreshOutcome::Superseded;
        }
        let doc = match result {
            Ok(doc) => doc,
            Err(e) => {
                warn!("Failed to refresh {} manifest: {e}", kind);
                return RefreshOutcome::Failed(e.to_string());
            }
        };

        let state = self.states.get_mut(kind);
        let had_changes = state.diff.has_changes;
        let baseline_changed = state.set_baseline(normalize(kind, &doc));

        if !had_changes {
            state.working = state.baseline.clone();
            state.recompute();
            info!("Pulled {} manifest (changed: {})", kind, baseline_changed);
            return RefreshOutcome::Pulled { baseline_changed };
        }

        state.recompute();
        if !state.diff.has_changes {
            state.autosave_due = None;
            state.draft = None;
            self.drafts.clear(kind);
        }
        if baseline_changed {
            warn!("Remote {} manifest changed under local edits", kind);
        }
        RefreshOutcome::Rebased { baseline_changed }
    }

    /// Throw away local edits for `kind`, resetting to the freshest baseline
    /// available.
    pub async fn discard(&mut self, kind: Kind) -> DiscardOutcome {
        let ticket = self.begin_fetch(kind);
        let result = self.source.fetch(kind).await;
        self.apply_discard(ticket, result)
    }

    pub fn apply_discard(
        &mut self,
        ticket: FetchTicket,
        result: Result<Value, SourceError>,
    ) -> DiscardOutcome {
        let kind = ticket.kind;
        if !self.is_current(ticket) {
            debug!("Dropping superseded {} discard", kind);
            return DiscardOutcome::Superseded;
        }
        let state = self.states.get_mut(kind);
        let outcome = match result {
            Ok(doc) => {
                state.set_baseline(normalize(kind, &doc));
                DiscardOutcome::Discarded
            }
            Err(e) => {
                warn!("Discarding {} against last-known baseline: {e}", kind);
                DiscardOutcome::DiscardedOffline(e.to_string())
            }
        };
        state.working = state.baseline.clone();
        state.recompute();
        state.autosave_due = None;
        state.draft = None;
        self.drafts.clear(kind);
        info!("Discarded {} edits", kind);
        outcome
    }
}
