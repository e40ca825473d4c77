use crate::git::{ChangeSource, GitError};
use crate::{ChangeSet, FileChange};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PickerError {
    #[error("no changes to stage or unstage")]
    NoChanges,
    #[error(transparent)]
    Git(#[from] GitError),
}

/// Which partition a separator heads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Group {
    Staged,
    Unstaged,
}

impl Group {
    pub fn label(self) -> &'static str {
        match self {
            Group::Staged => "Staged Changes",
            Group::Unstaged => "Changes",
        }
    }
}

/// Synthetic bulk-action rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkAction {
    StageAll,
    UnstageAll,
}

/// One render unit in the picker list.
///
/// Separators and actions are synthetic: they are rendered but are never
/// valid focus targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListEntry {
    Separator { group: Group, count: usize },
    Action(BulkAction),
    File(FileChange),
}

impl ListEntry {
    pub fn as_file(&self) -> Option<&FileChange> {
        match self {
            ListEntry::File(change) => Some(change),
            _ => None,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, ListEntry::File(_))
    }
}

/// Focus hint consumed by the next rebuild.
///
/// The path (when present) is tried first; the ordinal is the fallback when
/// the path has left the list.
#[derive(Debug, Clone, Default)]
struct Anchor {
    path: Option<String>,
    ordinal: usize,
}

/// Result of a rebuild attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildOutcome {
    /// Nothing happened (debounce window still open, or picker untouched).
    Idle,
    /// The list was rebuilt and remains open.
    Open,
    /// The change set drained; the picker closed.
    Closed,
}

/// Cancellable delayed trigger for coalescing external change notifications.
///
/// A plain deadline rather than a timer thread: the host event loop already
/// wakes periodically, so `fired` is polled with the current instant. Each
/// new notification pushes the deadline out, collapsing a burst into one
/// firing.
#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    /// Arm (or re-arm) the deadline relative to `now`.
    pub fn arm(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// True once per armed burst, when the deadline has passed.
    pub fn fired(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// The reconciled picker list: grouped entries plus a focus that survives
/// rebuilds.
///
/// Owns the only copy of the rendered list. Rebuilds re-query the source and
/// swap entries and focus in together, so a reader between method calls
/// always observes a fully-formed list.
pub struct Picker<S: ChangeSource> {
    source: S,
    entries: Vec<ListEntry>,
    focused: Option<usize>,
    pending_anchor: Option<Anchor>,
    debounce: Debouncer,
    open: bool,
    rebuild_in_flight: bool,
    rebuild_queued: bool,
}

impl<S: ChangeSource> Picker<S> {
    /// Open the picker over the current change set.
    ///
    /// Fails with `NoChanges` when there is nothing to act on, and with the
    /// source error when enumeration itself fails (an unreadable repo must
    /// not render as a false empty state).
    pub fn open(mut source: S, debounce_delay: Duration) -> Result<Self, PickerError> {
        let set = source.list_changes()?;
        if set.is_empty() {
            return Err(PickerError::NoChanges);
        }

        let entries = build_entries(&set);
        let focused = resolve_focus(&entries, &Anchor::default());

        Ok(Self {
            source,
            entries,
            focused,
            pending_anchor: None,
            debounce: Debouncer::new(debounce_delay),
            open: true,
            rebuild_in_flight: false,
            rebuild_queued: false,
        })
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn entries(&self) -> &[ListEntry] {
        &self.entries
    }

    pub fn focused(&self) -> Option<usize> {
        self.focused
    }

    pub fn focused_file(&self) -> Option<&FileChange> {
        self.entries.get(self.focused?)?.as_file()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn staged_count(&self) -> usize {
        self.count_files(true)
    }

    pub fn unstaged_count(&self) -> usize {
        self.count_files(false)
    }

    fn count_files(&self, staged: bool) -> usize {
        self.entries
            .iter()
            .filter_map(ListEntry::as_file)
            .filter(|c| c.staged == staged)
            .count()
    }

    /// Move focus to the next file entry, if any.
    pub fn focus_next(&mut self) {
        if let Some(current) = self.focused
            && let Some(next) = next_file(&self.entries, current + 1)
        {
            self.focused = Some(next);
        }
    }

    /// Move focus to the previous file entry, if any.
    pub fn focus_prev(&mut self) {
        if let Some(current) = self.focused
            && current > 0
            && let Some(prev) = prev_file(&self.entries, current - 1)
        {
            self.focused = Some(prev);
        }
    }

    /// Stage or unstage the focused file, then rebuild.
    ///
    /// Staging leaves an ordinal-only anchor: the row vanishes from the
    /// unstaged group, so the cursor stays put and lands on its successor.
    /// Unstaging anchors on the path, so the cursor follows the file into
    /// its new group.
    pub fn toggle_focused(&mut self) -> Result<RebuildOutcome, GitError> {
        if !self.open {
            return Ok(RebuildOutcome::Closed);
        }
        let Some(idx) = self.focused else {
            return Ok(RebuildOutcome::Idle);
        };
        let Some(change) = self.entries[idx].as_file().cloned() else {
            return Ok(RebuildOutcome::Idle);
        };

        if change.staged {
            self.source.unstage(&change.path)?;
            self.pending_anchor = Some(Anchor {
                path: Some(change.path),
                ordinal: idx,
            });
        } else {
            self.source.stage(&change.path)?;
            self.pending_anchor = Some(Anchor {
                path: None,
                ordinal: idx,
            });
        }

        self.refresh()
    }

    /// Discard the focused file's changes, then rebuild.
    ///
    /// Irreversible; the host confirms before calling this. The entry is
    /// gone afterwards, so only the ordinal anchors the cursor.
    pub fn discard_focused(&mut self) -> Result<RebuildOutcome, GitError> {
        if !self.open {
            return Ok(RebuildOutcome::Closed);
        }
        let Some(idx) = self.focused else {
            return Ok(RebuildOutcome::Idle);
        };
        let Some(change) = self.entries[idx].as_file().cloned() else {
            return Ok(RebuildOutcome::Idle);
        };

        self.source.discard(&change)?;
        self.pending_anchor = Some(Anchor {
            path: None,
            ordinal: idx,
        });
        self.refresh()
    }

    /// Stage every unstaged entry, then rebuild.
    pub fn stage_all(&mut self) -> Result<RebuildOutcome, GitError> {
        if !self.open {
            return Ok(RebuildOutcome::Closed);
        }
        self.source.stage_all()?;
        self.pending_anchor = Some(self.current_anchor());
        self.refresh()
    }

    /// Unstage every staged entry, then rebuild.
    pub fn unstage_all(&mut self) -> Result<RebuildOutcome, GitError> {
        if !self.open {
            return Ok(RebuildOutcome::Closed);
        }
        self.source.unstage_all()?;
        self.pending_anchor = Some(self.current_anchor());
        self.refresh()
    }

    /// Record an external change notification.
    ///
    /// Payloads are never trusted; the rebuild re-queries the source once
    /// the debounce window quiesces.
    pub fn notify_changed(&mut self, now: Instant) {
        if self.open {
            self.debounce.arm(now);
        }
    }

    /// Run the debounced rebuild if its window has elapsed.
    pub fn tick(&mut self, now: Instant) -> Result<RebuildOutcome, GitError> {
        if !self.open || !self.debounce.fired(now) {
            return Ok(RebuildOutcome::Idle);
        }
        self.refresh()
    }

    /// Rebuild the list from fresh source state.
    ///
    /// At most one rebuild runs at a time: a request arriving while one is
    /// in flight is queued and coalesced into a single follow-up pass
    /// against the then-current state.
    pub fn refresh(&mut self) -> Result<RebuildOutcome, GitError> {
        if !self.open {
            return Ok(RebuildOutcome::Closed);
        }
        if self.rebuild_in_flight {
            self.rebuild_queued = true;
            return Ok(RebuildOutcome::Open);
        }

        self.rebuild_in_flight = true;
        let mut result = self.rebuild_once();
        while self.rebuild_queued && matches!(result, Ok(RebuildOutcome::Open)) {
            self.rebuild_queued = false;
            result = self.rebuild_once();
        }
        self.rebuild_queued = false;
        self.rebuild_in_flight = false;
        result
    }

    /// Dismiss the picker: cancel the pending debounce and drop list state.
    pub fn close(&mut self) {
        self.open = false;
        self.debounce.cancel();
        self.entries.clear();
        self.focused = None;
        self.pending_anchor = None;
    }

    fn rebuild_once(&mut self) -> Result<RebuildOutcome, GitError> {
        // On failure the pending anchor survives for the next attempt and
        // the previous list stays visible.
        let set = self.source.list_changes()?;

        if set.is_empty() {
            self.close();
            return Ok(RebuildOutcome::Closed);
        }

        let anchor = self
            .pending_anchor
            .take()
            .unwrap_or_else(|| self.current_anchor());
        let entries = build_entries(&set);
        let focused = resolve_focus(&entries, &anchor);

        // Swapped together: no reader ever sees new entries with old focus.
        self.entries = entries;
        self.focused = focused;
        Ok(RebuildOutcome::Open)
    }

    fn current_anchor(&self) -> Anchor {
        Anchor {
            path: self.focused_file().map(|c| c.path.clone()),
            ordinal: self.focused.unwrap_or(0),
        }
    }
}

/// Build the rendered list from a non-empty change set.
///
/// Each non-empty partition contributes a block of separator, bulk-action
/// row, then its files in source order. Staged block first, matching the
/// upstream picker layout.
fn build_entries(set: &ChangeSet) -> Vec<ListEntry> {
    let mut entries = Vec::with_capacity(set.len() + 4);

    if !set.staged.is_empty() {
        entries.push(ListEntry::Separator {
            group: Group::Staged,
            count: set.staged.len(),
        });
        entries.push(ListEntry::Action(BulkAction::UnstageAll));
        entries.extend(set.staged.iter().cloned().map(ListEntry::File));
    }

    if !set.unstaged.is_empty() {
        entries.push(ListEntry::Separator {
            group: Group::Unstaged,
            count: set.unstaged.len(),
        });
        entries.push(ListEntry::Action(BulkAction::StageAll));
        entries.extend(set.unstaged.iter().cloned().map(ListEntry::File));
    }

    entries
}

/// Compute the focus index for a freshly built list.
///
/// Path match wins. Otherwise fall back to the anchor's ordinal clamped to
/// bounds, skipping forward over synthetic entries, and backward when no
/// file follows.
fn resolve_focus(entries: &[ListEntry], anchor: &Anchor) -> Option<usize> {
    if entries.is_empty() {
        return None;
    }

    if let Some(path) = &anchor.path
        && let Some(idx) = entries
            .iter()
            .position(|e| e.as_file().is_some_and(|c| &c.path == path))
    {
        return Some(idx);
    }

    let start = anchor.ordinal.min(entries.len() - 1);
    next_file(entries, start).or_else(|| prev_file(entries, start))
}

/// First file entry at or after `from`.
fn next_file(entries: &[ListEntry], from: usize) -> Option<usize> {
    entries
        .iter()
        .enumerate()
        .skip(from)
        .find(|(_, e)| e.is_file())
        .map(|(i, _)| i)
}

/// Last file entry at or before `from`.
fn prev_file(entries: &[ListEntry], from: usize) -> Option<usize> {
    entries
        .iter()
        .enumerate()
        .take(from + 1)
        .rev()
        .find(|(_, e)| e.is_file())
        .map(|(i, _)| i)
}
