use crate::error::{Error, Result};
use crate::types::Oid;

/// What a session is doing. Between commands it is always `Normal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GfsState {
    Normal,
    Committing,
    Merging,
    CherryPicking,
    CheckingOut,
    Stashing,
    ApplyingStash,
    Resetting,
}

/// A merge that was applied to the working store but not yet committed.
///
/// `source` is the commit recorded as second parent by the next commit;
/// `None` for squash merges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeNote {
    pub source: Option<Oid>,
    pub message: String,
}

impl MergeNote {
    pub fn merge(source: Oid, message: impl Into<String>) -> Self {
        Self {
            source: Some(source),
            message: message.into(),
        }
    }

    pub fn squash(message: impl Into<String>) -> Self {
        Self {
            source: None,
            message: message.into(),
        }
    }
}

/// Branch binding, head commit and pending merge of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    state: GfsState,
    branch: Option<String>,
    head: Option<Oid>,
    merge_note: Option<MergeNote>,
}

impl Status {
    pub(crate) fn new(branch: Option<String>, head: Option<Oid>) -> Self {
        Self {
            state: GfsState::Normal,
            branch,
            head,
            merge_note: None,
        }
    }

    pub fn state(&self) -> GfsState {
        self.state
    }

    /// Short name of the attached branch, `None` when detached.
    pub fn branch(&self) -> Option<&str> {
        self.branch.as_deref()
    }

    pub fn is_attached(&self) -> bool {
        self.branch.is_some()
    }

    pub fn head(&self) -> Option<Oid> {
        self.head
    }

    /// Whether the session has a head commit (false on an unborn branch).
    pub fn is_initialized(&self) -> bool {
        self.head.is_some()
    }

    pub fn merge_note(&self) -> Option<&MergeNote> {
        self.merge_note.as_ref()
    }

    pub(crate) fn require_branch(&self) -> Result<&str> {
        self.branch()
            .ok_or_else(|| Error::no_branch("session is detached"))
    }

    pub(crate) fn require_head(&self) -> Result<Oid> {
        self.head.ok_or(Error::NoHeadCommit)
    }
}

/// Pending changes to a [`Status`], applied all at once.
///
/// A command edits the update while it runs. Only a command that returns
/// successfully commits it; an error drops it and the session keeps the
/// status it started with.
#[derive(Debug)]
pub struct Update {
    pending: Status,
}

impl Update {
    pub(crate) fn begin(status: &Status) -> Self {
        Self {
            pending: status.clone(),
        }
    }

    pub fn pending(&self) -> &Status {
        &self.pending
    }

    pub fn state(&mut self, state: GfsState) -> &mut Self {
        self.pending.state = state;
        self
    }

    pub fn attach(&mut self, branch: impl Into<String>) -> &mut Self {
        self.pending.branch = Some(branch.into());
        self
    }

    pub fn detach(&mut self) -> &mut Self {
        self.pending.branch = None;
        self
    }

    pub fn head(&mut self, commit: Oid) -> &mut Self {
        self.pending.head = Some(commit);
        self
    }

    pub fn merge_note(&mut self, note: MergeNote) -> &mut Self {
        self.pending.merge_note = Some(note);
        self
    }

    pub fn clear_merge_note(&mut self) -> &mut Self {
        self.pending.merge_note = None;
        self
    }

    pub(crate) fn commit(mut self, status: &mut Status) {
        self.pending.state = GfsState::Normal;
        *status = self.pending;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(byte: u8) -> Oid {
        Oid::from_bytes(&[byte; 20]).unwrap()
    }

    #[test]
    fn dropped_update_leaves_status_untouched() {
        let status = Status::new(Some("main".into()), Some(oid(1)));
        {
            let mut update = Update::begin(&status);
            update
                .state(GfsState::Committing)
                .head(oid(2))
                .merge_note(MergeNote::squash("x"));
        }
        assert_eq!(status.head(), Some(oid(1)));
        assert_eq!(status.merge_note(), None);
        assert_eq!(status.state(), GfsState::Normal);
    }

    #[test]
    fn committed_update_applies_everything_and_returns_to_normal() {
        let mut status = Status::new(Some("main".into()), Some(oid(1)));
        let mut update = Update::begin(&status);
        update
            .state(GfsState::Merging)
            .detach()
            .head(oid(3))
            .merge_note(MergeNote::merge(oid(4), "Merge branch 'dev'"));
        update.commit(&mut status);

        assert_eq!(status.state(), GfsState::Normal);
        assert!(!status.is_attached());
        assert_eq!(status.head(), Some(oid(3)));
        assert_eq!(status.merge_note().unwrap().source, Some(oid(4)));
    }

    #[test]
    fn requirements_report_missing_pieces() {
        let status = Status::new(None, None);
        assert!(matches!(status.require_branch(), Err(Error::NoBranch(_))));
        assert!(matches!(status.require_head(), Err(Error::NoHeadCommit)));
        assert!(!status.is_initialized());
    }
}
