//! Git-style commands over a [`Gfs`](crate::Gfs) session.
//!
//! Each command is a builder: set options, then call `execute()` once.
//! Execution holds the session lock, starts from a required state, and
//! edits the session [`Status`] through an [`Update`] that is applied only
//! if the command succeeds.

mod checkout;
mod cherry_pick;
mod commit;
mod merge;
mod reset;
mod stash;

pub use checkout::{Checkout, CheckoutResult};
pub use cherry_pick::{CherryPick, CherryPickResult};
pub use commit::{Commit, CommitResult};
pub use merge::{Merge, MergeResult};
pub use reset::{Reset, ResetResult};
pub use stash::{ApplyStash, ApplyStashResult, CreateStash, StashResult};

use std::collections::BTreeMap;

use crate::checkout::CheckoutConflict;
use crate::error::{Error, Result};
use crate::merge::{ConflictKind, ConflictRecord, MergeLabels};
use crate::odb::{ObjectStore, RefStore};
use crate::paths::branch_ref;
use crate::status::{GfsState, Status, Update};
use crate::types::{Oid, Signature};
use crate::working_store::WorkingStore;

/// What a command sees while it runs.
pub(crate) struct Context<'a> {
    pub(crate) odb: &'a dyn ObjectStore,
    pub(crate) refs: &'a dyn RefStore,
    pub(crate) store: &'a mut WorkingStore,
    /// Status as it was when the command started.
    pub(crate) status: &'a Status,
    pub(crate) signature: &'a Signature,
}

pub(crate) trait Command {
    type Output;

    const NAME: &'static str;

    /// Flag flipped on first execution.
    fn executed(&mut self) -> &mut bool;

    /// State the session is in while this command runs.
    fn state(&self) -> GfsState;

    /// Whether the command may start from the stored `state`.
    ///
    /// Commands run to completion under the session mutex and every
    /// committed [`Update`] returns the session to `Normal`, so no command
    /// ever starts inside another; pending merges are carried by the
    /// merge note instead.
    fn accepts(&self, state: GfsState) -> bool {
        state == GfsState::Normal
    }

    fn run(&mut self, ctx: &mut Context<'_>, update: &mut Update) -> Result<Self::Output>;
}

/// Move `branch` from `expected` to `new`, failing with
/// [`Error::StaleRef`] if it moved underneath us.
pub(crate) fn move_branch(
    refs: &dyn RefStore,
    branch: &str,
    expected: Option<Oid>,
    new: Oid,
    log_message: &str,
) -> Result<()> {
    let name = branch_ref(branch);
    if refs.update_ref(&name, expected, new, log_message)? {
        Ok(())
    } else {
        Err(Error::stale_ref(format!(
            "{} no longer points at {}",
            name,
            expected.map_or_else(|| "nothing".to_string(), |o| o.to_string())
        )))
    }
}

/// Resolve a merge or pick source, preferring a local branch.
///
/// Returns the commit and whether `source` named a branch.
pub(crate) fn resolve_source(refs: &dyn RefStore, source: &str) -> Result<(Oid, bool)> {
    if let Some(commit) = refs.resolve_branch(source)? {
        return Ok((commit, true));
    }
    match refs.resolve_revision(source)? {
        Some(commit) => Ok((commit, false)),
        None => Err(Error::no_such_branch(source)),
    }
}

/// Checkout collisions expressed as merge conflict records.
pub(crate) fn worktree_conflicts(
    conflicts: BTreeMap<String, CheckoutConflict>,
    labels: &MergeLabels,
) -> BTreeMap<String, ConflictRecord> {
    conflicts
        .into_iter()
        .map(|(path, c)| {
            let record = ConflictRecord {
                kind: ConflictKind::Worktree,
                base: None,
                ours: c.head,
                theirs: c.target,
                worktree: c.worktree,
                contents: None,
                labels: labels.clone(),
            };
            (path, record)
        })
        .collect()
}

/// Write marker-annotated content for every content conflict into `store`.
pub(crate) fn write_conflicts(
    store: &mut WorkingStore,
    conflicts: &BTreeMap<String, ConflictRecord>,
) -> Result<()> {
    for (path, record) in conflicts {
        if record.kind != ConflictKind::Content {
            continue;
        }
        let Some(content) = record.format() else {
            continue;
        };
        let file_type = record
            .ours
            .map(|e| e.file_type)
            .filter(|ft| ft.is_file())
            .unwrap_or(crate::types::FileType::Blob);
        store.write_with_type(path, content, file_type)?;
    }
    Ok(())
}

/// Whether any conflict is in the way of uncommitted edits.
pub(crate) fn blocks_worktree(conflicts: &BTreeMap<String, ConflictRecord>) -> bool {
    conflicts.values().any(|c| c.kind == ConflictKind::Worktree)
}

/// `Merge` message followed by the list of unmerged paths.
pub(crate) fn message_with_conflicts(
    message: &str,
    conflicts: &BTreeMap<String, ConflictRecord>,
) -> String {
    let mut out = String::from(message);
    out.push_str("\n\nConflicts:\n");
    for path in conflicts.keys() {
        out.push('\t');
        out.push_str(path);
        out.push('\n');
    }
    out
}

/// First line of a commit message, for ref logs.
pub(crate) fn subject(message: &str) -> &str {
    message.lines().next().unwrap_or("")
}
