use std::collections::BTreeMap;

use crate::checkout;
use crate::error::{Error, Result};
use crate::gfs::Gfs;
use crate::merge::{ConflictRecord, MergeLabels, MergeOutcome, Merger};
use crate::status::{GfsState, MergeNote, Update};
use crate::types::{NewCommit, Oid};

use super::{
    blocks_worktree, message_with_conflicts, move_branch, subject, worktree_conflicts,
    write_conflicts, Command, Context,
};

/// Outcome of [`CherryPick::execute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CherryPickResult {
    /// The new commit on head.
    Picked(Oid),
    /// The change is in the working store, awaiting a commit.
    PickedNotCommitted,
    /// Uncommitted edits are in the way; nothing was changed.
    CheckoutConflict(BTreeMap<String, ConflictRecord>),
    /// Conflict markers were written; commit to finish the pick.
    Conflicting(BTreeMap<String, ConflictRecord>),
}

/// Replay the change a commit made onto head.
#[derive(Debug)]
pub struct CherryPick {
    gfs: Gfs,
    executed: bool,
    revision: String,
    commit: bool,
}

impl CherryPick {
    pub(crate) fn new(gfs: Gfs, revision: impl Into<String>) -> Self {
        Self {
            gfs,
            executed: false,
            revision: revision.into(),
            commit: true,
        }
    }

    /// Write the picked commit on success (default `true`).
    pub fn commit(mut self, commit: bool) -> Self {
        self.commit = commit;
        self
    }

    pub fn execute(&mut self) -> Result<CherryPickResult> {
        let gfs = self.gfs.clone();
        gfs.execute(self)
    }
}

impl Command for CherryPick {
    type Output = CherryPickResult;

    const NAME: &'static str = "cherry-pick";

    fn executed(&mut self) -> &mut bool {
        &mut self.executed
    }

    fn state(&self) -> GfsState {
        GfsState::CherryPicking
    }

    fn run(&mut self, ctx: &mut Context<'_>, update: &mut Update) -> Result<CherryPickResult> {
        let head = ctx.status.require_head()?;
        let picked = ctx
            .refs
            .resolve_revision(&self.revision)?
            .ok_or_else(|| Error::no_such_revision(&self.revision))?;
        let picked = ctx.odb.read_commit(picked)?;
        let base = match picked.parents.first() {
            Some(parent) => Some(ctx.odb.read_commit(*parent)?.tree),
            None => None,
        };
        let head_tree = ctx.odb.read_commit(head)?.tree;
        let labels = MergeLabels {
            base: "BASE".into(),
            ours: "HEAD".into(),
            theirs: format!("{} ({})", picked.short_id(), picked.subject()),
        };

        let worktree = ctx.store.persist()?;
        let outcome = Merger::new(ctx.odb)
            .labels(labels.clone())
            .worktree(Some(worktree))
            .merge(base, head_tree, picked.tree)?;

        match outcome {
            MergeOutcome::Success(tree) => {
                let plan = checkout::plan_for(ctx.store, ctx.odb, tree)?;
                if !plan.is_clean() {
                    return Ok(CherryPickResult::CheckoutConflict(worktree_conflicts(
                        plan.conflicts,
                        &labels,
                    )));
                }
                if !self.commit {
                    checkout::apply(ctx.store, &plan)?;
                    update.merge_note(MergeNote::squash(picked.message.clone()));
                    return Ok(CherryPickResult::PickedNotCommitted);
                }

                let id = ctx.odb.write_commit(&NewCommit {
                    tree,
                    parents: vec![head],
                    author: picked.author.clone(),
                    committer: ctx.signature.clone(),
                    message: picked.message.clone(),
                })?;
                if let Some(branch) = ctx.status.branch() {
                    move_branch(
                        ctx.refs,
                        branch,
                        Some(head),
                        id,
                        &format!("cherry-pick: {}", subject(&picked.message)),
                    )?;
                }
                checkout::apply(ctx.store, &plan)?;
                ctx.store.update_origin(tree)?;
                update.head(id);
                tracing::info!(picked = %picked.id, commit = %id, "cherry-picked");
                Ok(CherryPickResult::Picked(id))
            }
            MergeOutcome::Conflicting { conflicts, partial } => {
                if blocks_worktree(&conflicts) {
                    return Ok(CherryPickResult::CheckoutConflict(conflicts));
                }
                let plan = checkout::plan_for(ctx.store, ctx.odb, partial)?;
                if !plan.is_clean() {
                    return Ok(CherryPickResult::CheckoutConflict(worktree_conflicts(
                        plan.conflicts,
                        &labels,
                    )));
                }
                checkout::apply(ctx.store, &plan)?;
                write_conflicts(ctx.store, &conflicts)?;
                update.merge_note(MergeNote::squash(message_with_conflicts(
                    &picked.message,
                    &conflicts,
                )));
                tracing::info!(picked = %picked.id, conflicts = conflicts.len(), "cherry-pick stopped on conflicts");
                Ok(CherryPickResult::Conflicting(conflicts))
            }
        }
    }
}
