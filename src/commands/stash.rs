use std::collections::BTreeMap;

use crate::checkout;
use crate::error::{Error, Result};
use crate::gfs::Gfs;
use crate::merge::{ConflictRecord, MergeLabels, MergeOutcome, Merger};
use crate::status::{GfsState, Update};
use crate::types::{short_id, NewCommit, Oid};

use super::{blocks_worktree, worktree_conflicts, write_conflicts, Command, Context};

/// Outcome of [`CreateStash::execute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StashResult {
    /// The work-in-progress commit pushed onto the stash.
    Stashed(Oid),
    /// The working store matches head; nothing was stashed.
    NoChange,
}

/// Save uncommitted edits on the stash and reset the working store to head.
///
/// Two commits are written: an index commit holding the working tree with
/// head as parent, and the work-in-progress commit with parents
/// `[head, index]`. Only the latter goes on the stash.
#[derive(Debug)]
pub struct CreateStash {
    gfs: Gfs,
    executed: bool,
    message: Option<String>,
    index_message: Option<String>,
}

impl CreateStash {
    pub(crate) fn new(gfs: Gfs) -> Self {
        Self {
            gfs,
            executed: false,
            message: None,
            index_message: None,
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn index_message(mut self, message: impl Into<String>) -> Self {
        self.index_message = Some(message.into());
        self
    }

    pub fn execute(&mut self) -> Result<StashResult> {
        let gfs = self.gfs.clone();
        gfs.execute(self)
    }
}

impl Command for CreateStash {
    type Output = StashResult;

    const NAME: &'static str = "stash";

    fn executed(&mut self) -> &mut bool {
        &mut self.executed
    }

    fn state(&self) -> GfsState {
        GfsState::Stashing
    }

    fn run(&mut self, ctx: &mut Context<'_>, _update: &mut Update) -> Result<StashResult> {
        let branch = ctx.status.require_branch()?.to_string();
        let head = ctx.status.require_head()?;
        let head_commit = ctx.odb.read_commit(head)?;

        let tree = ctx.store.persist()?;
        if tree == head_commit.tree {
            tracing::debug!("nothing to stash");
            return Ok(StashResult::NoChange);
        }

        let summary = format!(
            "{}: {} {}",
            branch,
            short_id(head),
            head_commit.subject()
        );
        let index_message = self
            .index_message
            .clone()
            .unwrap_or_else(|| format!("index on {}", summary));
        let message = self
            .message
            .clone()
            .unwrap_or_else(|| format!("WIP on {}", summary));

        let index = ctx.odb.write_commit(&NewCommit {
            tree,
            parents: vec![head],
            author: ctx.signature.clone(),
            committer: ctx.signature.clone(),
            message: index_message,
        })?;
        let wip = ctx.odb.write_commit(&NewCommit {
            tree,
            parents: vec![head, index],
            author: ctx.signature.clone(),
            committer: ctx.signature.clone(),
            message: message.clone(),
        })?;
        ctx.refs.push_stash(wip, &message)?;
        ctx.store.reset();
        tracing::info!(stash = %wip, branch = %branch, "stashed working tree");
        Ok(StashResult::Stashed(wip))
    }
}

/// Outcome of [`ApplyStash::execute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyStashResult {
    Applied,
    /// Uncommitted edits are in the way; nothing was changed.
    CheckoutConflict(BTreeMap<String, ConflictRecord>),
    /// Conflict markers were written into the working store.
    Conflicting(BTreeMap<String, ConflictRecord>),
}

/// Merge a stash entry into the working store.
///
/// The entry's first parent is the head it was made on; its changes since
/// then are merged onto the current head and the working store.
#[derive(Debug)]
pub struct ApplyStash {
    gfs: Gfs,
    executed: bool,
    index: usize,
    pop: bool,
}

impl ApplyStash {
    pub(crate) fn new(gfs: Gfs) -> Self {
        Self {
            gfs,
            executed: false,
            index: 0,
            pop: false,
        }
    }

    /// Stash entry to apply; 0, the most recent, by default.
    pub fn index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    /// Drop the entry once it applied cleanly.
    pub fn pop(mut self, pop: bool) -> Self {
        self.pop = pop;
        self
    }

    pub fn execute(&mut self) -> Result<ApplyStashResult> {
        let gfs = self.gfs.clone();
        gfs.execute(self)
    }
}

impl Command for ApplyStash {
    type Output = ApplyStashResult;

    const NAME: &'static str = "stash apply";

    fn executed(&mut self) -> &mut bool {
        &mut self.executed
    }

    fn state(&self) -> GfsState {
        GfsState::ApplyingStash
    }

    fn run(&mut self, ctx: &mut Context<'_>, _update: &mut Update) -> Result<ApplyStashResult> {
        let head = ctx.status.require_head()?;
        let name = format!("stash@{{{}}}", self.index);
        let stash = ctx
            .refs
            .peek_stash(self.index)?
            .ok_or_else(|| Error::not_found(&name))?;
        let stash_commit = ctx.odb.read_commit(stash)?;
        let base = match stash_commit.parents.first() {
            Some(parent) => Some(ctx.odb.read_commit(*parent)?.tree),
            None => None,
        };
        let head_tree = ctx.odb.read_commit(head)?.tree;
        let labels = MergeLabels {
            base: "BASE".into(),
            ours: "HEAD".into(),
            theirs: name.clone(),
        };

        let worktree = ctx.store.persist()?;
        let outcome = Merger::new(ctx.odb)
            .labels(labels.clone())
            .worktree(Some(worktree))
            .merge(base, head_tree, stash_commit.tree)?;

        match outcome {
            MergeOutcome::Success(tree) => {
                let plan = checkout::plan_for(ctx.store, ctx.odb, tree)?;
                if !plan.is_clean() {
                    return Ok(ApplyStashResult::CheckoutConflict(worktree_conflicts(
                        plan.conflicts,
                        &labels,
                    )));
                }
                checkout::apply(ctx.store, &plan)?;
                if self.pop {
                    ctx.refs.drop_stash(self.index)?;
                }
                tracing::info!(stash = %name, pop = self.pop, "applied stash");
                Ok(ApplyStashResult::Applied)
            }
            MergeOutcome::Conflicting { conflicts, partial } => {
                if blocks_worktree(&conflicts) {
                    return Ok(ApplyStashResult::CheckoutConflict(conflicts));
                }
                let plan = checkout::plan_for(ctx.store, ctx.odb, partial)?;
                if !plan.is_clean() {
                    return Ok(ApplyStashResult::CheckoutConflict(worktree_conflicts(
                        plan.conflicts,
                        &labels,
                    )));
                }
                checkout::apply(ctx.store, &plan)?;
                write_conflicts(ctx.store, &conflicts)?;
                tracing::info!(stash = %name, conflicts = conflicts.len(), "stash applied with conflicts");
                Ok(ApplyStashResult::Conflicting(conflicts))
            }
        }
    }
}
