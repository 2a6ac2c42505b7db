use std::collections::{BTreeMap, HashSet, VecDeque};

use crate::checkout;
use crate::error::Result;
use crate::gfs::Gfs;
use crate::merge::{ConflictRecord, MergeLabels, MergeOutcome, MergeStrategy, Merger};
use crate::odb::ObjectStore;
use crate::status::{GfsState, MergeNote, Update};
use crate::types::{NewCommit, Oid};

use super::{
    blocks_worktree, message_with_conflicts, move_branch, resolve_source, worktree_conflicts,
    write_conflicts, Command, Context,
};

/// Outcome of [`Merge::execute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeResult {
    /// The source is already contained in head.
    AlreadyUpToDate(Oid),
    /// The branch now points at the source commit.
    FastForward(Oid),
    /// The source tree is in the working store; the branch did not move.
    FastForwardSquashed,
    /// A merge commit was written.
    Merged(Oid),
    MergedSquashed,
    /// The merged tree is in the working store, awaiting a commit.
    MergedNotCommitted,
    /// Not a fast-forward and only fast-forwards were allowed.
    Aborted,
    /// Uncommitted edits are in the way; nothing was changed.
    CheckoutConflict(BTreeMap<String, ConflictRecord>),
    /// Conflict markers were written; commit to finish the merge.
    Conflicting(BTreeMap<String, ConflictRecord>),
}

/// Merge a branch or commit into the attached branch.
#[derive(Debug)]
pub struct Merge {
    gfs: Gfs,
    executed: bool,
    source: String,
    strategy: MergeStrategy,
    squash: bool,
    commit: bool,
    fast_forward_only: bool,
    message: Option<String>,
}

impl Merge {
    pub(crate) fn new(gfs: Gfs, source: impl Into<String>) -> Self {
        Self {
            gfs,
            executed: false,
            source: source.into(),
            strategy: MergeStrategy::default(),
            squash: false,
            commit: true,
            fast_forward_only: false,
            message: None,
        }
    }

    pub fn strategy(mut self, strategy: MergeStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Apply the changes without recording the source as a parent.
    pub fn squash(mut self, squash: bool) -> Self {
        self.squash = squash;
        self
    }

    /// Write a merge commit on success (default `true`).
    pub fn commit(mut self, commit: bool) -> Self {
        self.commit = commit;
        self
    }

    pub fn fast_forward_only(mut self, only: bool) -> Self {
        self.fast_forward_only = only;
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn execute(&mut self) -> Result<MergeResult> {
        let gfs = self.gfs.clone();
        gfs.execute(self)
    }

    fn default_message(&self, is_branch: bool, branch: &str) -> String {
        if !is_branch {
            format!("Merge commit '{}'", self.source)
        } else if branch == "main" || branch == "master" {
            format!("Merge branch '{}'", self.source)
        } else {
            format!("Merge branch '{}' into {}", self.source, branch)
        }
    }
}

impl Command for Merge {
    type Output = MergeResult;

    const NAME: &'static str = "merge";

    fn executed(&mut self) -> &mut bool {
        &mut self.executed
    }

    fn state(&self) -> GfsState {
        GfsState::Merging
    }

    fn run(&mut self, ctx: &mut Context<'_>, update: &mut Update) -> Result<MergeResult> {
        let branch = ctx.status.require_branch()?.to_string();
        let head = ctx.status.head();
        let (source, is_branch) = resolve_source(ctx.refs, &self.source)?;
        let labels = MergeLabels {
            base: "BASE".into(),
            ours: "HEAD".into(),
            theirs: self.source.clone(),
        };

        if let Some(h) = head {
            if ctx.odb.is_ancestor(source, h)? {
                tracing::info!(source = %self.source, "already up to date");
                return Ok(MergeResult::AlreadyUpToDate(h));
            }
        }

        let source_tree = ctx.odb.read_commit(source)?.tree;
        let fast_forward = match head {
            None => true,
            Some(h) => ctx.odb.is_ancestor(h, source)?,
        };

        if fast_forward {
            let plan = checkout::plan_for(ctx.store, ctx.odb, source_tree)?;
            if !plan.is_clean() {
                return Ok(MergeResult::CheckoutConflict(worktree_conflicts(
                    plan.conflicts,
                    &labels,
                )));
            }
            if self.squash {
                let message = match &self.message {
                    Some(m) => m.clone(),
                    None => squash_message(ctx.odb, head, source)?,
                };
                checkout::apply(ctx.store, &plan)?;
                update.merge_note(MergeNote::squash(message));
                return Ok(MergeResult::FastForwardSquashed);
            }
            move_branch(
                ctx.refs,
                &branch,
                head,
                source,
                &format!("merge {}: Fast-forward", self.source),
            )?;
            checkout::apply(ctx.store, &plan)?;
            ctx.store.update_origin(source_tree)?;
            update.head(source);
            tracing::info!(branch = %branch, commit = %source, "fast-forward");
            return Ok(MergeResult::FastForward(source));
        }

        if self.fast_forward_only {
            tracing::info!(source = %self.source, "not a fast-forward, aborting");
            return Ok(MergeResult::Aborted);
        }

        // `fast_forward` is true whenever head is unborn.
        let head = ctx.status.require_head()?;
        let head_tree = ctx.odb.read_commit(head)?.tree;
        let base_tree = match ctx.odb.merge_base(head, source)? {
            Some(base) => Some(ctx.odb.read_commit(base)?.tree),
            None => None,
        };
        let worktree = ctx.store.persist()?;
        let outcome = Merger::new(ctx.odb)
            .labels(labels.clone())
            .strategy(self.strategy)
            .worktree(Some(worktree))
            .merge(base_tree, head_tree, source_tree)?;

        let message = match &self.message {
            Some(m) => m.clone(),
            None if self.squash => squash_message(ctx.odb, Some(head), source)?,
            None => self.default_message(is_branch, &branch),
        };

        match outcome {
            MergeOutcome::Success(tree) => {
                let plan = checkout::plan_for(ctx.store, ctx.odb, tree)?;
                if !plan.is_clean() {
                    return Ok(MergeResult::CheckoutConflict(worktree_conflicts(
                        plan.conflicts,
                        &labels,
                    )));
                }
                if self.squash {
                    checkout::apply(ctx.store, &plan)?;
                    update.merge_note(MergeNote::squash(message));
                    return Ok(MergeResult::MergedSquashed);
                }
                if !self.commit {
                    checkout::apply(ctx.store, &plan)?;
                    update.merge_note(MergeNote::merge(source, message));
                    return Ok(MergeResult::MergedNotCommitted);
                }

                let id = ctx.odb.write_commit(&NewCommit {
                    tree,
                    parents: vec![head, source],
                    author: ctx.signature.clone(),
                    committer: ctx.signature.clone(),
                    message,
                })?;
                move_branch(
                    ctx.refs,
                    &branch,
                    Some(head),
                    id,
                    &format!(
                        "merge {}: Merge made by the '{}' strategy.",
                        self.source,
                        self.strategy.name()
                    ),
                )?;
                checkout::apply(ctx.store, &plan)?;
                ctx.store.update_origin(tree)?;
                update.head(id);
                tracing::info!(branch = %branch, commit = %id, "merged");
                Ok(MergeResult::Merged(id))
            }
            MergeOutcome::Conflicting { conflicts, partial } => {
                if blocks_worktree(&conflicts) {
                    return Ok(MergeResult::CheckoutConflict(conflicts));
                }
                let plan = checkout::plan_for(ctx.store, ctx.odb, partial)?;
                if !plan.is_clean() {
                    return Ok(MergeResult::CheckoutConflict(worktree_conflicts(
                        plan.conflicts,
                        &labels,
                    )));
                }
                checkout::apply(ctx.store, &plan)?;
                write_conflicts(ctx.store, &conflicts)?;

                let message = message_with_conflicts(&message, &conflicts);
                let note = if self.squash {
                    MergeNote::squash(message)
                } else {
                    MergeNote::merge(source, message)
                };
                update.merge_note(note);
                tracing::info!(
                    branch = %branch,
                    conflicts = conflicts.len(),
                    "merge stopped on conflicts"
                );
                Ok(MergeResult::Conflicting(conflicts))
            }
        }
    }
}

/// Describe every commit reachable from `source` but not from `head`.
fn squash_message(odb: &dyn ObjectStore, head: Option<Oid>, source: Oid) -> Result<String> {
    let mut out = String::from("Squashed commit of the following:\n");
    let mut seen = HashSet::new();
    let mut queue = VecDeque::from([source]);
    while let Some(id) = queue.pop_front() {
        if !seen.insert(id) {
            continue;
        }
        if let Some(h) = head {
            if odb.is_ancestor(id, h)? {
                continue;
            }
        }
        let commit = odb.read_commit(id)?;
        out.push_str(&format!(
            "\ncommit {}\nAuthor: {} <{}>\n\n",
            commit.id, commit.author.name, commit.author.email
        ));
        for line in commit.message.lines() {
            out.push_str("    ");
            out.push_str(line);
            out.push('\n');
        }
        queue.extend(commit.parents);
    }
    Ok(out)
}
