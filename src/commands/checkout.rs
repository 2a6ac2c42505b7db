use std::collections::BTreeMap;

use crate::checkout::{self, CheckoutConflict};
use crate::error::{Error, Result};
use crate::gfs::Gfs;
use crate::paths::short_branch_name;
use crate::status::{GfsState, Update};

use super::{Command, Context};

/// Outcome of [`Checkout::execute`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutResult {
    Success,
    /// Uncommitted edits collide with the target; nothing was changed.
    Conflicting(BTreeMap<String, CheckoutConflict>),
}

/// Switch the session to another branch or commit, carrying uncommitted
/// edits along.
#[derive(Debug)]
pub struct Checkout {
    gfs: Gfs,
    executed: bool,
    target: String,
    force: bool,
    detach: bool,
}

impl Checkout {
    pub(crate) fn new(gfs: Gfs, target: impl Into<String>) -> Self {
        Self {
            gfs,
            executed: false,
            target: target.into(),
            force: false,
            detach: false,
        }
    }

    /// Discard uncommitted edits first.
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Leave the session detached even when the target names a branch.
    pub fn detach(mut self, detach: bool) -> Self {
        self.detach = detach;
        self
    }

    pub fn execute(&mut self) -> Result<CheckoutResult> {
        let gfs = self.gfs.clone();
        gfs.execute(self)
    }
}

impl Command for Checkout {
    type Output = CheckoutResult;

    const NAME: &'static str = "checkout";

    fn executed(&mut self) -> &mut bool {
        &mut self.executed
    }

    fn state(&self) -> GfsState {
        GfsState::CheckingOut
    }

    fn run(&mut self, ctx: &mut Context<'_>, update: &mut Update) -> Result<CheckoutResult> {
        let target = self.target.as_str();
        let branch_name = short_branch_name(target).unwrap_or(target);
        let (branch, commit) = match ctx.refs.resolve_branch(branch_name)? {
            Some(commit) if !self.detach => (Some(branch_name), commit),
            _ => match ctx.refs.resolve_revision(target)? {
                Some(commit) => (None, commit),
                None if self.detach => return Err(Error::no_such_revision(target)),
                None => return Err(Error::no_such_branch(target)),
            },
        };
        let tree = ctx.odb.read_commit(commit)?.tree;

        if self.force {
            ctx.store.reset();
        }
        let plan = checkout::plan_for(ctx.store, ctx.odb, tree)?;
        if !plan.is_clean() {
            tracing::info!(target, conflicts = plan.conflicts.len(), "checkout blocked");
            return Ok(CheckoutResult::Conflicting(plan.conflicts));
        }
        checkout::apply(ctx.store, &plan)?;
        ctx.store.update_origin(tree)?;

        match branch {
            Some(b) => update.attach(b),
            None => update.detach(),
        };
        update.head(commit);
        tracing::info!(target, commit = %commit, detached = branch.is_none(), "checked out");
        Ok(CheckoutResult::Success)
    }
}
