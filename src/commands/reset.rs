use crate::error::{Error, Result};
use crate::gfs::Gfs;
use crate::status::{GfsState, Update};
use crate::types::Oid;

use super::{move_branch, Command, Context};

/// Outcome of [`Reset::execute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetResult {
    /// The branch now points at this commit.
    Success(Oid),
}

/// Move the attached branch to a commit.
///
/// By default the working store is reset to the commit's tree as well;
/// `soft` keeps uncommitted edits, `hard` also drops a pending merge.
#[derive(Debug)]
pub struct Reset {
    gfs: Gfs,
    executed: bool,
    revision: Option<String>,
    soft: bool,
    hard: bool,
}

impl Reset {
    pub(crate) fn new(gfs: Gfs) -> Self {
        Self {
            gfs,
            executed: false,
            revision: None,
            soft: false,
            hard: false,
        }
    }

    /// Target commit; defaults to the current head.
    pub fn revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    pub fn soft(mut self, soft: bool) -> Self {
        self.soft = soft;
        self
    }

    pub fn hard(mut self, hard: bool) -> Self {
        self.hard = hard;
        self
    }

    pub fn execute(&mut self) -> Result<ResetResult> {
        let gfs = self.gfs.clone();
        gfs.execute(self)
    }
}

impl Command for Reset {
    type Output = ResetResult;

    const NAME: &'static str = "reset";

    fn executed(&mut self) -> &mut bool {
        &mut self.executed
    }

    fn state(&self) -> GfsState {
        GfsState::Resetting
    }

    fn run(&mut self, ctx: &mut Context<'_>, update: &mut Update) -> Result<ResetResult> {
        let branch = ctx.status.require_branch()?.to_string();
        let head = ctx.status.head();
        let (target, label) = match &self.revision {
            Some(rev) => match ctx.refs.resolve_revision(rev)? {
                Some(commit) => (commit, rev.clone()),
                None => return Err(Error::no_such_revision(rev)),
            },
            None => {
                let commit = ctx.status.require_head()?;
                (commit, commit.to_string())
            }
        };
        let tree = ctx.odb.read_commit(target)?.tree;

        move_branch(
            ctx.refs,
            &branch,
            head,
            target,
            &format!("reset: moving to {}", label),
        )?;
        if self.soft {
            ctx.store.update_origin(tree)?;
        } else {
            ctx.store.reset_to(Some(tree));
        }
        if self.hard {
            update.clear_merge_note();
        }
        update.head(target);
        tracing::info!(branch = %branch, commit = %target, soft = self.soft, hard = self.hard, "reset");
        Ok(ResetResult::Success(target))
    }
}
