use crate::error::{Error, Result};
use crate::gfs::Gfs;
use crate::status::{GfsState, Update};
use crate::types::{NewCommit, Oid, Signature};

use super::{move_branch, subject, Command, Context};

/// Outcome of [`Commit::execute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitResult {
    Committed(Oid),
    /// The tree equals the head commit's tree; nothing was written.
    NoChange,
}

impl CommitResult {
    pub fn commit(&self) -> Option<Oid> {
        match self {
            Self::Committed(id) => Some(*id),
            Self::NoChange => None,
        }
    }
}

/// Record the working store as a new commit.
///
/// Parents follow the session: none on an unborn branch, the head commit
/// normally, head plus the merge source while finishing a merge, and the
/// head's own parents when amending.
#[derive(Debug)]
pub struct Commit {
    gfs: Gfs,
    executed: bool,
    author: Option<Signature>,
    committer: Option<Signature>,
    message: Option<String>,
    amend: bool,
    allow_empty: bool,
}

impl Commit {
    pub(crate) fn new(gfs: Gfs) -> Self {
        Self {
            gfs,
            executed: false,
            author: None,
            committer: None,
            message: None,
            amend: false,
            allow_empty: false,
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn author(mut self, author: Signature) -> Self {
        self.author = Some(author);
        self
    }

    pub fn committer(mut self, committer: Signature) -> Self {
        self.committer = Some(committer);
        self
    }

    pub fn amend(mut self, amend: bool) -> Self {
        self.amend = amend;
        self
    }

    pub fn allow_empty(mut self, allow_empty: bool) -> Self {
        self.allow_empty = allow_empty;
        self
    }

    pub fn execute(&mut self) -> Result<CommitResult> {
        let gfs = self.gfs.clone();
        gfs.execute(self)
    }
}

impl Command for Commit {
    type Output = CommitResult;

    const NAME: &'static str = "commit";

    fn executed(&mut self) -> &mut bool {
        &mut self.executed
    }

    fn state(&self) -> GfsState {
        GfsState::Committing
    }

    fn run(&mut self, ctx: &mut Context<'_>, update: &mut Update) -> Result<CommitResult> {
        let status = ctx.status;
        let note = status.merge_note();
        let head = status.head();
        let head_commit = head.map(|h| ctx.odb.read_commit(h)).transpose()?;
        if self.amend && head_commit.is_none() {
            return Err(Error::NoHeadCommit);
        }

        let merge_source = note.and_then(|n| n.source);
        let parents = match (&head_commit, merge_source) {
            (Some(h), _) if self.amend => h.parents.clone(),
            (Some(h), Some(source)) => vec![h.id, source],
            (Some(h), None) => vec![h.id],
            (None, _) => Vec::new(),
        };

        let tree = ctx.store.persist()?;
        if let Some(h) = &head_commit {
            if !self.allow_empty && !self.amend && h.tree == tree {
                tracing::debug!(tree = %tree, "nothing to commit");
                return Ok(CommitResult::NoChange);
            }
        }

        let message = self
            .message
            .clone()
            .or_else(|| note.map(|n| n.message.clone()))
            .unwrap_or_default();
        let committer = self
            .committer
            .clone()
            .unwrap_or_else(|| ctx.signature.clone());
        let author = match (&self.author, &head_commit) {
            (Some(author), _) => author.clone(),
            (None, Some(h)) if self.amend => h.author.clone(),
            _ => committer.clone(),
        };

        let id = ctx.odb.write_commit(&NewCommit {
            tree,
            parents,
            author,
            committer,
            message: message.clone(),
        })?;

        if let Some(branch) = status.branch() {
            let kind = if self.amend {
                "commit (amend)"
            } else if merge_source.is_some() {
                "commit (merge)"
            } else if head.is_none() {
                "commit (initial)"
            } else {
                "commit"
            };
            move_branch(
                ctx.refs,
                branch,
                head,
                id,
                &format!("{}: {}", kind, subject(&message)),
            )?;
        }

        ctx.store.update_origin(tree)?;
        update.head(id).clear_merge_note();
        tracing::info!(commit = %id, branch = ?status.branch(), "committed");
        Ok(CommitResult::Committed(id))
    }
}
