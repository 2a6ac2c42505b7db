//! Interfaces to the content-addressed object database and the ref store.
//!
//! Everything above this layer (working store, merge engine, commands) talks
//! to storage only through these two traits. [`crate::GitStore`] implements
//! both on top of a git repository; tests wrap it to observe writes.

use crate::error::Result;
use crate::types::{CommitInfo, NewCommit, Oid, StashEntry, TreeEntry};

/// Immutable, content-addressed object storage.
///
/// Writes are idempotent: writing the same content twice yields the same id.
pub trait ObjectStore: Send + Sync {
    fn read_blob(&self, id: Oid) -> Result<Vec<u8>>;

    fn blob_size(&self, id: Oid) -> Result<u64> {
        Ok(self.read_blob(id)?.len() as u64)
    }

    /// Entries of a tree object, in the store's canonical order.
    fn read_tree(&self, id: Oid) -> Result<Vec<TreeEntry>>;

    fn write_blob(&self, data: &[u8]) -> Result<Oid>;

    fn write_tree(&self, entries: &[TreeEntry]) -> Result<Oid>;

    fn read_commit(&self, id: Oid) -> Result<CommitInfo>;

    fn write_commit(&self, commit: &NewCommit) -> Result<Oid>;

    /// Best common ancestor of two commits, `None` for unrelated histories.
    fn merge_base(&self, a: Oid, b: Oid) -> Result<Option<Oid>>;

    /// Whether `ancestor` is reachable from `descendant`. Reflexive.
    fn is_ancestor(&self, ancestor: Oid, descendant: Oid) -> Result<bool>;
}

/// Named, mutable pointers to commits.
pub trait RefStore: Send + Sync {
    /// Commit a local branch points at, `None` if the branch does not exist.
    fn resolve_branch(&self, branch: &str) -> Result<Option<Oid>>;

    /// Resolve any revision expression to a commit id.
    fn resolve_revision(&self, revision: &str) -> Result<Option<Oid>>;

    /// Short name of the branch HEAD points at, if HEAD is symbolic.
    fn default_branch(&self) -> Result<Option<String>>;

    /// Compare-and-swap a ref.
    ///
    /// Moves `name` to `new` only if it currently points at `expected`
    /// (`None` = must not exist). Returns `Ok(false)` when the ref moved
    /// underneath the caller.
    fn update_ref(&self, name: &str, expected: Option<Oid>, new: Oid, log_message: &str)
        -> Result<bool>;

    fn create_branch(&self, branch: &str, target: Oid) -> Result<()>;

    fn delete_branch(&self, branch: &str) -> Result<()>;

    /// Short names of all local branches, sorted.
    fn list_branches(&self) -> Result<Vec<String>>;

    fn push_stash(&self, commit: Oid, message: &str) -> Result<()>;

    /// Stash commit at `index` (0 = most recent).
    fn peek_stash(&self, index: usize) -> Result<Option<Oid>>;

    /// Remove the stash entry at `index`, returning its commit.
    fn drop_stash(&self, index: usize) -> Result<Option<Oid>>;

    fn list_stashes(&self) -> Result<Vec<StashEntry>>;
}
