use std::sync::{Arc, Mutex, MutexGuard};

use crate::commands::{
    ApplyStash, Checkout, CherryPick, Command, Commit, Context, CreateStash, Merge, Reset,
};
use crate::error::{Error, Result};
use crate::odb::{ObjectStore, RefStore};
use crate::paths::{short_branch_name, validate_ref_name};
use crate::status::{Status, Update};
use crate::store::GitStore;
use crate::types::{DirEntry, FileType, GfsOptions, Oid, Signature, StashEntry};
use crate::working_store::WorkingStore;

struct Session {
    store: WorkingStore,
    status: Status,
    closed: bool,
}

struct GfsInner {
    id: String,
    odb: Arc<dyn ObjectStore>,
    refs: Arc<dyn RefStore>,
    signature: Signature,
    session: Mutex<Session>,
}

/// A working session: a [`WorkingStore`] plus the [`Status`] saying which
/// branch and commit it sits on.
///
/// Cheap to clone; clones share the session. File operations and commands
/// serialize on one lock, so a command never observes a half-applied edit.
#[derive(Clone)]
pub struct Gfs {
    inner: Arc<GfsInner>,
}

impl Gfs {
    pub(crate) fn open(store: &GitStore, options: GfsOptions) -> Result<Self> {
        let signature = options
            .signature
            .clone()
            .unwrap_or_else(|| store.signature().clone());
        Self::with_stores(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            signature,
            options,
        )
    }

    /// Open a session over arbitrary object and ref stores.
    pub fn with_stores(
        odb: Arc<dyn ObjectStore>,
        refs: Arc<dyn RefStore>,
        signature: Signature,
        options: GfsOptions,
    ) -> Result<Self> {
        let (branch, head) = bind(refs.as_ref(), &options)?;
        let base_tree = match head {
            Some(h) => Some(odb.read_commit(h)?.tree),
            None => None,
        };
        let id = uuid::Uuid::new_v4().to_string();
        tracing::debug!(session = %id, branch = ?branch, head = ?head, "opened session");

        Ok(Gfs {
            inner: Arc::new(GfsInner {
                id,
                session: Mutex::new(Session {
                    store: WorkingStore::new(Arc::clone(&odb), base_tree),
                    status: Status::new(branch, head),
                    closed: false,
                }),
                odb,
                refs,
                signature,
            }),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.inner.id
    }

    /// Snapshot of the session status.
    pub fn status(&self) -> Result<Status> {
        Ok(self.lock()?.status.clone())
    }

    pub fn is_dirty(&self) -> Result<bool> {
        self.with_store(|s| Ok(s.is_dirty()))
    }

    /// Mark the session closed. Every later call fails with
    /// [`Error::Closed`].
    pub fn close(&self) -> Result<()> {
        let mut session = self.lock()?;
        if !session.closed {
            session.closed = true;
            tracing::debug!(session = %self.inner.id, "closed session");
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.inner
            .session
            .lock()
            .map(|s| s.closed)
            .unwrap_or(true)
    }

    // -----------------------------------------------------------------------
    // File operations
    // -----------------------------------------------------------------------

    pub fn exists(&self, path: &str) -> Result<bool> {
        self.with_store(|s| s.exists(path))
    }

    pub fn is_dir(&self, path: &str) -> Result<bool> {
        self.with_store(|s| s.is_dir(path))
    }

    pub fn file_type(&self, path: &str) -> Result<Option<FileType>> {
        self.with_store(|s| s.file_type(path))
    }

    pub fn size(&self, path: &str) -> Result<u64> {
        self.with_store(|s| s.size(path))
    }

    pub fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.with_store(|s| s.read(path))
    }

    pub fn read_text(&self, path: &str) -> Result<String> {
        self.with_store(|s| s.read_text(path))
    }

    pub fn read_link(&self, path: &str) -> Result<String> {
        self.with_store(|s| s.read_link(path))
    }

    pub fn list(&self, path: &str) -> Result<Vec<DirEntry>> {
        self.with_store(|s| s.list(path))
    }

    pub fn write(&self, path: &str, data: impl Into<Vec<u8>>) -> Result<()> {
        let data = data.into();
        self.with_store(|s| s.write(path, data))
    }

    pub fn write_text(&self, path: &str, text: &str) -> Result<()> {
        self.with_store(|s| s.write_text(path, text))
    }

    pub fn write_with_type(
        &self,
        path: &str,
        data: impl Into<Vec<u8>>,
        file_type: FileType,
    ) -> Result<()> {
        let data = data.into();
        self.with_store(|s| s.write_with_type(path, data, file_type))
    }

    pub fn write_symlink(&self, path: &str, target: &str) -> Result<()> {
        self.with_store(|s| s.write_symlink(path, target))
    }

    pub fn set_executable(&self, path: &str, executable: bool) -> Result<()> {
        self.with_store(|s| s.set_executable(path, executable))
    }

    pub fn create_directory(&self, path: &str) -> Result<()> {
        self.with_store(|s| s.create_directory(path))
    }

    pub fn create_directories(&self, path: &str) -> Result<()> {
        self.with_store(|s| s.create_directories(path))
    }

    pub fn delete(&self, path: &str) -> Result<()> {
        self.with_store(|s| s.delete(path))
    }

    pub fn copy(&self, src: &str, dst: &str, replace: bool) -> Result<()> {
        self.with_store(|s| s.copy(src, dst, replace))
    }

    pub fn rename(&self, src: &str, dst: &str, replace: bool) -> Result<()> {
        self.with_store(|s| s.rename(src, dst, replace))
    }

    /// Write pending changes to the object store and return the root tree.
    pub fn persist(&self) -> Result<Oid> {
        self.with_store(|s| s.persist())
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    pub fn commit(&self) -> Commit {
        Commit::new(self.clone())
    }

    pub fn checkout(&self, target: impl Into<String>) -> Checkout {
        Checkout::new(self.clone(), target)
    }

    pub fn merge(&self, source: impl Into<String>) -> Merge {
        Merge::new(self.clone(), source)
    }

    pub fn reset(&self) -> Reset {
        Reset::new(self.clone())
    }

    pub fn stash(&self) -> CreateStash {
        CreateStash::new(self.clone())
    }

    pub fn apply_stash(&self) -> ApplyStash {
        ApplyStash::new(self.clone())
    }

    pub fn cherry_pick(&self, revision: impl Into<String>) -> CherryPick {
        CherryPick::new(self.clone(), revision)
    }

    // -----------------------------------------------------------------------
    // Branches and stash
    // -----------------------------------------------------------------------

    /// Create a branch at `start` (a revision), or at head when `None`.
    pub fn create_branch(&self, name: &str, start: Option<&str>) -> Result<Oid> {
        let target = match start {
            Some(rev) => self
                .inner
                .refs
                .resolve_revision(rev)?
                .ok_or_else(|| Error::no_such_revision(rev))?,
            None => self.status()?.require_head()?,
        };
        self.inner.refs.create_branch(name, target)?;
        tracing::info!(branch = name, commit = %target, "created branch");
        Ok(target)
    }

    pub fn delete_branch(&self, name: &str) -> Result<()> {
        self.inner.refs.delete_branch(name)?;
        tracing::info!(branch = name, "deleted branch");
        Ok(())
    }

    pub fn list_branches(&self) -> Result<Vec<String>> {
        self.inner.refs.list_branches()
    }

    pub fn list_stashes(&self) -> Result<Vec<StashEntry>> {
        self.inner.refs.list_stashes()
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Run `cmd` under the session lock.
    ///
    /// The status only changes if `cmd` returns `Ok`.
    pub(crate) fn execute<C: Command>(&self, cmd: &mut C) -> Result<C::Output> {
        if std::mem::replace(cmd.executed(), true) {
            return Err(Error::AlreadyExecuted);
        }
        let mut guard = self.lock()?;
        let session = &mut *guard;
        if session.closed {
            return Err(Error::Closed);
        }
        let state = session.status.state();
        if !cmd.accepts(state) {
            return Err(Error::IllegalState(state));
        }

        let span = tracing::info_span!("gfs_command", command = C::NAME, session = %self.inner.id);
        let _enter = span.enter();

        let mut update = Update::begin(&session.status);
        update.state(cmd.state());
        let mut ctx = Context {
            odb: self.inner.odb.as_ref(),
            refs: self.inner.refs.as_ref(),
            store: &mut session.store,
            status: &session.status,
            signature: &self.inner.signature,
        };
        let output = cmd.run(&mut ctx, &mut update).map_err(|e| {
            tracing::warn!(error = %e, "command failed");
            e
        })?;
        update.commit(&mut session.status);
        Ok(output)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Session>> {
        self.inner
            .session
            .lock()
            .map_err(|e| Error::git_msg(e.to_string()))
    }

    fn with_store<T>(&self, f: impl FnOnce(&mut WorkingStore) -> Result<T>) -> Result<T> {
        let mut session = self.lock()?;
        if session.closed {
            return Err(Error::Closed);
        }
        f(&mut session.store)
    }
}

impl std::fmt::Debug for Gfs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gfs").field("id", &self.inner.id).finish()
    }
}

/// Decide which branch and commit a new session starts on.
fn bind(refs: &dyn RefStore, options: &GfsOptions) -> Result<(Option<String>, Option<Oid>)> {
    if let Some(branch) = &options.branch {
        let name = short_branch_name(branch).unwrap_or(branch);
        if let Some(head) = refs.resolve_branch(name)? {
            return Ok((Some(name.to_string()), Some(head)));
        }
        if let Some(commit) = refs.resolve_revision(branch)? {
            return Ok((None, Some(commit)));
        }
        validate_ref_name(name)?;
        return Ok((Some(name.to_string()), None));
    }
    if let Some(rev) = &options.revision {
        return match refs.resolve_revision(rev)? {
            Some(commit) => Ok((None, Some(commit))),
            None => Err(Error::no_such_revision(rev)),
        };
    }
    match refs.default_branch()? {
        Some(branch) => {
            let head = refs.resolve_branch(&branch)?;
            Ok((Some(branch), head))
        }
        None => Err(Error::no_branch("HEAD does not name a branch")),
    }
}
