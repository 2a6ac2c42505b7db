use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::gfs::Gfs;
use crate::lock::with_repo_lock;
use crate::odb::{ObjectStore, RefStore};
use crate::paths::{branch_ref, short_branch_name, validate_ref_name, STASH_REF};
use crate::types::{
    short_id, CommitInfo, FileType, GfsOptions, NewCommit, Oid, OpenOptions, Signature,
    StashEntry, TreeEntry,
};

/// Internal state shared via `Arc`.
pub(crate) struct GitStoreInner {
    pub(crate) repo: Mutex<git2::Repository>,
    pub(crate) path: PathBuf,
    pub(crate) signature: Signature,
}

/// Object and ref storage backed by a git repository.
///
/// Cheap to clone (`Arc` internally). Implements [`ObjectStore`] and
/// [`RefStore`], so it can back any number of [`Gfs`] sessions.
#[derive(Clone)]
pub struct GitStore {
    pub(crate) inner: Arc<GitStoreInner>,
}

impl GitStore {
    /// Open (or create) a git repository at `path`.
    ///
    /// New repositories are bare. When `options.branch` is set on creation,
    /// the branch gets an initial empty-tree commit and HEAD points at it.
    pub fn open(path: impl AsRef<Path>, options: OpenOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let sig = Signature::new(
            options.author.unwrap_or_else(|| "gitvfs".into()),
            options.email.unwrap_or_else(|| "gitvfs@localhost".into()),
        );

        let repo = if path.exists() {
            git2::Repository::open(&path).map_err(Error::git)?
        } else if options.create {
            std::fs::create_dir_all(&path).map_err(|e| Error::io(&path, e))?;
            let repo = git2::Repository::init_bare(&path).map_err(Error::git)?;

            if let Some(ref branch) = options.branch {
                Self::init_branch(&repo, branch, &sig)?;
            }

            repo
        } else {
            return Err(Error::not_found(format!(
                "repository not found: {}",
                path.display()
            )));
        };

        let gitdir = repo.path().to_path_buf();
        tracing::debug!(path = %gitdir.display(), "opened repository");

        Ok(GitStore {
            inner: Arc::new(GitStoreInner {
                repo: Mutex::new(repo),
                path: gitdir,
                signature: sig,
            }),
        })
    }

    /// Create the initial commit on `branch` with an empty tree.
    fn init_branch(repo: &git2::Repository, branch: &str, sig: &Signature) -> Result<()> {
        validate_ref_name(branch)?;
        let tree_oid = repo
            .treebuilder(None)
            .and_then(|b| b.write())
            .map_err(Error::git)?;
        let tree = repo.find_tree(tree_oid).map_err(Error::git)?;
        let actor = to_git_signature(sig)?;
        let refname = branch_ref(branch);

        repo.commit(
            Some(&refname),
            &actor,
            &actor,
            &format!("Initialize {}", branch),
            &tree,
            &[],
        )
        .map_err(Error::git)?;
        repo.set_head(&refname).map_err(Error::git)?;
        Ok(())
    }

    /// The git directory of the repository.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Default identity for commits made through this store.
    pub fn signature(&self) -> &Signature {
        &self.inner.signature
    }

    /// Open a working session over this store.
    pub fn gfs(&self, options: GfsOptions) -> Result<Gfs> {
        Gfs::open(self, options)
    }

    pub(crate) fn with_repo<T>(&self, f: impl FnOnce(&git2::Repository) -> Result<T>) -> Result<T> {
        let repo = self
            .inner
            .repo
            .lock()
            .map_err(|e| Error::git_msg(e.to_string()))?;
        f(&repo)
    }

    fn locked<T>(&self, f: impl FnOnce(&git2::Repository) -> Result<T>) -> Result<T> {
        with_repo_lock(&self.inner.path, || self.with_repo(f))
    }
}

impl std::fmt::Debug for GitStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitStore")
            .field("path", &self.inner.path)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Conversions
// ---------------------------------------------------------------------------

fn to_git_signature(sig: &Signature) -> Result<git2::Signature<'static>> {
    let actor = match sig.time {
        Some(secs) => git2::Signature::new(&sig.name, &sig.email, &git2::Time::new(secs, 0)),
        None => git2::Signature::now(&sig.name, &sig.email),
    };
    actor.map_err(Error::git)
}

fn from_git_signature(sig: &git2::Signature<'_>) -> Signature {
    Signature {
        name: String::from_utf8_lossy(sig.name_bytes()).into_owned(),
        email: String::from_utf8_lossy(sig.email_bytes()).into_owned(),
        time: Some(sig.when().seconds()),
    }
}

fn is_not_found(err: &git2::Error) -> bool {
    matches!(
        err.code(),
        git2::ErrorCode::NotFound | git2::ErrorCode::InvalidSpec | git2::ErrorCode::Ambiguous
    )
}

fn reference_target(repo: &git2::Repository, name: &str) -> Result<Option<Oid>> {
    match repo.find_reference(name) {
        Ok(r) => Ok(r.target()),
        Err(e) if is_not_found(&e) => Ok(None),
        Err(e) => Err(Error::git(e)),
    }
}

// ---------------------------------------------------------------------------
// ObjectStore
// ---------------------------------------------------------------------------

impl ObjectStore for GitStore {
    fn read_blob(&self, id: Oid) -> Result<Vec<u8>> {
        self.with_repo(|repo| {
            let blob = repo.find_blob(id).map_err(Error::git)?;
            Ok(blob.content().to_vec())
        })
    }

    fn blob_size(&self, id: Oid) -> Result<u64> {
        self.with_repo(|repo| {
            let odb = repo.odb().map_err(Error::git)?;
            let (size, _) = odb.read_header(id).map_err(Error::git)?;
            Ok(size as u64)
        })
    }

    fn read_tree(&self, id: Oid) -> Result<Vec<TreeEntry>> {
        self.with_repo(|repo| {
            let tree = repo.find_tree(id).map_err(Error::git)?;
            tree.iter()
                .map(|e| {
                    let name = String::from_utf8_lossy(e.name_bytes()).into_owned();
                    let mode = e.filemode() as u32;
                    let file_type = FileType::from_mode(mode).ok_or_else(|| {
                        Error::git_msg(format!("unsupported mode {:o} for {}", mode, name))
                    })?;
                    Ok(TreeEntry::new(name, e.id(), file_type))
                })
                .collect()
        })
    }

    fn write_blob(&self, data: &[u8]) -> Result<Oid> {
        self.with_repo(|repo| repo.blob(data).map_err(Error::git))
    }

    fn write_tree(&self, entries: &[TreeEntry]) -> Result<Oid> {
        self.with_repo(|repo| {
            let mut builder = repo.treebuilder(None).map_err(Error::git)?;
            for e in entries {
                builder
                    .insert(e.name.as_str(), e.oid, e.file_type.to_mode() as i32)
                    .map_err(Error::git)?;
            }
            builder.write().map_err(Error::git)
        })
    }

    fn read_commit(&self, id: Oid) -> Result<CommitInfo> {
        self.with_repo(|repo| {
            let commit = repo.find_commit(id).map_err(Error::git)?;
            let info = CommitInfo {
                id,
                tree: commit.tree_id(),
                parents: commit.parent_ids().collect(),
                author: from_git_signature(&commit.author()),
                committer: from_git_signature(&commit.committer()),
                message: String::from_utf8_lossy(commit.message_bytes()).into_owned(),
            };
            Ok(info)
        })
    }

    fn write_commit(&self, commit: &NewCommit) -> Result<Oid> {
        let author = to_git_signature(&commit.author)?;
        let committer = to_git_signature(&commit.committer)?;
        self.with_repo(|repo| {
            let tree = repo.find_tree(commit.tree).map_err(Error::git)?;
            let parents = commit
                .parents
                .iter()
                .map(|p| repo.find_commit(*p))
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(Error::git)?;
            let parent_refs: Vec<&git2::Commit<'_>> = parents.iter().collect();
            repo.commit(None, &author, &committer, &commit.message, &tree, &parent_refs)
                .map_err(Error::git)
        })
    }

    fn merge_base(&self, a: Oid, b: Oid) -> Result<Option<Oid>> {
        self.with_repo(|repo| match repo.merge_base(a, b) {
            Ok(id) => Ok(Some(id)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(Error::git(e)),
        })
    }

    fn is_ancestor(&self, ancestor: Oid, descendant: Oid) -> Result<bool> {
        if ancestor == descendant {
            return Ok(true);
        }
        self.with_repo(|repo| {
            repo.graph_descendant_of(descendant, ancestor)
                .map_err(Error::git)
        })
    }
}

// ---------------------------------------------------------------------------
// RefStore
// ---------------------------------------------------------------------------

impl RefStore for GitStore {
    fn resolve_branch(&self, branch: &str) -> Result<Option<Oid>> {
        let name = branch_ref(branch);
        self.with_repo(|repo| match repo.find_reference(&name) {
            Ok(r) => Ok(r.peel_to_commit().ok().map(|c| c.id())),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(Error::git(e)),
        })
    }

    fn resolve_revision(&self, revision: &str) -> Result<Option<Oid>> {
        if let Some(id) = self.resolve_branch(revision)? {
            return Ok(Some(id));
        }
        self.with_repo(|repo| match repo.revparse_single(revision) {
            Ok(obj) => Ok(obj.peel_to_commit().ok().map(|c| c.id())),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(Error::git(e)),
        })
    }

    fn default_branch(&self) -> Result<Option<String>> {
        self.with_repo(|repo| match repo.find_reference("HEAD") {
            Ok(head) => Ok(head
                .symbolic_target()
                .and_then(short_branch_name)
                .map(str::to_string)),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(Error::git(e)),
        })
    }

    fn update_ref(
        &self,
        name: &str,
        expected: Option<Oid>,
        new: Oid,
        log_message: &str,
    ) -> Result<bool> {
        self.locked(|repo| {
            let current = reference_target(repo, name)?;
            if current != expected {
                tracing::warn!(
                    name,
                    expected = ?expected,
                    current = ?current,
                    "ref moved; refusing update"
                );
                return Ok(false);
            }
            let written = match expected {
                Some(old) => repo.reference_matching(name, new, true, old, log_message),
                None => repo.reference(name, new, false, log_message),
            };
            match written {
                Ok(_) => {
                    tracing::debug!(name, new = %new, log_message, "updated ref");
                    Ok(true)
                }
                Err(e) if matches!(e.code(), git2::ErrorCode::Modified | git2::ErrorCode::Exists) => {
                    Ok(false)
                }
                Err(e) => Err(Error::git(e)),
            }
        })
    }

    fn create_branch(&self, branch: &str, target: Oid) -> Result<()> {
        validate_ref_name(branch)?;
        let name = branch_ref(branch);
        self.locked(|repo| {
            let log = format!("branch: Created from {}", short_id(target));
            match repo.reference(&name, target, false, &log) {
                Ok(_) => Ok(()),
                Err(e) if e.code() == git2::ErrorCode::Exists => {
                    Err(Error::BranchExists(branch.to_string()))
                }
                Err(e) => Err(Error::git(e)),
            }
        })
    }

    fn delete_branch(&self, branch: &str) -> Result<()> {
        let name = branch_ref(branch);
        self.locked(|repo| {
            let mut reference = match repo.find_reference(&name) {
                Ok(r) => r,
                Err(e) if is_not_found(&e) => return Err(Error::no_such_branch(branch)),
                Err(e) => return Err(Error::git(e)),
            };
            reference.delete().map_err(Error::git)
        })
    }

    fn list_branches(&self) -> Result<Vec<String>> {
        self.with_repo(|repo| {
            let mut names = Vec::new();
            for item in repo
                .branches(Some(git2::BranchType::Local))
                .map_err(Error::git)?
            {
                let (branch, _) = item.map_err(Error::git)?;
                if let Some(name) = branch.name().map_err(Error::git)? {
                    names.push(name.to_string());
                }
            }
            names.sort();
            Ok(names)
        })
    }

    fn push_stash(&self, commit: Oid, message: &str) -> Result<()> {
        let sig = to_git_signature(&self.inner.signature)?;
        self.locked(|repo| {
            let before = repo.reflog(STASH_REF).map_err(Error::git)?.len();
            repo.reference(STASH_REF, commit, true, message)
                .map_err(Error::git)?;
            // Non-bare repositories log the ref update themselves.
            let mut reflog = repo.reflog(STASH_REF).map_err(Error::git)?;
            if reflog.len() == before {
                reflog
                    .append(commit, &sig, Some(message))
                    .map_err(Error::git)?;
                reflog.write().map_err(Error::git)?;
            }
            Ok(())
        })
    }

    fn peek_stash(&self, index: usize) -> Result<Option<Oid>> {
        self.with_repo(|repo| {
            let reflog = repo.reflog(STASH_REF).map_err(Error::git)?;
            if reflog.is_empty() {
                return match index {
                    0 => reference_target(repo, STASH_REF),
                    _ => Ok(None),
                };
            }
            Ok(reflog.get(index).map(|e| e.id_new()))
        })
    }

    fn drop_stash(&self, index: usize) -> Result<Option<Oid>> {
        self.locked(|repo| {
            let mut reflog = repo.reflog(STASH_REF).map_err(Error::git)?;
            if reflog.is_empty() {
                if index != 0 {
                    return Ok(None);
                }
                let target = reference_target(repo, STASH_REF)?;
                if target.is_some() {
                    if let Ok(mut r) = repo.find_reference(STASH_REF) {
                        r.delete().map_err(Error::git)?;
                    }
                }
                return Ok(target);
            }

            let dropped = match reflog.get(index) {
                Some(e) => e.id_new(),
                None => return Ok(None),
            };
            reflog.remove(index, true).map_err(Error::git)?;
            reflog.write().map_err(Error::git)?;

            if reflog.is_empty() {
                let mut r = repo.find_reference(STASH_REF).map_err(Error::git)?;
                r.delete().map_err(Error::git)?;
            } else if index == 0 {
                let top = match reflog.get(0) {
                    Some(e) => e.id_new(),
                    None => return Ok(Some(dropped)),
                };
                let before = reflog.len();
                repo.reference(STASH_REF, top, true, "stash: drop")
                    .map_err(Error::git)?;
                let mut after = repo.reflog(STASH_REF).map_err(Error::git)?;
                if after.len() > before {
                    after.remove(0, false).map_err(Error::git)?;
                    after.write().map_err(Error::git)?;
                }
            }
            Ok(Some(dropped))
        })
    }

    fn list_stashes(&self) -> Result<Vec<StashEntry>> {
        self.with_repo(|repo| {
            let reflog = repo.reflog(STASH_REF).map_err(Error::git)?;
            if reflog.is_empty() {
                return Ok(reference_target(repo, STASH_REF)?
                    .map(|commit| StashEntry {
                        index: 0,
                        commit,
                        message: String::new(),
                    })
                    .into_iter()
                    .collect());
            }
            Ok(reflog
                .iter()
                .enumerate()
                .map(|(index, e)| StashEntry {
                    index,
                    commit: e.id_new(),
                    message: e.message().unwrap_or("").to_string(),
                })
                .collect())
        })
    }
}
