use std::path::Path;

use fs2::FileExt;

use crate::error::{Error, Result};

/// Name of the lock file created inside the git directory.
pub const LOCK_FILE: &str = "gitvfs.lock";

/// Acquire an advisory file lock on the repository, execute `f`, then release.
///
/// Locks `<gitdir>/gitvfs.lock` exclusively, blocking until it is available.
/// Serializes ref compare-and-swap across threads and processes.
///
/// # Errors
/// Returns an I/O error if the lock file cannot be created or locked, or
/// whatever `f` returns.
pub fn with_repo_lock<F, T>(gitdir: &Path, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let lock_path = gitdir.join(LOCK_FILE);
    let file = std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)
        .map_err(|e| Error::io(&lock_path, e))?;
    FileExt::lock_exclusive(&file).map_err(|e| Error::io(&lock_path, e))?;

    let result = f();

    if let Err(e) = FileExt::unlock(&file) {
        tracing::warn!(path = %lock_path.display(), error = %e, "failed to release repository lock");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_runs_closure_and_leaves_lock_file() {
        let dir = tempfile::tempdir().unwrap();
        let value = with_repo_lock(dir.path(), || Ok(42)).unwrap();
        assert_eq!(value, 42);
        assert!(dir.path().join(LOCK_FILE).exists());
    }

    #[test]
    fn lock_is_released_after_error() {
        let dir = tempfile::tempdir().unwrap();
        with_repo_lock(dir.path(), || Ok(())).unwrap();
        let err = with_repo_lock::<_, ()>(dir.path(), || Err(Error::NoHeadCommit));
        assert!(matches!(err, Err(Error::NoHeadCommit)));
        with_repo_lock(dir.path(), || Ok(())).unwrap();
    }
}
