use std::path::PathBuf;

use crate::status::GfsState;

/// All errors produced by gitvfs.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("is a directory: {0}")]
    IsADirectory(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid ref name: {0}")]
    InvalidRefName(String),

    #[error("illegal state: {0:?}")]
    IllegalState(GfsState),

    #[error("command already executed")]
    AlreadyExecuted,

    #[error("no branch: {0}")]
    NoBranch(String),

    #[error("no head commit")]
    NoHeadCommit,

    #[error("no such branch: {0}")]
    NoSuchBranch(String),

    #[error("no such revision: {0}")]
    NoSuchRevision(String),

    #[error("branch already exists: {0}")]
    BranchExists(String),

    #[error("stale ref: {0}")]
    StaleRef(String),

    #[error("session closed")]
    Closed,

    #[error("git error: {0}")]
    Git(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

// ---------------------------------------------------------------------------
// Convenience constructors
// ---------------------------------------------------------------------------

impl Error {
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    pub fn is_a_directory(path: impl Into<String>) -> Self {
        Self::IsADirectory(path.into())
    }

    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists(path.into())
    }

    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    pub fn invalid_ref_name(name: impl Into<String>) -> Self {
        Self::InvalidRefName(name.into())
    }

    pub fn no_branch(msg: impl Into<String>) -> Self {
        Self::NoBranch(msg.into())
    }

    pub fn no_such_branch(name: impl Into<String>) -> Self {
        Self::NoSuchBranch(name.into())
    }

    pub fn no_such_revision(rev: impl Into<String>) -> Self {
        Self::NoSuchRevision(rev.into())
    }

    pub fn stale_ref(msg: impl Into<String>) -> Self {
        Self::StaleRef(msg.into())
    }

    pub fn git(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Git(Box::new(err))
    }

    pub fn git_msg(msg: impl Into<String>) -> Self {
        let msg: String = msg.into();
        Self::Git(msg.into())
    }

    pub fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::Io(std::io::Error::new(
            err.kind(),
            format!("{}: {}", path.into().display(), err),
        ))
    }

    /// Whether retrying the failed operation against fresh state may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StaleRef(_))
    }
}

/// Retry an operation while it fails with [`Error::StaleRef`].
///
/// Backs off exponentially (10ms doubling, capped at 200ms) for at most
/// five retries. Any other error is returned immediately.
pub fn retry_stale<F, T>(mut f: F) -> Result<T>
where
    F: FnMut() -> Result<T>,
{
    let mut attempt = 0u32;
    loop {
        match f() {
            Ok(v) => return Ok(v),
            Err(e) if e.is_retryable() && attempt < 5 => {
                let backoff = std::time::Duration::from_millis(
                    (10 * 2u64.pow(attempt)).min(200),
                );
                tracing::debug!(attempt, ?backoff, "retrying after stale ref");
                std::thread::sleep(backoff);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_stale_ref_is_retryable() {
        assert!(Error::stale_ref("refs/heads/main").is_retryable());
        assert!(!Error::not_found("a.txt").is_retryable());
        assert!(!Error::NoHeadCommit.is_retryable());
    }

    #[test]
    fn retry_stale_gives_up_after_five_retries() {
        let mut calls = 0;
        let result: Result<()> = retry_stale(|| {
            calls += 1;
            Err(Error::stale_ref("moved"))
        });
        assert!(matches!(result, Err(Error::StaleRef(_))));
        assert_eq!(calls, 6);
    }

    #[test]
    fn retry_stale_returns_first_success() {
        let mut calls = 0;
        let result = retry_stale(|| {
            calls += 1;
            if calls < 3 {
                Err(Error::stale_ref("moved"))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn other_errors_are_not_retried() {
        let mut calls = 0;
        let result: Result<()> = retry_stale(|| {
            calls += 1;
            Err(Error::NoHeadCommit)
        });
        assert!(matches!(result, Err(Error::NoHeadCommit)));
        assert_eq!(calls, 1);
    }
}
