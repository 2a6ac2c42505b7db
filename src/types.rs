pub use git2::Oid;

// ---------------------------------------------------------------------------
// Mode constants
// ---------------------------------------------------------------------------

pub const MODE_BLOB: u32 = 0o100644;
pub const MODE_BLOB_EXEC: u32 = 0o100755;
pub const MODE_LINK: u32 = 0o120000;
pub const MODE_TREE: u32 = 0o040000;
pub const MODE_GITLINK: u32 = 0o160000;

// ---------------------------------------------------------------------------
// FileType
// ---------------------------------------------------------------------------

/// The type of a git tree entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    Blob,
    Executable,
    Link,
    Tree,
    /// Submodule commit pointer. Carried through untouched, never merged.
    Gitlink,
}

impl FileType {
    /// Convert a raw git mode to a `FileType`.
    ///
    /// Legacy group-writable blob modes (`0o100664`) read as [`FileType::Blob`].
    pub fn from_mode(mode: u32) -> Option<Self> {
        match mode {
            MODE_BLOB | 0o100664 => Some(Self::Blob),
            MODE_BLOB_EXEC => Some(Self::Executable),
            MODE_LINK => Some(Self::Link),
            MODE_TREE => Some(Self::Tree),
            MODE_GITLINK => Some(Self::Gitlink),
            _ => None,
        }
    }

    /// Convert to a raw git mode.
    pub fn to_mode(self) -> u32 {
        match self {
            Self::Blob => MODE_BLOB,
            Self::Executable => MODE_BLOB_EXEC,
            Self::Link => MODE_LINK,
            Self::Tree => MODE_TREE,
            Self::Gitlink => MODE_GITLINK,
        }
    }

    /// Whether this type represents a regular file (blob or executable).
    pub fn is_file(self) -> bool {
        matches!(self, Self::Blob | Self::Executable)
    }

    /// Whether this type represents a directory.
    pub fn is_dir(self) -> bool {
        matches!(self, Self::Tree)
    }

    /// Whether this type represents a symlink.
    pub fn is_link(self) -> bool {
        matches!(self, Self::Link)
    }
}

// ---------------------------------------------------------------------------
// Entry / TreeEntry / DirEntry
// ---------------------------------------------------------------------------

/// An object id paired with the mode it is stored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Entry {
    pub oid: Oid,
    pub file_type: FileType,
}

impl Entry {
    pub fn new(oid: Oid, file_type: FileType) -> Self {
        Self { oid, file_type }
    }

    pub fn tree(oid: Oid) -> Self {
        Self::new(oid, FileType::Tree)
    }

    pub fn is_dir(&self) -> bool {
        self.file_type.is_dir()
    }
}

/// A named entry of a git tree object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub name: String,
    pub oid: Oid,
    pub file_type: FileType,
}

impl TreeEntry {
    pub fn new(name: impl Into<String>, oid: Oid, file_type: FileType) -> Self {
        Self {
            name: name.into(),
            oid,
            file_type,
        }
    }

    pub fn entry(&self) -> Entry {
        Entry::new(self.oid, self.file_type)
    }
}

/// A directory listing entry from the working store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub file_type: FileType,
}

// ---------------------------------------------------------------------------
// Signature / CommitInfo
// ---------------------------------------------------------------------------

/// Author/committer identity.
///
/// `time` is seconds since the epoch; `None` means "now" when a commit is
/// written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub email: String,
    pub time: Option<i64>,
}

impl Signature {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            time: None,
        }
    }
}

impl Default for Signature {
    fn default() -> Self {
        Self::new("gitvfs", "gitvfs@localhost")
    }
}

/// A commit read back from the object store.
#[derive(Debug, Clone)]
pub struct CommitInfo {
    pub id: Oid,
    pub tree: Oid,
    pub parents: Vec<Oid>,
    pub author: Signature,
    pub committer: Signature,
    pub message: String,
}

impl CommitInfo {
    /// First line of the message.
    pub fn subject(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }

    /// Seven-character abbreviated id.
    pub fn short_id(&self) -> String {
        short_id(self.id)
    }
}

/// A commit to be written to the object store.
#[derive(Debug, Clone)]
pub struct NewCommit {
    pub tree: Oid,
    pub parents: Vec<Oid>,
    pub author: Signature,
    pub committer: Signature,
    pub message: String,
}

/// Abbreviate an object id to seven hex characters.
pub fn short_id(oid: Oid) -> String {
    let mut hex = oid.to_string();
    hex.truncate(7);
    hex
}

/// A stash stack entry; index 0 is the most recent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StashEntry {
    pub index: usize,
    pub commit: Oid,
    pub message: String,
}

// ---------------------------------------------------------------------------
// OpenOptions / GfsOptions
// ---------------------------------------------------------------------------

/// Options for opening or creating a `GitStore`.
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    /// Create the repository if it doesn't exist.
    pub create: bool,
    /// Branch to create with an initial empty commit when creating.
    pub branch: Option<String>,
    /// Default author name.
    pub author: Option<String>,
    /// Default author email.
    pub email: Option<String>,
}

/// What a `Gfs` session binds to when opened.
///
/// With `branch` set the session is attached to that branch (possibly
/// unborn); `revision` alone opens a detached session. With neither, the
/// branch HEAD points at is used.
#[derive(Debug, Clone, Default)]
pub struct GfsOptions {
    pub branch: Option<String>,
    pub revision: Option<String>,
    /// Overrides the store's default identity for commands.
    pub signature: Option<Signature>,
}

impl GfsOptions {
    pub fn branch(name: impl Into<String>) -> Self {
        Self {
            branch: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn revision(rev: impl Into<String>) -> Self {
        Self {
            revision: Some(rev.into()),
            ..Default::default()
        }
    }
}
