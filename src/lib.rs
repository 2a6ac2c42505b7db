//! A git-backed, copy-on-write working tree with git-style commands.
//!
//! `gitvfs` lets a program edit the files of a git commit in memory and then
//! commit, merge, stash or switch branches without a checkout on disk. Edits
//! are held in a lazily loaded tree overlay and written back as ordinary git
//! blobs and trees, so unchanged subtrees are shared with history for free.
//!
//! # Key types
//!
//! - [`GitStore`]: opens (or creates) a bare git repository; implements the
//!   [`ObjectStore`] and [`RefStore`] traits everything else is built on.
//! - [`Gfs`]: a session. Holds a [`WorkingStore`] and the [`Status`] saying
//!   which branch and head commit the session is on.
//! - [`Merger`]: three-way tree merge with per-path conflict records.
//! - Commands ([`Commit`], [`Checkout`], [`Merge`], [`Reset`],
//!   [`CreateStash`], [`ApplyStash`], [`CherryPick`]): builders returned by
//!   [`Gfs`], each executed once and answering with a result enum.
//! - [`Sessions`]: a registry of open sessions by id.
//!
//! # Quick example
//!
//! ```rust,no_run
//! use gitvfs::{CommitResult, GfsOptions, GitStore, OpenOptions};
//!
//! let store = GitStore::open(
//!     "/tmp/my-repo",
//!     OpenOptions { create: true, branch: Some("main".into()), ..Default::default() },
//! ).unwrap();
//! let gfs = store.gfs(GfsOptions::branch("main")).unwrap();
//!
//! gfs.write_text("hello.txt", "world").unwrap();
//! match gfs.commit().message("say hello").execute().unwrap() {
//!     CommitResult::Committed(id) => println!("committed {}", id),
//!     CommitResult::NoChange => println!("nothing to do"),
//! }
//! ```

pub mod checkout;
pub mod commands;
pub mod error;
pub mod gfs;
pub mod lock;
pub mod merge;
mod node;
pub mod odb;
pub mod paths;
pub mod sessions;
pub mod status;
pub mod store;
pub mod tree;
pub mod types;
pub mod working_store;

// Re-export primary public types at crate root.
pub use checkout::{CheckoutConflict, CheckoutPlan};
pub use commands::{
    ApplyStash, ApplyStashResult, Checkout, CheckoutResult, CherryPick, CherryPickResult, Commit,
    CommitResult, CreateStash, Merge, MergeResult, Reset, ResetResult, StashResult,
};
pub use error::{retry_stale, Error, Result};
pub use gfs::Gfs;
pub use merge::{
    ConflictContents, ConflictKind, ConflictRecord, MergeLabels, MergeOutcome, MergeStrategy,
    Merger,
};
pub use odb::{ObjectStore, RefStore};
pub use sessions::Sessions;
pub use status::{GfsState, MergeNote, Status, Update};
pub use store::GitStore;
pub use types::*;
pub use working_store::WorkingStore;
