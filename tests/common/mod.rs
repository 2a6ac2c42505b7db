#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use gitvfs::*;

pub fn create_store(dir: &Path, branch: &str) -> GitStore {
    GitStore::open(dir.join("test.git"), OpenOptions {
        create: true,
        branch: Some(branch.into()),
        ..Default::default()
    })
    .unwrap()
}

pub fn open_gfs(store: &GitStore, branch: &str) -> Gfs {
    store.gfs(GfsOptions::branch(branch)).unwrap()
}

/// Write `files` and commit them, returning the new head.
pub fn commit_files(gfs: &Gfs, files: &[(&str, &str)], message: &str) -> Oid {
    for (path, content) in files {
        gfs.write_text(path, content).unwrap();
    }
    match gfs.commit().message(message).execute().unwrap() {
        CommitResult::Committed(id) => id,
        CommitResult::NoChange => panic!("nothing to commit for {:?}", message),
    }
}

/// A `main` session with `hello.txt`, `dir/a.txt` and `dir/b.txt` committed.
pub fn store_with_files(dir: &Path) -> (GitStore, Gfs) {
    let store = create_store(dir, "main");
    let gfs = open_gfs(&store, "main");
    commit_files(
        &gfs,
        &[("hello.txt", "hello"), ("dir/a.txt", "aaa"), ("dir/b.txt", "bbb")],
        "seed",
    );
    (store, gfs)
}

pub fn head(gfs: &Gfs) -> Oid {
    gfs.status().unwrap().head().unwrap()
}

/// Blob content at `path` inside `tree`.
pub fn read_blob_at_path(odb: &dyn ObjectStore, tree: Oid, path: &str) -> Result<Vec<u8>> {
    match gitvfs::tree::entry_at_path(odb, tree, path)? {
        Some(e) if e.is_dir() => Err(Error::is_a_directory(path)),
        Some(e) => odb.read_blob(e.oid),
        None => Err(Error::not_found(path)),
    }
}

/// Every non-tree entry below `tree`, keyed by full path.
pub fn walk_tree(odb: &dyn ObjectStore, tree: Oid) -> Result<BTreeMap<String, Entry>> {
    let mut out = BTreeMap::new();
    walk_into(odb, tree, "", &mut out)?;
    Ok(out)
}

fn walk_into(
    odb: &dyn ObjectStore,
    tree: Oid,
    prefix: &str,
    out: &mut BTreeMap<String, Entry>,
) -> Result<()> {
    for e in odb.read_tree(tree)? {
        let path = if prefix.is_empty() {
            e.name.clone()
        } else {
            format!("{}/{}", prefix, e.name)
        };
        if e.file_type.is_dir() {
            walk_into(odb, e.oid, &path, out)?;
        } else {
            out.insert(path, e.entry());
        }
    }
    Ok(())
}

/// Object store wrapper counting writes.
pub struct CountingStore {
    pub inner: GitStore,
    pub writes: AtomicUsize,
    pub commits: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: GitStore) -> Arc<Self> {
        Arc::new(Self {
            inner,
            writes: AtomicUsize::new(0),
            commits: AtomicUsize::new(0),
        })
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

impl ObjectStore for CountingStore {
    fn read_blob(&self, id: Oid) -> Result<Vec<u8>> {
        self.inner.read_blob(id)
    }

    fn blob_size(&self, id: Oid) -> Result<u64> {
        self.inner.blob_size(id)
    }

    fn read_tree(&self, id: Oid) -> Result<Vec<TreeEntry>> {
        self.inner.read_tree(id)
    }

    fn write_blob(&self, data: &[u8]) -> Result<Oid> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.write_blob(data)
    }

    fn write_tree(&self, entries: &[TreeEntry]) -> Result<Oid> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.write_tree(entries)
    }

    fn read_commit(&self, id: Oid) -> Result<CommitInfo> {
        self.inner.read_commit(id)
    }

    fn write_commit(&self, commit: &NewCommit) -> Result<Oid> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.commits.fetch_add(1, Ordering::SeqCst);
        self.inner.write_commit(commit)
    }

    fn merge_base(&self, a: Oid, b: Oid) -> Result<Option<Oid>> {
        self.inner.merge_base(a, b)
    }

    fn is_ancestor(&self, ancestor: Oid, descendant: Oid) -> Result<bool> {
        self.inner.is_ancestor(ancestor, descendant)
    }
}

/// A session whose object writes go through a [`CountingStore`].
pub fn counting_gfs(store: &GitStore, branch: &str) -> (Arc<CountingStore>, Gfs) {
    let counting = CountingStore::new(store.clone());
    let gfs = Gfs::with_stores(
        counting.clone(),
        Arc::new(store.clone()),
        Signature::default(),
        GfsOptions::branch(branch),
    )
    .unwrap();
    (counting, gfs)
}
