use std::sync::Arc;

use crate::error::{Error, Result};
use crate::node::{Node, NodeId, NodeTree};
use crate::odb::ObjectStore;
use crate::paths::{join_path, normalize_path, split_path};
use crate::types::{DirEntry, Entry, FileType, Oid};

/// A mutable, copy-on-write view of one git tree.
///
/// Reads fall through to the object store until a path is touched; edits
/// live in memory until [`persist`](WorkingStore::persist) writes them back
/// as new blobs and trees. `base_tree` is the tree the overlay was last
/// bound to, normally the tree of the session's head commit.
pub struct WorkingStore {
    odb: Arc<dyn ObjectStore>,
    nodes: NodeTree,
    base_tree: Option<Oid>,
}

impl WorkingStore {
    /// An overlay over `base_tree` (`None` for an empty, unborn tree).
    pub fn new(odb: Arc<dyn ObjectStore>, base_tree: Option<Oid>) -> Self {
        Self {
            odb,
            nodes: NodeTree::new(base_tree),
            base_tree,
        }
    }

    pub fn base_tree(&self) -> Option<Oid> {
        self.base_tree
    }

    /// Whether the overlay differs from `base_tree`, persisted or not.
    pub fn is_dirty(&self) -> bool {
        self.nodes.root_dirty() || self.nodes.root_origin() != self.base_tree
    }

    // -----------------------------------------------------------------------
    // Path resolution
    // -----------------------------------------------------------------------

    /// Resolve a normalized path to its node, loading directories on the way.
    fn lookup(&mut self, path: &str) -> Result<Option<NodeId>> {
        let odb = self.odb.as_ref();
        let mut current = self.nodes.root();
        if path.is_empty() {
            return Ok(Some(current));
        }

        let mut walked = String::new();
        for segment in path.split('/') {
            if !self.nodes.node(current)?.is_dir() {
                return Err(Error::not_a_directory(walked));
            }
            match self.nodes.child(odb, current, segment)? {
                Some(child) => current = child,
                None => return Ok(None),
            }
            walked = join_path(&walked, segment);
        }
        Ok(Some(current))
    }

    fn require(&mut self, path: &str) -> Result<NodeId> {
        self.lookup(path)?.ok_or_else(|| Error::not_found(path))
    }

    fn require_dir(&mut self, path: &str) -> Result<NodeId> {
        let id = self.require(path)?;
        if !self.nodes.node(id)?.is_dir() {
            return Err(Error::not_a_directory(path));
        }
        Ok(id)
    }

    fn require_file(&mut self, path: &str) -> Result<NodeId> {
        let id = self.require(path)?;
        if self.nodes.node(id)?.is_dir() {
            return Err(Error::is_a_directory(path));
        }
        Ok(id)
    }

    /// Resolve directory `path`, creating missing directories along the way.
    fn make_dirs(&mut self, path: &str) -> Result<NodeId> {
        let odb = self.odb.as_ref();
        let mut current = self.nodes.root();
        let mut walked = String::new();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            walked = join_path(&walked, segment);
            current = match self.nodes.child(odb, current, segment)? {
                Some(child) if self.nodes.node(child)?.is_dir() => child,
                Some(_) => return Err(Error::not_a_directory(walked)),
                None => self
                    .nodes
                    .insert(odb, current, segment, Node::new_directory())?,
            };
        }
        Ok(current)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn exists(&mut self, path: &str) -> Result<bool> {
        Ok(self.file_type(path)?.is_some())
    }

    pub fn is_dir(&mut self, path: &str) -> Result<bool> {
        Ok(self.file_type(path)? == Some(FileType::Tree))
    }

    /// Type of the entry at `path`, `None` if nothing is there.
    pub fn file_type(&mut self, path: &str) -> Result<Option<FileType>> {
        let path = normalize_path(path)?;
        match self.lookup(&path) {
            Ok(Some(id)) => Ok(Some(self.nodes.node(id)?.file_type())),
            Ok(None) | Err(Error::NotADirectory(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn read(&mut self, path: &str) -> Result<Vec<u8>> {
        let path = normalize_path(path)?;
        let id = self.require_file(&path)?;
        self.nodes.read_file(self.odb.as_ref(), id)
    }

    pub fn read_text(&mut self, path: &str) -> Result<String> {
        let data = self.read(path)?;
        String::from_utf8(data).map_err(|e| Error::invalid_path(format!("{}: {}", path, e)))
    }

    /// Target of the symlink at `path`.
    pub fn read_link(&mut self, path: &str) -> Result<String> {
        let path = normalize_path(path)?;
        let id = self.require_file(&path)?;
        if self.nodes.node(id)?.file_type() != FileType::Link {
            return Err(Error::invalid_path(format!("{} is not a symlink", path)));
        }
        let data = self.nodes.read_file(self.odb.as_ref(), id)?;
        Ok(String::from_utf8_lossy(&data).into_owned())
    }

    pub fn size(&mut self, path: &str) -> Result<u64> {
        let path = normalize_path(path)?;
        let id = self.require_file(&path)?;
        self.nodes.file_size(self.odb.as_ref(), id)
    }

    /// Sorted listing of directory `path`.
    pub fn list(&mut self, path: &str) -> Result<Vec<DirEntry>> {
        let path = normalize_path(path)?;
        let dir = self.require_dir(&path)?;
        let children = self.nodes.children(self.odb.as_ref(), dir)?;
        children
            .into_iter()
            .map(|(name, id)| {
                Ok(DirEntry {
                    name,
                    file_type: self.nodes.node(id)?.file_type(),
                })
            })
            .collect()
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Write `data` to `path`, creating parent directories.
    ///
    /// An existing file keeps its mode; a new file is a regular blob.
    pub fn write(&mut self, path: &str, data: impl Into<Vec<u8>>) -> Result<()> {
        let path = normalize_path(path)?;
        self.write_node(&path, data.into(), None)
    }

    pub fn write_text(&mut self, path: &str, text: &str) -> Result<()> {
        self.write(path, text.as_bytes())
    }

    /// Write `data` to `path` with an explicit mode.
    pub fn write_with_type(
        &mut self,
        path: &str,
        data: impl Into<Vec<u8>>,
        file_type: FileType,
    ) -> Result<()> {
        if !(file_type.is_file() || file_type.is_link()) {
            return Err(Error::invalid_path(format!(
                "{}: cannot write content as {:?}",
                path, file_type
            )));
        }
        let path = normalize_path(path)?;
        self.write_node(&path, data.into(), Some(file_type))
    }

    pub fn write_symlink(&mut self, path: &str, target: &str) -> Result<()> {
        self.write_with_type(path, target.as_bytes(), FileType::Link)
    }

    fn write_node(&mut self, path: &str, data: Vec<u8>, file_type: Option<FileType>) -> Result<()> {
        if path.is_empty() {
            return Err(Error::is_a_directory("/"));
        }
        let (parent_path, name) = split_path(path);
        let parent = self.make_dirs(parent_path)?;
        let odb = self.odb.as_ref();
        match self.nodes.child(odb, parent, name)? {
            Some(id) if self.nodes.node(id)?.is_dir() => Err(Error::is_a_directory(path)),
            Some(id) => {
                self.nodes.write_file(id, data)?;
                match file_type {
                    Some(ft) => self.nodes.set_file_type(id, ft),
                    None => Ok(()),
                }
            }
            None => {
                let node = Node::new_file(data, file_type.unwrap_or(FileType::Blob));
                self.nodes.insert(odb, parent, name, node).map(|_| ())
            }
        }
    }

    /// Toggle the executable bit of a regular file.
    pub fn set_executable(&mut self, path: &str, executable: bool) -> Result<()> {
        let path = normalize_path(path)?;
        let id = self.require_file(&path)?;
        let current = self.nodes.node(id)?.file_type();
        if !current.is_file() {
            return Err(Error::invalid_path(format!("{} is not a regular file", path)));
        }
        let wanted = if executable {
            FileType::Executable
        } else {
            FileType::Blob
        };
        self.nodes.set_file_type(id, wanted)
    }

    /// Create one directory. The parent must exist.
    pub fn create_directory(&mut self, path: &str) -> Result<()> {
        let path = normalize_path(path)?;
        if path.is_empty() {
            return Err(Error::already_exists("/"));
        }
        let (parent_path, name) = split_path(&path);
        let parent = self.require_dir(parent_path)?;
        let odb = self.odb.as_ref();
        if self.nodes.child(odb, parent, name)?.is_some() {
            return Err(Error::already_exists(path));
        }
        self.nodes.insert(odb, parent, name, Node::new_directory())?;
        Ok(())
    }

    /// Create a directory and any missing parents. Existing directories are fine.
    pub fn create_directories(&mut self, path: &str) -> Result<()> {
        let path = normalize_path(path)?;
        self.make_dirs(&path).map(|_| ())
    }

    /// Delete a file or a whole directory.
    pub fn delete(&mut self, path: &str) -> Result<()> {
        let path = normalize_path(path)?;
        if path.is_empty() {
            return Err(Error::invalid_path("cannot delete the root directory"));
        }
        let (parent_path, name) = split_path(&path);
        let parent = match self.lookup(parent_path)? {
            Some(id) if self.nodes.node(id)?.is_dir() => id,
            Some(_) => return Err(Error::not_a_directory(parent_path)),
            None => return Err(Error::not_found(path)),
        };
        if !self.nodes.remove(self.odb.as_ref(), parent, name)? {
            return Err(Error::not_found(path));
        }
        Ok(())
    }

    /// Copy `src` to `dst`. Directories are copied recursively.
    pub fn copy(&mut self, src: &str, dst: &str, replace: bool) -> Result<()> {
        let (src, dst) = self.check_transfer(src, dst, replace)?;
        let Some((source, parent, name)) = self.transfer_endpoints(&src, &dst, replace)? else {
            return Ok(());
        };
        let copy = self.nodes.copy_subtree(source)?;
        self.nodes.attach(self.odb.as_ref(), parent, &name, copy)
    }

    /// Move `src` to `dst`.
    pub fn rename(&mut self, src: &str, dst: &str, replace: bool) -> Result<()> {
        let (src, dst) = self.check_transfer(src, dst, replace)?;
        if src.starts_with(&format!("{}/", dst)) {
            return Err(Error::invalid_path(format!(
                "cannot move {} onto its ancestor {}",
                src, dst
            )));
        }
        let Some((_, parent, name)) = self.transfer_endpoints(&src, &dst, replace)? else {
            return Ok(());
        };
        let (src_parent_path, src_name) = split_path(&src);
        let src_parent = self.require_dir(src_parent_path)?;
        let odb = self.odb.as_ref();
        let moved = self
            .nodes
            .detach(odb, src_parent, src_name)?
            .ok_or_else(|| Error::not_found(src.clone()))?;
        self.nodes.attach(odb, parent, &name, moved)
    }

    fn check_transfer(&mut self, src: &str, dst: &str, replace: bool) -> Result<(String, String)> {
        let src = normalize_path(src)?;
        let dst = normalize_path(dst)?;
        if src.is_empty() || dst.is_empty() {
            return Err(Error::invalid_path("cannot copy or move the root directory"));
        }
        if dst.starts_with(&format!("{}/", src)) {
            return Err(Error::invalid_path(format!(
                "cannot place {} inside itself at {}",
                src, dst
            )));
        }
        if src == dst && !replace {
            return Err(Error::already_exists(dst));
        }
        Ok((src, dst))
    }

    /// Source node, destination parent and name; `None` when src == dst.
    fn transfer_endpoints(
        &mut self,
        src: &str,
        dst: &str,
        replace: bool,
    ) -> Result<Option<(NodeId, NodeId, String)>> {
        let source = self.require(src)?;
        if src == dst {
            return Ok(None);
        }
        let (dst_parent, dst_name) = split_path(dst);
        let parent = self.make_dirs(dst_parent)?;
        if !replace && self.nodes.child(self.odb.as_ref(), parent, dst_name)?.is_some() {
            return Err(Error::already_exists(dst));
        }
        Ok(Some((source, parent, dst_name.to_string())))
    }

    // -----------------------------------------------------------------------
    // Persistence and rebinding
    // -----------------------------------------------------------------------

    /// Write every pending change and return the root tree id.
    ///
    /// Idempotent: with nothing dirty, returns the current root id without
    /// touching the object store.
    pub fn persist(&mut self) -> Result<Oid> {
        let (tree, writes) = self.nodes.persist(self.odb.as_ref())?;
        tracing::debug!(tree = %tree, writes, "persisted working tree");
        Ok(tree)
    }

    /// Persist, then rebind the baseline to `tree` keeping in-memory content.
    pub fn update_origin(&mut self, tree: Oid) -> Result<()> {
        self.persist()?;
        self.base_tree = Some(tree);
        Ok(())
    }

    /// Discard every change and reload from the baseline.
    pub fn reset(&mut self) {
        self.nodes = NodeTree::new(self.base_tree);
    }

    /// Rebind to `tree` and discard every change.
    pub fn reset_to(&mut self, tree: Option<Oid>) {
        self.base_tree = tree;
        self.reset();
    }

    /// Replace whatever is at `path` with a clean placeholder for `entry`,
    /// or remove it when `entry` is `None`.
    pub(crate) fn apply_entry(&mut self, path: &str, entry: Option<Entry>) -> Result<()> {
        let (parent_path, name) = split_path(path);
        match entry {
            Some(entry) => {
                let parent = self.make_dirs(parent_path)?;
                self.nodes
                    .insert(self.odb.as_ref(), parent, name, Node::from_entry(entry))?;
            }
            None => {
                if let Some(parent) = self.lookup(parent_path)? {
                    if self.nodes.node(parent)?.is_dir() {
                        self.nodes.remove(self.odb.as_ref(), parent, name)?;
                    }
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for WorkingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkingStore")
            .field("base_tree", &self.base_tree)
            .field("dirty", &self.is_dirty())
            .finish()
    }
}
