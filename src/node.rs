//! Arena of lazily loaded tree nodes.
//!
//! A directory node starts as a placeholder holding only its tree id; its
//! children are read one level at a time on first access. Edits mark the
//! node and all of its ancestors dirty. Persisting writes exactly the dirty
//! nodes, bottom-up, and hands back clean origins untouched.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::odb::ObjectStore;
use crate::types::{Entry, FileType, Oid, TreeEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct NodeId(usize);

#[derive(Debug, Clone)]
pub(crate) enum NodeKind {
    /// `children` is `None` until the directory is loaded.
    Directory {
        children: Option<BTreeMap<String, NodeId>>,
    },
    /// `data` holds unpersisted content; otherwise the blob is `origin`.
    File {
        data: Option<Vec<u8>>,
        file_type: FileType,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub(crate) parent: Option<NodeId>,
    pub(crate) origin: Option<Oid>,
    pub(crate) dirty: bool,
    pub(crate) kind: NodeKind,
}

impl Node {
    /// A new, empty directory that has never been persisted.
    pub(crate) fn new_directory() -> Self {
        Self {
            parent: None,
            origin: None,
            dirty: true,
            kind: NodeKind::Directory {
                children: Some(BTreeMap::new()),
            },
        }
    }

    /// A new file holding `data`.
    pub(crate) fn new_file(data: Vec<u8>, file_type: FileType) -> Self {
        Self {
            parent: None,
            origin: None,
            dirty: true,
            kind: NodeKind::File {
                data: Some(data),
                file_type,
            },
        }
    }

    /// A clean placeholder for an existing object.
    pub(crate) fn from_entry(entry: Entry) -> Self {
        let kind = match entry.file_type {
            FileType::Tree => NodeKind::Directory { children: None },
            file_type => NodeKind::File {
                data: None,
                file_type,
            },
        };
        Self {
            parent: None,
            origin: Some(entry.oid),
            dirty: false,
            kind,
        }
    }

    pub(crate) fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Directory { .. })
    }

    pub(crate) fn file_type(&self) -> FileType {
        match self.kind {
            NodeKind::Directory { .. } => FileType::Tree,
            NodeKind::File { file_type, .. } => file_type,
        }
    }

    pub(crate) fn is_loaded(&self) -> bool {
        !matches!(self.kind, NodeKind::Directory { children: None })
    }
}

/// Owner of every node of one working tree.
#[derive(Debug)]
pub(crate) struct NodeTree {
    nodes: Vec<Option<Node>>,
    free: Vec<usize>,
    root: NodeId,
}

impl NodeTree {
    /// A tree whose root mirrors `root_tree` (empty when `None`).
    pub(crate) fn new(root_tree: Option<Oid>) -> Self {
        let root = match root_tree {
            Some(oid) => Node::from_entry(Entry::tree(oid)),
            None => Node {
                dirty: false,
                ..Node::new_directory()
            },
        };
        Self {
            nodes: vec![Some(root)],
            free: Vec::new(),
            root: NodeId(0),
        }
    }

    pub(crate) fn root(&self) -> NodeId {
        self.root
    }

    pub(crate) fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or_else(|| Error::git_msg(format!("dangling node {}", id.0)))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or_else(|| Error::git_msg(format!("dangling node {}", id.0)))
    }

    /// Number of live nodes, the root included.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    fn alloc(&mut self, mut node: Node, parent: Option<NodeId>) -> NodeId {
        node.parent = parent;
        match self.free.pop() {
            Some(i) => {
                self.nodes[i] = Some(node);
                NodeId(i)
            }
            None => {
                self.nodes.push(Some(node));
                NodeId(self.nodes.len() - 1)
            }
        }
    }

    /// Free a detached subtree.
    fn release(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(id.0).and_then(Option::take) {
                if let NodeKind::Directory {
                    children: Some(children),
                } = node.kind
                {
                    stack.extend(children.into_values());
                }
                self.free.push(id.0);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Loading and navigation
    // -----------------------------------------------------------------------

    /// Materialize one level of children for directory `dir`.
    pub(crate) fn load(&mut self, odb: &dyn ObjectStore, dir: NodeId) -> Result<()> {
        let node = self.node(dir)?;
        let origin = match node.kind {
            NodeKind::Directory { children: Some(_) } => return Ok(()),
            NodeKind::Directory { children: None } => node.origin,
            NodeKind::File { .. } => {
                return Err(Error::not_a_directory(format!("node {}", dir.0)))
            }
        };

        let entries = match origin {
            Some(tree) => odb.read_tree(tree)?,
            None => Vec::new(),
        };
        let mut children = BTreeMap::new();
        for e in entries {
            let child = self.alloc(Node::from_entry(e.entry()), Some(dir));
            children.insert(e.name, child);
        }
        if let NodeKind::Directory { children: slot } = &mut self.node_mut(dir)?.kind {
            *slot = Some(children);
        }
        Ok(())
    }

    fn children_mut(&mut self, dir: NodeId) -> Result<&mut BTreeMap<String, NodeId>> {
        match &mut self.node_mut(dir)?.kind {
            NodeKind::Directory {
                children: Some(children),
            } => Ok(children),
            NodeKind::Directory { children: None } => {
                Err(Error::git_msg(format!("directory node {} is not loaded", dir.0)))
            }
            NodeKind::File { .. } => Err(Error::not_a_directory(format!("node {}", dir.0))),
        }
    }

    pub(crate) fn children(
        &mut self,
        odb: &dyn ObjectStore,
        dir: NodeId,
    ) -> Result<Vec<(String, NodeId)>> {
        self.load(odb, dir)?;
        Ok(self
            .children_mut(dir)?
            .iter()
            .map(|(name, id)| (name.clone(), *id))
            .collect())
    }

    pub(crate) fn child(
        &mut self,
        odb: &dyn ObjectStore,
        dir: NodeId,
        name: &str,
    ) -> Result<Option<NodeId>> {
        self.load(odb, dir)?;
        Ok(self.children_mut(dir)?.get(name).copied())
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Mark `id` and every ancestor dirty.
    pub(crate) fn mark_dirty(&mut self, id: NodeId) -> Result<()> {
        let mut current = Some(id);
        while let Some(c) = current {
            let node = self.node_mut(c)?;
            if node.dirty && c != id {
                break;
            }
            node.dirty = true;
            current = node.parent;
        }
        Ok(())
    }

    /// Place a detached node under `dir` as `name`, replacing any existing child.
    pub(crate) fn attach(
        &mut self,
        odb: &dyn ObjectStore,
        dir: NodeId,
        name: &str,
        id: NodeId,
    ) -> Result<()> {
        self.load(odb, dir)?;
        self.node_mut(id)?.parent = Some(dir);
        if let Some(old) = self.children_mut(dir)?.insert(name.to_string(), id) {
            if old != id {
                self.release(old);
            }
        }
        self.mark_dirty(dir)
    }

    /// Allocate `node` and attach it under `dir`.
    pub(crate) fn insert(
        &mut self,
        odb: &dyn ObjectStore,
        dir: NodeId,
        name: &str,
        node: Node,
    ) -> Result<NodeId> {
        self.load(odb, dir)?;
        let id = self.alloc(node, None);
        self.attach(odb, dir, name, id)?;
        Ok(id)
    }

    /// Unlink `name` from `dir` without freeing it. The caller owns the subtree.
    pub(crate) fn detach(
        &mut self,
        odb: &dyn ObjectStore,
        dir: NodeId,
        name: &str,
    ) -> Result<Option<NodeId>> {
        self.load(odb, dir)?;
        let removed = self.children_mut(dir)?.remove(name);
        if let Some(id) = removed {
            self.node_mut(id)?.parent = None;
            self.mark_dirty(dir)?;
        }
        Ok(removed)
    }

    /// Unlink and free `name` under `dir`. Returns whether it existed.
    pub(crate) fn remove(&mut self, odb: &dyn ObjectStore, dir: NodeId, name: &str) -> Result<bool> {
        match self.detach(odb, dir, name)? {
            Some(id) => {
                self.release(id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Deep-copy a subtree into new, detached nodes.
    ///
    /// Unloaded directories stay unloaded in the copy: they share the
    /// immutable tree object by id.
    pub(crate) fn copy_subtree(&mut self, src: NodeId) -> Result<NodeId> {
        let mut node = self.node(src)?.clone();
        let children = match &mut node.kind {
            NodeKind::Directory {
                children: Some(children),
            } => Some(std::mem::take(children)),
            _ => None,
        };
        let id = self.alloc(node, None);
        if let Some(children) = children {
            for (name, child) in children {
                let copy = self.copy_subtree(child)?;
                self.node_mut(copy)?.parent = Some(id);
                self.children_mut(id)?.insert(name, copy);
            }
        }
        Ok(id)
    }

    pub(crate) fn write_file(&mut self, id: NodeId, bytes: Vec<u8>) -> Result<()> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::File { data, .. } => *data = Some(bytes),
            NodeKind::Directory { .. } => {
                return Err(Error::is_a_directory(format!("node {}", id.0)))
            }
        }
        self.mark_dirty(id)
    }

    pub(crate) fn set_file_type(&mut self, id: NodeId, new_type: FileType) -> Result<()> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::File { file_type, .. } => {
                if *file_type == new_type {
                    return Ok(());
                }
                *file_type = new_type;
            }
            NodeKind::Directory { .. } => {
                return Err(Error::is_a_directory(format!("node {}", id.0)))
            }
        }
        self.mark_dirty(id)
    }

    pub(crate) fn read_file(&self, odb: &dyn ObjectStore, id: NodeId) -> Result<Vec<u8>> {
        let node = self.node(id)?;
        match (&node.kind, node.origin) {
            (NodeKind::File { data: Some(data), .. }, _) => Ok(data.clone()),
            (NodeKind::File { .. }, Some(origin)) => odb.read_blob(origin),
            (NodeKind::File { .. }, None) => {
                Err(Error::git_msg(format!("file node {} has no content", id.0)))
            }
            (NodeKind::Directory { .. }, _) => {
                Err(Error::is_a_directory(format!("node {}", id.0)))
            }
        }
    }

    pub(crate) fn file_size(&self, odb: &dyn ObjectStore, id: NodeId) -> Result<u64> {
        let node = self.node(id)?;
        match (&node.kind, node.origin) {
            (NodeKind::File { data: Some(data), .. }, _) => Ok(data.len() as u64),
            (NodeKind::File { .. }, Some(origin)) => odb.blob_size(origin),
            _ => self.read_file(odb, id).map(|d| d.len() as u64),
        }
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    pub(crate) fn root_origin(&self) -> Option<Oid> {
        self.node(self.root).ok().and_then(|n| n.origin)
    }

    pub(crate) fn root_dirty(&self) -> bool {
        self.node(self.root).map(|n| n.dirty).unwrap_or(false)
    }

    /// Write every dirty node and return the root tree id with the number
    /// of objects written.
    ///
    /// Node state changes only once every write has succeeded; a failed
    /// persist leaves the tree exactly as dirty as before.
    pub(crate) fn persist(&mut self, odb: &dyn ObjectStore) -> Result<(Oid, usize)> {
        let mut updates = Vec::new();
        let mut writes = 0;
        let root = match self.compute(odb, self.root, true, &mut updates, &mut writes)? {
            Some(oid) => oid,
            None => return Err(Error::git_msg("root tree produced no id")),
        };

        for (id, origin) in updates {
            let node = self.node_mut(id)?;
            node.origin = origin;
            node.dirty = false;
            if let NodeKind::File { data, .. } = &mut node.kind {
                *data = None;
            }
        }
        Ok((root, writes))
    }

    fn compute(
        &self,
        odb: &dyn ObjectStore,
        id: NodeId,
        is_root: bool,
        updates: &mut Vec<(NodeId, Option<Oid>)>,
        writes: &mut usize,
    ) -> Result<Option<Oid>> {
        let node = self.node(id)?;
        if !node.dirty && (node.origin.is_some() || !is_root) {
            return Ok(node.origin);
        }

        let oid = match &node.kind {
            NodeKind::File { data: Some(bytes), .. } => {
                *writes += 1;
                Some(odb.write_blob(bytes)?)
            }
            NodeKind::File { data: None, .. } => node.origin,
            NodeKind::Directory { children: None } => node.origin,
            NodeKind::Directory {
                children: Some(children),
            } => {
                let mut entries = Vec::with_capacity(children.len());
                for (name, child) in children {
                    if let Some(oid) = self.compute(odb, *child, false, updates, writes)? {
                        let file_type = self.node(*child)?.file_type();
                        entries.push(TreeEntry::new(name.clone(), oid, file_type));
                    }
                }
                if entries.is_empty() && !is_root {
                    None
                } else {
                    *writes += 1;
                    Some(odb.write_tree(&entries)?)
                }
            }
        };
        updates.push((id, oid));
        Ok(oid)
    }
}
