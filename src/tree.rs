use std::collections::BTreeMap;

use crate::error::Result;
use crate::odb::ObjectStore;
use crate::paths::normalize_path;
use crate::types::{Entry, Oid};

/// Read a tree into a name-keyed map. `None` reads as the empty tree.
pub(crate) fn tree_map(odb: &dyn ObjectStore, tree: Option<Oid>) -> Result<BTreeMap<String, Entry>> {
    let Some(tree) = tree else {
        return Ok(BTreeMap::new());
    };
    Ok(odb
        .read_tree(tree)?
        .into_iter()
        .map(|e| {
            let entry = e.entry();
            (e.name, entry)
        })
        .collect())
}

/// Return the entry at `path`, or `None` if missing.
///
/// Walks the tree from `tree` through each path segment. Returns `None`
/// when any segment is not found or an intermediate entry is not a tree.
/// The root path yields the tree itself.
pub fn entry_at_path(odb: &dyn ObjectStore, tree: Oid, path: &str) -> Result<Option<Entry>> {
    let path = normalize_path(path)?;
    let mut current = Entry::tree(tree);
    if path.is_empty() {
        return Ok(Some(current));
    }

    for segment in path.split('/') {
        if !current.is_dir() {
            return Ok(None);
        }
        match odb
            .read_tree(current.oid)?
            .into_iter()
            .find(|e| e.name == segment)
        {
            Some(e) => current = e.entry(),
            None => return Ok(None),
        }
    }
    Ok(Some(current))
}
