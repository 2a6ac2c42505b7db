//! Three-way tree merge.
//!
//! Walks base, ours and theirs in parallel by name. Paths only one side
//! changed take that side; paths both sides changed are merged (file
//! content line by line, subtrees recursively) or recorded as conflicts.
//! Unchanged subtrees are never read below their root.

pub(crate) mod text;

use std::collections::{BTreeMap, BTreeSet};

use crate::checkout;
use crate::error::Result;
use crate::odb::ObjectStore;
use crate::paths::join_path;
use crate::tree::{entry_at_path, tree_map};
use crate::types::{Entry, FileType, Oid, TreeEntry};

/// Names shown in conflict markers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeLabels {
    pub base: String,
    pub ours: String,
    pub theirs: String,
}

impl Default for MergeLabels {
    fn default() -> Self {
        Self {
            base: "BASE".into(),
            ours: "OURS".into(),
            theirs: "THEIRS".into(),
        }
    }
}

/// How the result tree is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeStrategy {
    /// Content-level three-way merge against the merge base.
    #[default]
    Resolve,
    /// Keep our tree as is.
    Ours,
    /// Take their tree as is.
    Theirs,
}

impl MergeStrategy {
    pub fn name(self) -> &'static str {
        match self {
            Self::Resolve => "resolve",
            Self::Ours => "ours",
            Self::Theirs => "theirs",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConflictKind {
    /// Both sides edited overlapping lines.
    Content,
    /// Same content, irreconcilable file modes.
    Mode,
    /// File on one side, directory on the other.
    Type,
    /// One side edited what the other deleted.
    ModifyDelete,
    /// Uncommitted edits in the working store are in the way.
    Worktree,
}

/// The three versions of a conflicting file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictContents {
    pub base: Vec<u8>,
    pub ours: Vec<u8>,
    pub theirs: Vec<u8>,
}

/// Everything known about one conflicting path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictRecord {
    pub kind: ConflictKind,
    pub base: Option<Entry>,
    pub ours: Option<Entry>,
    pub theirs: Option<Entry>,
    /// Working store entry, for `Worktree` conflicts.
    pub worktree: Option<Entry>,
    pub contents: Option<ConflictContents>,
    pub labels: MergeLabels,
}

impl ConflictRecord {
    /// Content annotated with conflict markers, when the three contents
    /// are known.
    pub fn format(&self) -> Option<Vec<u8>> {
        let c = self.contents.as_ref()?;
        Some(text::merge(&c.base, &c.ours, &c.theirs).render(&self.labels.ours, &self.labels.theirs))
    }
}

/// Result of a tree merge.
#[derive(Debug, Clone)]
pub enum MergeOutcome {
    Success(Oid),
    /// `partial` holds every resolved change with ours kept at each
    /// conflicting path.
    Conflicting {
        conflicts: BTreeMap<String, ConflictRecord>,
        partial: Oid,
    },
}

impl MergeOutcome {
    pub fn tree(&self) -> Oid {
        match self {
            Self::Success(tree) => *tree,
            Self::Conflicting { partial, .. } => *partial,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Three-way tree merger over an object store.
pub struct Merger<'a> {
    odb: &'a dyn ObjectStore,
    labels: MergeLabels,
    strategy: MergeStrategy,
    worktree: Option<Oid>,
}

impl<'a> Merger<'a> {
    pub fn new(odb: &'a dyn ObjectStore) -> Self {
        Self {
            odb,
            labels: MergeLabels::default(),
            strategy: MergeStrategy::default(),
            worktree: None,
        }
    }

    pub fn labels(mut self, labels: MergeLabels) -> Self {
        self.labels = labels;
        self
    }

    pub fn strategy(mut self, strategy: MergeStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Also protect uncommitted edits: `tree` is the persisted working store,
    /// compared against `ours`.
    pub fn worktree(mut self, tree: Option<Oid>) -> Self {
        self.worktree = tree;
        self
    }

    /// Merge `ours` and `theirs` given their common ancestor tree `base`
    /// (`None` for unrelated histories).
    pub fn merge(&self, base: Option<Oid>, ours: Oid, theirs: Oid) -> Result<MergeOutcome> {
        let mut conflicts = BTreeMap::new();
        let merged = match self.strategy {
            MergeStrategy::Ours => ours,
            MergeStrategy::Theirs => theirs,
            MergeStrategy::Resolve if ours == theirs || base == Some(theirs) => ours,
            MergeStrategy::Resolve if base == Some(ours) => theirs,
            MergeStrategy::Resolve => {
                match self.merge_trees("", base, Some(ours), Some(theirs), &mut conflicts)? {
                    Some(tree) => tree,
                    None => self.odb.write_tree(&[])?,
                }
            }
        };

        if let Some(worktree) = self.worktree.filter(|w| *w != ours) {
            self.protect_worktree(ours, merged, worktree, &mut conflicts)?;
        }

        tracing::debug!(
            strategy = self.strategy.name(),
            tree = %merged,
            conflicts = conflicts.len(),
            "merged trees"
        );
        if conflicts.is_empty() {
            Ok(MergeOutcome::Success(merged))
        } else {
            Ok(MergeOutcome::Conflicting {
                conflicts,
                partial: merged,
            })
        }
    }

    /// Record a `Worktree` conflict wherever applying `merged` over `ours`
    /// would clobber an uncommitted edit.
    fn protect_worktree(
        &self,
        ours: Oid,
        merged: Oid,
        worktree: Oid,
        conflicts: &mut BTreeMap<String, ConflictRecord>,
    ) -> Result<()> {
        let plan = checkout::plan(self.odb, Some(ours), merged, Some(worktree))?;
        for (path, c) in plan.conflicts {
            conflicts
                .entry(path)
                .and_modify(|r| {
                    r.kind = ConflictKind::Worktree;
                    r.worktree = c.worktree;
                })
                .or_insert_with(|| ConflictRecord {
                    kind: ConflictKind::Worktree,
                    base: None,
                    ours: c.head,
                    theirs: c.target,
                    worktree: c.worktree,
                    contents: None,
                    labels: self.labels.clone(),
                });
        }

        for (path, record) in conflicts.iter_mut() {
            if record.kind == ConflictKind::Worktree {
                continue;
            }
            let local = entry_at_path(self.odb, worktree, path)?;
            if local != record.ours {
                record.kind = ConflictKind::Worktree;
                record.worktree = local;
            }
        }
        Ok(())
    }

    fn merge_trees(
        &self,
        path: &str,
        base: Option<Oid>,
        ours: Option<Oid>,
        theirs: Option<Oid>,
        conflicts: &mut BTreeMap<String, ConflictRecord>,
    ) -> Result<Option<Oid>> {
        let base_map = tree_map(self.odb, base)?;
        let ours_map = tree_map(self.odb, ours)?;
        let theirs_map = tree_map(self.odb, theirs)?;
        let names: BTreeSet<&String> = base_map
            .keys()
            .chain(ours_map.keys())
            .chain(theirs_map.keys())
            .collect();

        let mut entries = Vec::with_capacity(names.len());
        let mut changed = false;
        for name in names {
            let o = ours_map.get(name).copied();
            let merged = self.merge_entry(
                &join_path(path, name),
                base_map.get(name).copied(),
                o,
                theirs_map.get(name).copied(),
                conflicts,
            )?;
            changed |= merged != o;
            if let Some(e) = merged {
                entries.push(TreeEntry::new(name.as_str(), e.oid, e.file_type));
            }
        }

        if !changed {
            return Ok(ours);
        }
        if entries.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.odb.write_tree(&entries)?))
    }

    fn merge_entry(
        &self,
        path: &str,
        b: Option<Entry>,
        o: Option<Entry>,
        t: Option<Entry>,
        conflicts: &mut BTreeMap<String, ConflictRecord>,
    ) -> Result<Option<Entry>> {
        if o == t || t == b {
            return Ok(o);
        }
        if o == b {
            return Ok(t);
        }

        let subtree = |e: Option<Entry>| e.filter(Entry::is_dir).map(|e| e.oid);
        match (o, t) {
            (Some(oe), Some(te)) if oe.oid == te.oid => {
                match merge_modes(b.map(|e| e.file_type), oe.file_type, te.file_type) {
                    Some(file_type) => Ok(Some(Entry::new(oe.oid, file_type))),
                    None => {
                        self.conflict(conflicts, path, ConflictKind::Mode, b, o, t, None);
                        Ok(o)
                    }
                }
            }
            (Some(oe), Some(te)) if oe.is_dir() && te.is_dir() => Ok(self
                .merge_trees(path, subtree(b), Some(oe.oid), Some(te.oid), conflicts)?
                .map(Entry::tree)),
            (Some(oe), None) if oe.is_dir() => Ok(self
                .merge_trees(path, subtree(b), Some(oe.oid), None, conflicts)?
                .map(Entry::tree)),
            (None, Some(te)) if te.is_dir() => Ok(self
                .merge_trees(path, subtree(b), None, Some(te.oid), conflicts)?
                .map(Entry::tree)),
            (Some(oe), Some(te)) if oe.is_dir() || te.is_dir() => {
                self.conflict(conflicts, path, ConflictKind::Type, b, o, t, None);
                Ok(o)
            }
            (Some(_), None) | (None, Some(_)) => {
                self.conflict(conflicts, path, ConflictKind::ModifyDelete, b, o, t, None);
                Ok(o.or(t))
            }
            (Some(oe), Some(te)) => self.merge_files(path, b, oe, te, conflicts),
            (None, None) => Ok(None),
        }
    }

    fn merge_files(
        &self,
        path: &str,
        b: Option<Entry>,
        o: Entry,
        t: Entry,
        conflicts: &mut BTreeMap<String, ConflictRecord>,
    ) -> Result<Option<Entry>> {
        if o.file_type == FileType::Gitlink || t.file_type == FileType::Gitlink {
            self.conflict(conflicts, path, ConflictKind::Content, b, Some(o), Some(t), None);
            return Ok(Some(o));
        }

        let base_data = match b {
            Some(e) if e.file_type.is_file() || e.file_type.is_link() => self.odb.read_blob(e.oid)?,
            _ => Vec::new(),
        };
        let contents = ConflictContents {
            base: base_data,
            ours: self.odb.read_blob(o.oid)?,
            theirs: self.odb.read_blob(t.oid)?,
        };

        if o.file_type.is_link() || t.file_type.is_link() {
            self.conflict(conflicts, path, ConflictKind::Content, b, Some(o), Some(t), Some(contents));
            return Ok(Some(o));
        }

        let merged = text::merge(&contents.base, &contents.ours, &contents.theirs);
        if !merged.is_clean() {
            self.conflict(conflicts, path, ConflictKind::Content, b, Some(o), Some(t), Some(contents));
            return Ok(Some(o));
        }
        let Some(file_type) = merge_modes(b.map(|e| e.file_type), o.file_type, t.file_type) else {
            self.conflict(conflicts, path, ConflictKind::Mode, b, Some(o), Some(t), Some(contents));
            return Ok(Some(o));
        };
        let oid = self.odb.write_blob(&merged.render("", ""))?;
        Ok(Some(Entry::new(oid, file_type)))
    }

    #[allow(clippy::too_many_arguments)]
    fn conflict(
        &self,
        conflicts: &mut BTreeMap<String, ConflictRecord>,
        path: &str,
        kind: ConflictKind,
        base: Option<Entry>,
        ours: Option<Entry>,
        theirs: Option<Entry>,
        contents: Option<ConflictContents>,
    ) {
        tracing::debug!(path, ?kind, "merge conflict");
        conflicts.insert(
            path.to_string(),
            ConflictRecord {
                kind,
                base,
                ours,
                theirs,
                worktree: None,
                contents,
                labels: self.labels.clone(),
            },
        );
    }
}

/// Three-way merge of file modes; `None` when both sides changed it differently.
fn merge_modes(base: Option<FileType>, ours: FileType, theirs: FileType) -> Option<FileType> {
    if ours == theirs {
        Some(ours)
    } else if base == Some(ours) {
        Some(theirs)
    } else if base == Some(theirs) {
        Some(ours)
    } else {
        None
    }
}
