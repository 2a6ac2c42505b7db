//! Carrying a working store from one tree to another without losing edits.
//!
//! Three trees are compared path by path: HEAD (what the overlay was bound
//! to), TARGET (where it should go) and WORKTREE (what the overlay holds
//! now). A path is switched to TARGET only when the overlay has not
//! touched it; a path both the overlay and TARGET changed is a conflict.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::Result;
use crate::odb::ObjectStore;
use crate::paths::join_path;
use crate::tree::tree_map;
use crate::types::{Entry, Oid};
use crate::working_store::WorkingStore;

/// A path where the working store and the target disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutConflict {
    pub head: Option<Entry>,
    pub target: Option<Entry>,
    pub worktree: Option<Entry>,
}

/// What a checkout would do.
#[derive(Debug, Clone, Default)]
pub struct CheckoutPlan {
    /// Paths to replace wholesale (`None` = remove), in tree order.
    pub changes: Vec<(String, Option<Entry>)>,
    pub conflicts: BTreeMap<String, CheckoutConflict>,
}

impl CheckoutPlan {
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }
}

/// Plan moving a worktree from `head` to `target`.
pub fn plan(
    odb: &dyn ObjectStore,
    head: Option<Oid>,
    target: Oid,
    worktree: Option<Oid>,
) -> Result<CheckoutPlan> {
    let mut plan = CheckoutPlan::default();
    plan_dir(odb, "", head, Some(target), worktree, &mut plan)?;
    tracing::debug!(
        changes = plan.changes.len(),
        conflicts = plan.conflicts.len(),
        "planned checkout"
    );
    Ok(plan)
}

fn plan_dir(
    odb: &dyn ObjectStore,
    path: &str,
    head: Option<Oid>,
    target: Option<Oid>,
    worktree: Option<Oid>,
    plan: &mut CheckoutPlan,
) -> Result<()> {
    if target == worktree || target == head {
        return Ok(());
    }

    let head_map = tree_map(odb, head)?;
    let target_map = tree_map(odb, target)?;
    let worktree_map = tree_map(odb, worktree)?;
    let names: BTreeSet<&String> = head_map
        .keys()
        .chain(target_map.keys())
        .chain(worktree_map.keys())
        .collect();

    for name in names {
        let h = head_map.get(name).copied();
        let t = target_map.get(name).copied();
        let w = worktree_map.get(name).copied();
        let child = join_path(path, name);

        if t == w || t == h {
            continue;
        }
        if h == w {
            plan.changes.push((child, t));
            continue;
        }
        match (t, w) {
            (Some(t), Some(w)) if t.is_dir() && w.is_dir() => {
                let h = h.filter(Entry::is_dir).map(|e| e.oid);
                plan_dir(odb, &child, h, Some(t.oid), Some(w.oid), plan)?;
            }
            _ => {
                plan.conflicts.insert(
                    child,
                    CheckoutConflict {
                        head: h,
                        target: t,
                        worktree: w,
                    },
                );
            }
        }
    }
    Ok(())
}

/// Persist `store` and plan moving it from its baseline to `target`.
pub(crate) fn plan_for(store: &mut WorkingStore, odb: &dyn ObjectStore, target: Oid) -> Result<CheckoutPlan> {
    let worktree = store.persist()?;
    plan(odb, store.base_tree(), target, Some(worktree))
}

/// Apply a conflict-free plan to `store`.
pub(crate) fn apply(store: &mut WorkingStore, plan: &CheckoutPlan) -> Result<()> {
    for (path, entry) in &plan.changes {
        store.apply_entry(path, *entry)?;
    }
    Ok(())
}
