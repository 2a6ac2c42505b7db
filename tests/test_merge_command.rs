mod common;

use gitvfs::*;

/// Seeded `main` plus a `feature` branch that edited `dir/a.txt`.
fn diverge(dir: &std::path::Path) -> (GitStore, Gfs, Oid) {
    let (store, gfs) = common::store_with_files(dir);
    gfs.create_branch("feature", None).unwrap();
    let feature = common::open_gfs(&store, "feature");
    let tip = common::commit_files(&feature, &[("dir/a.txt", "feature a")], "feature work");
    (store, gfs, tip)
}

// ---------------------------------------------------------------------------
// fast-forward
// ---------------------------------------------------------------------------

#[test]
fn fast_forward_moves_ref_without_new_commit() {
    let dir = tempfile::tempdir().unwrap();
    let (store, _gfs, tip) = diverge(dir.path());
    let (counting, gfs) = common::counting_gfs(&store, "main");

    assert_eq!(gfs.merge("feature").execute().unwrap(), MergeResult::FastForward(tip));
    assert_eq!(counting.commits(), 0);
    assert_eq!(store.resolve_branch("main").unwrap(), Some(tip));
    assert_eq!(common::head(&gfs), tip);
    assert_eq!(gfs.read_text("dir/a.txt").unwrap(), "feature a");
    assert!(!gfs.is_dirty().unwrap());
}

#[test]
fn merging_an_ancestor_is_up_to_date() {
    let dir = tempfile::tempdir().unwrap();
    let (_store, gfs, tip) = diverge(dir.path());
    gfs.merge("feature").execute().unwrap();

    assert_eq!(
        gfs.merge("feature").execute().unwrap(),
        MergeResult::AlreadyUpToDate(tip)
    );
}

#[test]
fn fast_forward_squash_leaves_ref() {
    let dir = tempfile::tempdir().unwrap();
    let (store, gfs, tip) = diverge(dir.path());
    let before = common::head(&gfs);

    let result = gfs.merge("feature").squash(true).execute().unwrap();
    assert_eq!(result, MergeResult::FastForwardSquashed);
    assert_eq!(store.resolve_branch("main").unwrap(), Some(before));
    assert_eq!(gfs.read_text("dir/a.txt").unwrap(), "feature a");

    let note = gfs.status().unwrap().merge_note().cloned().unwrap();
    assert_eq!(note.source, None);
    assert!(note.message.starts_with("Squashed commit of the following:"));
    assert!(note.message.contains(&tip.to_string()));

    let id = gfs.commit().execute().unwrap().commit().unwrap();
    assert_eq!(store.read_commit(id).unwrap().parents, vec![before]);
    assert!(gfs.status().unwrap().merge_note().is_none());
}

#[test]
fn fast_forward_into_unborn_branch() {
    let dir = tempfile::tempdir().unwrap();
    let (store, _gfs, tip) = diverge(dir.path());
    let fresh = common::open_gfs(&store, "fresh");

    assert_eq!(fresh.merge("feature").execute().unwrap(), MergeResult::FastForward(tip));
    assert_eq!(store.resolve_branch("fresh").unwrap(), Some(tip));
}

// ---------------------------------------------------------------------------
// three-way
// ---------------------------------------------------------------------------

#[test]
fn divergent_merge_writes_two_parent_commit() {
    let dir = tempfile::tempdir().unwrap();
    let (store, gfs, tip) = diverge(dir.path());
    let main_head = common::commit_files(&gfs, &[("main.txt", "m")], "main work");

    let MergeResult::Merged(id) = gfs.merge("feature").execute().unwrap() else {
        panic!("expected a merge commit");
    };
    let info = store.read_commit(id).unwrap();
    assert_eq!(info.parents, vec![main_head, tip]);
    assert_eq!(info.message, "Merge branch 'feature'");
    assert_eq!(store.resolve_branch("main").unwrap(), Some(id));
    assert_eq!(gfs.read_text("dir/a.txt").unwrap(), "feature a");
    assert_eq!(gfs.read_text("main.txt").unwrap(), "m");
    assert!(!gfs.is_dirty().unwrap());
}

#[test]
fn merge_message_names_target_branch() {
    let dir = tempfile::tempdir().unwrap();
    let (store, gfs, _) = diverge(dir.path());
    gfs.create_branch("topic", None).unwrap();
    let topic = common::open_gfs(&store, "topic");
    common::commit_files(&topic, &[("topic.txt", "t")], "topic work");

    let MergeResult::Merged(id) = topic.merge("feature").execute().unwrap() else {
        panic!("expected a merge commit");
    };
    assert_eq!(
        store.read_commit(id).unwrap().message,
        "Merge branch 'feature' into topic"
    );
}

#[test]
fn fast_forward_only_aborts_divergent_merge() {
    let dir = tempfile::tempdir().unwrap();
    let (store, gfs, _) = diverge(dir.path());
    let main_head = common::commit_files(&gfs, &[("main.txt", "m")], "main work");

    let result = gfs.merge("feature").fast_forward_only(true).execute().unwrap();
    assert_eq!(result, MergeResult::Aborted);
    assert_eq!(store.resolve_branch("main").unwrap(), Some(main_head));
    assert_eq!(gfs.read_text("dir/a.txt").unwrap(), "aaa");
}

#[test]
fn merge_without_commit_leaves_note() {
    let dir = tempfile::tempdir().unwrap();
    let (store, gfs, tip) = diverge(dir.path());
    let main_head = common::commit_files(&gfs, &[("main.txt", "m")], "main work");

    let result = gfs.merge("feature").commit(false).execute().unwrap();
    assert_eq!(result, MergeResult::MergedNotCommitted);
    assert_eq!(store.resolve_branch("main").unwrap(), Some(main_head));
    assert_eq!(
        gfs.status().unwrap().merge_note().unwrap().source,
        Some(tip)
    );

    let id = gfs.commit().execute().unwrap().commit().unwrap();
    let info = store.read_commit(id).unwrap();
    assert_eq!(info.parents, vec![main_head, tip]);
    assert_eq!(info.message, "Merge branch 'feature'");
}

#[test]
fn squash_merge_commits_with_one_parent() {
    let dir = tempfile::tempdir().unwrap();
    let (store, gfs, _) = diverge(dir.path());
    let main_head = common::commit_files(&gfs, &[("main.txt", "m")], "main work");

    let result = gfs.merge("feature").squash(true).execute().unwrap();
    assert_eq!(result, MergeResult::MergedSquashed);

    let id = gfs.commit().execute().unwrap().commit().unwrap();
    let info = store.read_commit(id).unwrap();
    assert_eq!(info.parents, vec![main_head]);
    assert!(info.message.contains("feature work"));
    assert_eq!(gfs.read_text("dir/a.txt").unwrap(), "feature a");
}

#[test]
fn ours_strategy_keeps_our_tree() {
    let dir = tempfile::tempdir().unwrap();
    let (store, gfs, tip) = diverge(dir.path());
    let main_head = common::commit_files(&gfs, &[("main.txt", "m")], "main work");

    let MergeResult::Merged(id) = gfs
        .merge("feature")
        .strategy(MergeStrategy::Ours)
        .execute()
        .unwrap()
    else {
        panic!("expected a merge commit");
    };
    let info = store.read_commit(id).unwrap();
    assert_eq!(info.tree, store.read_commit(main_head).unwrap().tree);
    assert_eq!(info.parents, vec![main_head, tip]);
}

#[test]
fn merge_by_revision() {
    let dir = tempfile::tempdir().unwrap();
    let (store, gfs, tip) = diverge(dir.path());
    common::commit_files(&gfs, &[("main.txt", "m")], "main work");

    let MergeResult::Merged(id) = gfs.merge(tip.to_string()).execute().unwrap() else {
        panic!("expected a merge commit");
    };
    assert_eq!(
        store.read_commit(id).unwrap().message,
        format!("Merge commit '{}'", tip)
    );
}

// ---------------------------------------------------------------------------
// conflicts
// ---------------------------------------------------------------------------

#[test]
fn conflicting_merge_writes_markers_and_note() {
    let dir = tempfile::tempdir().unwrap();
    let (store, gfs, tip) = diverge(dir.path());
    let main_head = common::commit_files(&gfs, &[("dir/a.txt", "main a")], "main work");

    let MergeResult::Conflicting(conflicts) = gfs.merge("feature").execute().unwrap() else {
        panic!("expected conflicts");
    };
    assert_eq!(conflicts.keys().collect::<Vec<_>>(), vec!["dir/a.txt"]);
    assert_eq!(store.resolve_branch("main").unwrap(), Some(main_head));

    let text = gfs.read_text("dir/a.txt").unwrap();
    assert!(text.contains("<<<<<<< HEAD\nmain a\n=======\nfeature a\n>>>>>>> feature\n"));

    let note = gfs.status().unwrap().merge_note().cloned().unwrap();
    assert_eq!(note.source, Some(tip));
    assert!(note.message.ends_with("\n\nConflicts:\n\tdir/a.txt\n"));

    // Resolve and finish.
    gfs.write_text("dir/a.txt", "resolved").unwrap();
    let id = gfs.commit().execute().unwrap().commit().unwrap();
    assert_eq!(store.read_commit(id).unwrap().parents, vec![main_head, tip]);
}

#[test]
fn uncommitted_edits_block_merge() {
    let dir = tempfile::tempdir().unwrap();
    let (store, gfs, _) = diverge(dir.path());
    let main_head = common::commit_files(&gfs, &[("main.txt", "m")], "main work");
    let status = gfs.status().unwrap();

    gfs.write_text("dir/a.txt", "local").unwrap();
    let MergeResult::CheckoutConflict(conflicts) = gfs.merge("feature").execute().unwrap() else {
        panic!("expected a checkout conflict");
    };
    assert_eq!(conflicts["dir/a.txt"].kind, ConflictKind::Worktree);
    assert_eq!(gfs.status().unwrap(), status);
    assert_eq!(store.resolve_branch("main").unwrap(), Some(main_head));
    assert_eq!(gfs.read_text("dir/a.txt").unwrap(), "local");
}

#[test]
fn uncommitted_edits_block_fast_forward() {
    let dir = tempfile::tempdir().unwrap();
    let (_store, gfs, _) = diverge(dir.path());

    gfs.write_text("dir/a.txt", "local").unwrap();
    let result = gfs.merge("feature").execute().unwrap();
    assert!(matches!(result, MergeResult::CheckoutConflict(_)));
    assert_eq!(gfs.read_text("dir/a.txt").unwrap(), "local");
}

#[test]
fn merge_needs_branch_and_known_source() {
    let dir = tempfile::tempdir().unwrap();
    let (store, gfs, tip) = diverge(dir.path());

    assert!(matches!(
        gfs.merge("nope").execute(),
        Err(Error::NoSuchBranch(_))
    ));

    let detached = store.gfs(GfsOptions::revision(tip.to_string())).unwrap();
    assert!(matches!(
        detached.merge("main").execute(),
        Err(Error::NoBranch(_))
    ));
}
