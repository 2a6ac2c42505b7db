mod common;

use gitvfs::*;

#[test]
fn commit_moves_branch_and_head() {
    let dir = tempfile::tempdir().unwrap();
    let store = common::create_store(dir.path(), "main");
    let gfs = common::open_gfs(&store, "main");
    let before = common::head(&gfs);

    gfs.write_text("a.txt", "a").unwrap();
    let id = gfs.commit().message("add a").execute().unwrap().commit().unwrap();

    assert_eq!(store.resolve_branch("main").unwrap(), Some(id));
    assert_eq!(common::head(&gfs), id);
    let info = store.read_commit(id).unwrap();
    assert_eq!(info.parents, vec![before]);
    assert_eq!(info.message, "add a");
    assert!(!gfs.is_dirty().unwrap());
}

#[test]
fn commit_unchanged_tree_is_no_change() {
    let dir = tempfile::tempdir().unwrap();
    let store = common::create_store(dir.path(), "main");
    let (counting, gfs) = common::counting_gfs(&store, "main");
    let before = common::head(&gfs);

    assert_eq!(gfs.commit().execute().unwrap(), CommitResult::NoChange);
    assert_eq!(counting.writes(), 0);
    assert_eq!(store.resolve_branch("main").unwrap(), Some(before));
}

#[test]
fn commit_after_reverting_edit_is_no_change() {
    let dir = tempfile::tempdir().unwrap();
    let (_store, gfs) = common::store_with_files(dir.path());

    gfs.write_text("hello.txt", "changed").unwrap();
    gfs.write_text("hello.txt", "hello").unwrap();
    assert_eq!(gfs.commit().execute().unwrap(), CommitResult::NoChange);
}

#[test]
fn allow_empty_commits_same_tree() {
    let dir = tempfile::tempdir().unwrap();
    let store = common::create_store(dir.path(), "main");
    let gfs = common::open_gfs(&store, "main");
    let before = common::head(&gfs);

    let result = gfs.commit().allow_empty(true).message("empty").execute().unwrap();
    let id = result.commit().unwrap();
    assert_eq!(
        store.read_commit(id).unwrap().tree,
        store.read_commit(before).unwrap().tree
    );
}

#[test]
fn first_commit_on_unborn_branch_has_no_parents() {
    let dir = tempfile::tempdir().unwrap();
    let store = common::create_store(dir.path(), "main");
    let gfs = common::open_gfs(&store, "fresh");
    assert!(!gfs.status().unwrap().is_initialized());
    assert_eq!(gfs.status().unwrap().branch(), Some("fresh"));

    gfs.write_text("only.txt", "1").unwrap();
    let id = gfs.commit().message("root").execute().unwrap().commit().unwrap();
    assert!(store.read_commit(id).unwrap().parents.is_empty());
    assert_eq!(store.resolve_branch("fresh").unwrap(), Some(id));
}

#[test]
fn amend_replaces_head() {
    let dir = tempfile::tempdir().unwrap();
    let store = common::create_store(dir.path(), "main");
    let gfs = common::open_gfs(&store, "main");
    let root = common::head(&gfs);
    let author = Signature {
        time: Some(1_700_000_000),
        ..Signature::new("Ada", "ada@example.com")
    };
    gfs.write_text("a.txt", "a").unwrap();
    gfs.commit().author(author.clone()).message("first").execute().unwrap();

    gfs.write_text("b.txt", "b").unwrap();
    let id = gfs
        .commit()
        .amend(true)
        .message("first, amended")
        .execute()
        .unwrap()
        .commit()
        .unwrap();

    let info = store.read_commit(id).unwrap();
    assert_eq!(info.parents, vec![root]);
    assert_eq!(info.author.name, "Ada");
    assert_eq!(info.author.time, Some(1_700_000_000));
    assert_eq!(gfs.read_text("a.txt").unwrap(), "a");
    assert_eq!(gfs.read_text("b.txt").unwrap(), "b");
}

#[test]
fn amend_without_head_fails() {
    let dir = tempfile::tempdir().unwrap();
    let store = common::create_store(dir.path(), "main");
    let gfs = common::open_gfs(&store, "fresh");
    gfs.write_text("a.txt", "a").unwrap();

    assert!(matches!(
        gfs.commit().amend(true).execute(),
        Err(Error::NoHeadCommit)
    ));
}

#[test]
fn committer_defaults_to_session_signature() {
    let dir = tempfile::tempdir().unwrap();
    let store = common::create_store(dir.path(), "main");
    let gfs = store
        .gfs(GfsOptions {
            signature: Some(Signature::new("Bob", "bob@example.com")),
            ..GfsOptions::branch("main")
        })
        .unwrap();
    gfs.write_text("a.txt", "a").unwrap();
    let id = gfs.commit().execute().unwrap().commit().unwrap();

    let info = store.read_commit(id).unwrap();
    assert_eq!(info.committer.email, "bob@example.com");
    assert_eq!(info.author.email, "bob@example.com");
    assert_eq!(info.message, "");
}

#[test]
fn detached_commit_leaves_branches_alone() {
    let dir = tempfile::tempdir().unwrap();
    let store = common::create_store(dir.path(), "main");
    let main = store.resolve_branch("main").unwrap().unwrap();
    let gfs = store.gfs(GfsOptions::revision(main.to_string())).unwrap();
    assert!(!gfs.status().unwrap().is_attached());

    gfs.write_text("a.txt", "a").unwrap();
    let id = gfs.commit().execute().unwrap().commit().unwrap();
    assert_eq!(common::head(&gfs), id);
    assert_eq!(store.resolve_branch("main").unwrap(), Some(main));
}

#[test]
fn stale_branch_fails_and_keeps_status() {
    let dir = tempfile::tempdir().unwrap();
    let store = common::create_store(dir.path(), "main");
    let first = common::open_gfs(&store, "main");
    let second = common::open_gfs(&store, "main");

    common::commit_files(&second, &[("b.txt", "b")], "second wins");
    let status = first.status().unwrap();

    first.write_text("a.txt", "a").unwrap();
    let err = first.commit().execute().unwrap_err();
    assert!(matches!(err, Error::StaleRef(_)));
    assert!(err.is_retryable());
    assert_eq!(first.status().unwrap(), status);
    assert_eq!(first.read_text("a.txt").unwrap(), "a");
}

#[test]
fn command_runs_once() {
    let dir = tempfile::tempdir().unwrap();
    let store = common::create_store(dir.path(), "main");
    let gfs = common::open_gfs(&store, "main");
    gfs.write_text("a.txt", "a").unwrap();

    let mut commit = gfs.commit();
    commit.execute().unwrap();
    assert!(matches!(commit.execute(), Err(Error::AlreadyExecuted)));
}

#[test]
fn closed_session_rejects_everything() {
    let dir = tempfile::tempdir().unwrap();
    let store = common::create_store(dir.path(), "main");
    let gfs = common::open_gfs(&store, "main");
    gfs.close().unwrap();

    assert!(gfs.is_closed());
    assert!(matches!(gfs.write_text("a.txt", "a"), Err(Error::Closed)));
    assert!(matches!(gfs.commit().execute(), Err(Error::Closed)));
}

#[test]
fn status_is_normal_between_commands() {
    let dir = tempfile::tempdir().unwrap();
    let store = common::create_store(dir.path(), "main");
    let gfs = common::open_gfs(&store, "main");
    common::commit_files(&gfs, &[("a.txt", "a")], "a");
    assert_eq!(gfs.status().unwrap().state(), GfsState::Normal);
}

#[test]
fn merge_resolved_back_to_ours_is_no_change() {
    let dir = tempfile::tempdir().unwrap();
    let store = common::create_store(dir.path(), "main");
    let (counting, gfs) = common::counting_gfs(&store, "main");
    common::commit_files(&gfs, &[("dir/a.txt", "aaa")], "seed");
    gfs.create_branch("feature", None).unwrap();
    let feature = common::open_gfs(&store, "feature");
    let tip = common::commit_files(&feature, &[("dir/a.txt", "feature a")], "feature work");
    let main_head = common::commit_files(&gfs, &[("dir/a.txt", "main a")], "main work");

    let result = gfs.merge("feature").execute().unwrap();
    assert!(matches!(result, MergeResult::Conflicting(_)));
    gfs.write_text("dir/a.txt", "main a").unwrap();

    let commits = counting.commits();
    assert_eq!(gfs.commit().execute().unwrap(), CommitResult::NoChange);
    assert_eq!(counting.commits(), commits);
    assert_eq!(store.resolve_branch("main").unwrap(), Some(main_head));

    // The pending merge survives, so an explicit empty commit finishes it.
    let note = gfs.status().unwrap().merge_note().cloned().unwrap();
    assert_eq!(note.source, Some(tip));
    let id = gfs.commit().allow_empty(true).execute().unwrap().commit().unwrap();
    assert_eq!(store.read_commit(id).unwrap().parents, vec![main_head, tip]);
    assert!(gfs.status().unwrap().merge_note().is_none());
}
