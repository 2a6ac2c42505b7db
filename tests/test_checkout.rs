mod common;

use gitvfs::*;

/// `main` with the seed files plus a `feature` branch that changed
/// `dir/a.txt` and added `feature.txt`.
fn with_feature(dir: &std::path::Path) -> (GitStore, Gfs, Oid) {
    let (store, gfs) = common::store_with_files(dir);
    gfs.create_branch("feature", None).unwrap();
    let feature = common::open_gfs(&store, "feature");
    let tip = common::commit_files(
        &feature,
        &[("dir/a.txt", "feature a"), ("feature.txt", "new")],
        "feature work",
    );
    (store, gfs, tip)
}

#[test]
fn checkout_branch_switches_tree_and_status() {
    let dir = tempfile::tempdir().unwrap();
    let (_store, gfs, tip) = with_feature(dir.path());

    assert_eq!(gfs.checkout("feature").execute().unwrap(), CheckoutResult::Success);
    let status = gfs.status().unwrap();
    assert_eq!(status.branch(), Some("feature"));
    assert_eq!(status.head(), Some(tip));
    assert_eq!(gfs.read_text("dir/a.txt").unwrap(), "feature a");
    assert_eq!(gfs.read_text("feature.txt").unwrap(), "new");
    assert!(!gfs.is_dirty().unwrap());
}

#[test]
fn checkout_accepts_full_ref_name() {
    let dir = tempfile::tempdir().unwrap();
    let (_store, gfs, _) = with_feature(dir.path());

    gfs.checkout("refs/heads/feature").execute().unwrap();
    assert_eq!(gfs.status().unwrap().branch(), Some("feature"));
}

#[test]
fn checkout_carries_unrelated_edits() {
    let dir = tempfile::tempdir().unwrap();
    let (_store, gfs, _) = with_feature(dir.path());

    gfs.write_text("hello.txt", "local").unwrap();
    gfs.write_text("scratch.txt", "untracked").unwrap();
    assert_eq!(gfs.checkout("feature").execute().unwrap(), CheckoutResult::Success);

    assert_eq!(gfs.read_text("hello.txt").unwrap(), "local");
    assert_eq!(gfs.read_text("scratch.txt").unwrap(), "untracked");
    assert_eq!(gfs.read_text("dir/a.txt").unwrap(), "feature a");
    assert!(gfs.is_dirty().unwrap());
}

#[test]
fn colliding_edit_blocks_checkout() {
    let dir = tempfile::tempdir().unwrap();
    let (_store, gfs, _) = with_feature(dir.path());
    let status = gfs.status().unwrap();

    gfs.write_text("dir/a.txt", "local a").unwrap();
    gfs.write_text("hello.txt", "local hello").unwrap();
    let CheckoutResult::Conflicting(conflicts) = gfs.checkout("feature").execute().unwrap() else {
        panic!("expected a conflict");
    };
    assert_eq!(conflicts.keys().collect::<Vec<_>>(), vec!["dir/a.txt"]);

    // Nothing moved.
    assert_eq!(gfs.status().unwrap(), status);
    assert_eq!(gfs.read_text("dir/a.txt").unwrap(), "local a");
    assert_eq!(gfs.read_text("hello.txt").unwrap(), "local hello");
    assert!(!gfs.exists("feature.txt").unwrap());
}

#[test]
fn force_discards_edits() {
    let dir = tempfile::tempdir().unwrap();
    let (_store, gfs, _) = with_feature(dir.path());

    gfs.write_text("dir/a.txt", "local a").unwrap();
    let result = gfs.checkout("feature").force(true).execute().unwrap();
    assert_eq!(result, CheckoutResult::Success);
    assert_eq!(gfs.read_text("dir/a.txt").unwrap(), "feature a");
    assert!(!gfs.is_dirty().unwrap());
}

#[test]
fn detach_at_branch_tip() {
    let dir = tempfile::tempdir().unwrap();
    let (_store, gfs, tip) = with_feature(dir.path());

    gfs.checkout("feature").detach(true).execute().unwrap();
    let status = gfs.status().unwrap();
    assert!(!status.is_attached());
    assert_eq!(status.head(), Some(tip));
}

#[test]
fn checkout_raw_revision_detaches() {
    let dir = tempfile::tempdir().unwrap();
    let (_store, gfs, tip) = with_feature(dir.path());

    gfs.checkout(tip.to_string()).execute().unwrap();
    let status = gfs.status().unwrap();
    assert_eq!(status.branch(), None);
    assert_eq!(status.head(), Some(tip));

    gfs.checkout("main").execute().unwrap();
    assert_eq!(gfs.status().unwrap().branch(), Some("main"));
    assert_eq!(gfs.read_text("dir/a.txt").unwrap(), "aaa");
}

#[test]
fn unknown_target_fails() {
    let dir = tempfile::tempdir().unwrap();
    let (_store, gfs) = common::store_with_files(dir.path());

    assert!(matches!(
        gfs.checkout("nope").execute(),
        Err(Error::NoSuchBranch(_))
    ));
    assert!(matches!(
        gfs.checkout("nope").detach(true).execute(),
        Err(Error::NoSuchRevision(_))
    ));
}

#[test]
fn branch_helpers() {
    let dir = tempfile::tempdir().unwrap();
    let (_store, gfs) = common::store_with_files(dir.path());
    let head = common::head(&gfs);

    assert_eq!(gfs.create_branch("topic", None).unwrap(), head);
    assert!(matches!(
        gfs.create_branch("topic", None),
        Err(Error::BranchExists(_))
    ));
    assert!(matches!(
        gfs.create_branch("bad..name", None),
        Err(Error::InvalidRefName(_))
    ));
    assert_eq!(gfs.list_branches().unwrap(), vec!["main", "topic"]);

    gfs.delete_branch("topic").unwrap();
    assert_eq!(gfs.list_branches().unwrap(), vec!["main"]);
    assert!(matches!(
        gfs.delete_branch("topic"),
        Err(Error::NoSuchBranch(_))
    ));
}
