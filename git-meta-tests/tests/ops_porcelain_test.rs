//! Integration coverage for `ops.rs`'s porcelain layer (`spec.md` §4.5):
//! `commit -a` across an open submodule, `checkout`'s submodule-open
//! policies, `rebase`, and `merge`'s fast-forward/up-to-date/real-merge
//! paths.

use git_meta_core::ops::{self, CheckoutSubmodules, MergeOutcome};
use git_meta_core::opener::{self, Opener};
use git_meta_core::rewrite::retry::NoDelay;
use git_meta_core::submodule;
use git_meta_tests::{add_submodule, new_meta_repo, new_sub_repo, point_submodule, write_and_commit};

#[test]
fn commit_all_stages_and_commits_an_open_submodules_edits() {
    let sub = new_sub_repo("seed");
    let x = sub.repo.head().unwrap().target().unwrap();

    let meta = new_meta_repo();
    add_submodule(&meta.repo, "s", "s", &sub.url, x, "m1: add s");

    let opener = Opener::new();
    opener::open_submodule(&meta.repo, "s").unwrap();
    let sub_path = opener.path_for(&meta.repo, "s").unwrap();
    std::fs::write(sub_path.join("README.md"), "edited in place\n").unwrap();

    let head_before = meta.repo.head().unwrap().target().unwrap();
    let new_oid = ops::commit(&meta.repo, &opener, "bump submodule", true).unwrap();
    let new_commit = meta.repo.find_commit(new_oid).unwrap();
    assert_eq!(new_commit.parent_id(0).unwrap(), head_before);

    let new_tree = new_commit.tree().unwrap();
    let new_sub_sha = new_tree.get_path(std::path::Path::new("s")).unwrap().id();
    assert_ne!(new_sub_sha, x, "the open submodule's edit must produce a fresh sub-commit");

    let sub_repo = git_meta_core::adapter::open(&sub_path).unwrap();
    let sub_head_commit = sub_repo.find_commit(new_sub_sha).unwrap();
    assert_eq!(sub_head_commit.parent_id(0).unwrap(), x);
    let blob = sub_head_commit
        .tree()
        .unwrap()
        .get_path(std::path::Path::new("README.md"))
        .unwrap()
        .to_object(&sub_repo)
        .unwrap()
        .peel_to_blob()
        .unwrap();
    assert_eq!(blob.content(), b"edited in place\n");
}

#[test]
fn commit_with_an_untouched_open_submodule_skips_it() {
    let sub = new_sub_repo("seed");
    let x = sub.repo.head().unwrap().target().unwrap();

    let meta = new_meta_repo();
    add_submodule(&meta.repo, "s", "s", &sub.url, x, "m1: add s");

    let opener = Opener::new();
    opener::open_submodule(&meta.repo, "s").unwrap();

    let new_oid = ops::commit(&meta.repo, &opener, "nothing changed in s", true).unwrap();
    let new_tree = meta.repo.find_commit(new_oid).unwrap().tree().unwrap();
    let sub_sha = new_tree.get_path(std::path::Path::new("s")).unwrap().id();
    assert_eq!(sub_sha, x, "an open but clean submodule must not get a spurious sub-commit");
}

#[test]
fn checkout_none_leaves_an_unopened_submodule_closed() {
    let sub = new_sub_repo("seed");
    let x = sub.repo.head().unwrap().target().unwrap();
    let y = write_and_commit(&sub.repo, "README.md", "y", "y");

    let meta = new_meta_repo();
    let m1 = add_submodule(&meta.repo, "s", "s", &sub.url, x, "m1: s=x");
    let m2 = point_submodule(&meta.repo, "s", y, "m2: s=y");
    git_meta_core::adapter::reset_hard(&meta.repo, m1).unwrap();

    let opener = Opener::new();
    let workdir_root = git_meta_core::adapter::workdir(&meta.repo);

    ops::checkout(&meta.repo, &opener, &m2.to_string(), CheckoutSubmodules::None).unwrap();
    assert!(!submodule::is_open(&workdir_root, "s"));

    ops::checkout(&meta.repo, &opener, &m2.to_string(), CheckoutSubmodules::All).unwrap();
    assert!(submodule::is_open(&workdir_root, "s"));
    let sub_path = workdir_root.join("s");
    let sub_repo = git_meta_core::adapter::open(&sub_path).unwrap();
    assert_eq!(sub_repo.head().unwrap().target().unwrap(), y);
}

#[test]
fn checkout_fast_forwards_an_already_open_submodule() {
    let sub = new_sub_repo("seed");
    let x = sub.repo.head().unwrap().target().unwrap();
    let y = write_and_commit(&sub.repo, "README.md", "y", "y");

    let meta = new_meta_repo();
    let m1 = add_submodule(&meta.repo, "s", "s", &sub.url, x, "m1: s=x");
    let m2 = point_submodule(&meta.repo, "s", y, "m2: s=y");
    git_meta_core::adapter::reset_hard(&meta.repo, m1).unwrap();

    let opener = Opener::new();
    opener::open_submodule(&meta.repo, "s").unwrap();

    ops::checkout(&meta.repo, &opener, &m2.to_string(), CheckoutSubmodules::None).unwrap();

    let workdir_root = git_meta_core::adapter::workdir(&meta.repo);
    let sub_repo = git_meta_core::adapter::open(&workdir_root.join("s")).unwrap();
    assert_eq!(
        sub_repo.head().unwrap().target().unwrap(),
        y,
        "an already-open submodule is fast-forwarded even under CheckoutSubmodules::None"
    );
}

#[test]
fn rebase_replays_unique_commits_onto_upstream() {
    let sub = new_sub_repo("seed");
    let x = sub.repo.head().unwrap().target().unwrap();

    let meta = new_meta_repo();
    let base = meta.repo.head().unwrap().target().unwrap();
    add_submodule(&meta.repo, "s", "s", &sub.url, x, "add s");
    let feature_tip = write_and_commit(&meta.repo, "notes.txt", "wip", "feature work");

    let opener = Opener::new();
    let outcome = ops::rebase(&meta.repo, &opener, base, Some(feature_tip), &NoDelay).unwrap();
    assert_eq!(outcome.commits_applied, 2);
    assert_eq!(meta.repo.head().unwrap().target().unwrap(), outcome.new_head);

    let new_head_commit = meta.repo.find_commit(outcome.new_head).unwrap();
    let mut cursor = new_head_commit.id();
    let mut count = 0;
    while cursor != base {
        let c = meta.repo.find_commit(cursor).unwrap();
        count += 1;
        cursor = c.parent_id(0).unwrap();
    }
    assert_eq!(count, 2);
}

#[test]
fn merge_reports_up_to_date_and_fast_forward() {
    let meta = new_meta_repo();
    let base = meta.repo.head().unwrap().target().unwrap();

    match ops::merge(&meta.repo, &Opener::new(), base, &NoDelay).unwrap() {
        MergeOutcome::UpToDate => {}
        _ => panic!("merging an ancestor must be a no-op"),
    }

    let ahead = write_and_commit(&meta.repo, "notes.txt", "ahead", "ahead commit");
    git_meta_core::adapter::reset_hard(&meta.repo, base).unwrap();
    let outcome = ops::merge(&meta.repo, &Opener::new(), ahead, &NoDelay).unwrap();
    match outcome {
        MergeOutcome::FastForward { new_head } => assert_eq!(new_head, ahead),
        _ => panic!("merging a descendant must fast-forward"),
    }
    assert_eq!(meta.repo.head().unwrap().target().unwrap(), ahead);
}

#[test]
fn merge_performs_a_real_three_way_submodule_merge() {
    let sub = new_sub_repo("seed");
    let base_sha = sub.repo.head().unwrap().target().unwrap();
    let sub_left = write_and_commit(&sub.repo, "a.txt", "left change", "left");
    git_meta_core::adapter::reset_hard(&sub.repo, base_sha).unwrap();
    let sub_right = write_and_commit(&sub.repo, "b.txt", "right change", "right");

    let meta = new_meta_repo();
    let root = meta.repo.head().unwrap().target().unwrap();
    add_submodule(&meta.repo, "s", "s", &sub.url, base_sha, "add s");
    let left_meta = point_submodule(&meta.repo, "s", sub_left, "left: s=left");

    git_meta_core::adapter::reset_hard(&meta.repo, root).unwrap();
    add_submodule(&meta.repo, "s", "s", &sub.url, base_sha, "add s (again, other branch)");
    let right_meta = point_submodule(&meta.repo, "s", sub_right, "right: s=right");

    let opener = Opener::new();
    opener::open_submodule(&meta.repo, "s").unwrap();

    let outcome = ops::merge(&meta.repo, &opener, left_meta, &NoDelay).unwrap();
    match outcome {
        MergeOutcome::Merged { new_head } => {
            let commit = meta.repo.find_commit(new_head).unwrap();
            assert_eq!(commit.parent_count(), 2);
        }
        _ => panic!("divergent submodule pins require a real merge"),
    }
    let _ = right_meta;
}
