//! Testable property 2 (`spec.md` §8): `getRelation` is `Same` iff equal,
//! `Ahead`/`Behind` are mutual inverses along ancestry, and `Unknown` holds
//! for a sha that is genuinely absent from the repo's object database — not
//! just a made-up hex string, but a real commit that only ever existed in an
//! entirely unrelated repository.

use git_meta_core::status::get_relation;
use git_meta_core::status::types::CommitRelation;
use git_meta_tests::{new_sub_repo, write_and_commit};

#[test]
fn ahead_and_behind_are_mutual_inverses_along_a_chain() {
    let repo = new_sub_repo("seed");
    let c1 = repo.repo.head().unwrap().target().unwrap();
    let c2 = write_and_commit(&repo.repo, "a.txt", "two", "c2");
    let c3 = write_and_commit(&repo.repo, "a.txt", "three", "c3");

    assert_eq!(get_relation(&repo.repo, Some(c1), Some(c1)), CommitRelation::Same);
    assert_eq!(get_relation(&repo.repo, Some(c1), Some(c3)), CommitRelation::Ahead);
    assert_eq!(get_relation(&repo.repo, Some(c3), Some(c1)), CommitRelation::Behind);
    assert_eq!(get_relation(&repo.repo, Some(c1), Some(c2)), CommitRelation::Ahead);
    assert_eq!(get_relation(&repo.repo, Some(c2), Some(c1)), CommitRelation::Behind);
    assert_eq!(get_relation(&repo.repo, None, None), CommitRelation::Same);
}

#[test]
fn unrelated_siblings_report_unrelated_not_unknown() {
    let repo = new_sub_repo("seed");
    let base = repo.repo.head().unwrap().target().unwrap();
    let left = write_and_commit(&repo.repo, "left.txt", "left", "left");
    git_meta_core::adapter::reset_hard(&repo.repo, base).unwrap();
    let right = write_and_commit(&repo.repo, "right.txt", "right", "right");

    assert_eq!(get_relation(&repo.repo, Some(left), Some(right)), CommitRelation::Unrelated);
    assert_eq!(get_relation(&repo.repo, Some(right), Some(left)), CommitRelation::Unrelated);
}

#[test]
fn a_foreign_but_real_sha_is_unknown() {
    let repo = new_sub_repo("seed");
    let local_head = repo.repo.head().unwrap().target().unwrap();

    // A real, valid commit that genuinely only exists in a second,
    // never-fetched-from repository.
    let stranger = new_sub_repo("unrelated repo entirely");
    let foreign = stranger.repo.head().unwrap().target().unwrap();

    assert_eq!(
        get_relation(&repo.repo, Some(local_head), Some(foreign)),
        CommitRelation::Unknown
    );
    assert_eq!(
        get_relation(&repo.repo, Some(foreign), Some(local_head)),
        CommitRelation::Unknown
    );
}
