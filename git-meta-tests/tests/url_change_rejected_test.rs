//! Scenario S3 (`spec.md` §8): a commit that changes a declared submodule's
//! origin URL relative to its own parent must be rejected outright rather
//! than merged, leaving HEAD and the live index untouched. `abort` must
//! still be able to clean up the sequencer left behind by the failed
//! attempt.

use git_meta_core::opener::Opener;
use git_meta_core::rewrite::{self, retry::NoDelay};
use git_meta_core::Error;
use git_meta_tests::{add_submodule, new_meta_repo, new_sub_repo, repoint_submodule_url};

#[test]
fn cherry_pick_rejects_a_submodule_url_change() {
    let sub = new_sub_repo("seed");
    let x = sub.repo.head().unwrap().target().unwrap();
    let other_sub = new_sub_repo("other origin");

    let meta = new_meta_repo();
    let m1 = add_submodule(&meta.repo, "s", "s", &sub.url, x, "m1: add s");
    let m2 = repoint_submodule_url(&meta.repo, "s", &other_sub.url, "m2: change s's url");

    let head_before = meta.repo.head().unwrap().target().unwrap();
    assert_eq!(head_before, m1);

    let opener = Opener::new();
    let err = rewrite::cherry_pick(&meta.repo, &opener, &[m2], &NoDelay).unwrap_err();
    match err {
        Error::UrlChangeUnsupported { commit, name } => {
            assert_eq!(commit, m2.to_string());
            assert_eq!(name, "s");
        }
        other => panic!("expected a rejected url change, got {other:?}"),
    }

    assert_eq!(
        meta.repo.head().unwrap().target().unwrap(),
        head_before,
        "a rejected commit must not move HEAD"
    );
    assert!(!meta.repo.index().unwrap().has_conflicts());

    let state = git_meta_core::sequencer::read(&meta.repo)
        .expect("the sequencer recorded the attempt before the rejection");
    assert_eq!(state.current_commit, 0);
    assert_eq!(state.commits, vec![m2]);

    rewrite::abort(&meta.repo).unwrap();
    assert!(git_meta_core::sequencer::read(&meta.repo).is_none());
    assert_eq!(meta.repo.head().unwrap().target().unwrap(), head_before);
}
