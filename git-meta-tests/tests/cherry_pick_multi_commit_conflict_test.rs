//! Scenario S2 / property 5 (`spec.md` §8): a three-commit cherry-pick where
//! the middle commit's submodule pick conflicts against content the user
//! already has open in that submodule. The sequencer must record the
//! conflicting commit's 0-based index, and `continue_` must finish the rest
//! of the range once the user stages a resolution.

use std::path::Path;

use git_meta_core::adapter;
use git_meta_core::opener::{self, Opener};
use git_meta_core::rewrite::{self, retry::NoDelay};
use git_meta_core::sequencer::SequencerKind;
use git_meta_core::Error;
use git_meta_tests::{add_submodule, new_meta_repo, new_sub_repo, point_submodule, write_and_commit};

fn two_line_file(a: &str, b: &str) -> String {
    format!("A: {a}\nB: {b}\n")
}

#[test]
fn continue_finishes_a_conflicting_multi_commit_pick() {
    let sub = new_sub_repo("seed");
    let s_base = write_and_commit(&sub.repo, "a.txt", &two_line_file("base", "base"), "s_base");
    // The user's already-open local edit: touches line B only.
    let s_local = write_and_commit(&sub.repo, "a.txt", &two_line_file("base", "LOCAL"), "s_local");
    // The chain the meta-commits being picked will replay: m4 touches A,
    // m5 touches B (conflicting with the local B edit), m6 only adds a new
    // file and leaves a.txt alone (clean no matter how B's conflict resolves).
    adapter::reset_hard(&sub.repo, s_base).unwrap();
    let s4 = write_and_commit(&sub.repo, "a.txt", &two_line_file("FOUR", "base"), "s4");
    let s5 = write_and_commit(&sub.repo, "a.txt", &two_line_file("FOUR", "FIVE"), "s5");
    let s6 = write_and_commit(&sub.repo, "b.txt", "six\n", "s6");

    let meta = new_meta_repo();
    let m3 = add_submodule(&meta.repo, "s", "s", &sub.url, s_base, "m3: s=s_base");
    let m4 = point_submodule(&meta.repo, "s", s4, "m4: s=s4");
    let m5 = point_submodule(&meta.repo, "s", s5, "m5: s=s5");
    let m6 = point_submodule(&meta.repo, "s", s6, "m6: s=s6");

    // The meta-repo's actual current history is a sibling branch off m3 that
    // already carries the user's local submodule edit.
    adapter::reset_hard(&meta.repo, m3).unwrap();
    let m3_local = point_submodule(&meta.repo, "s", s_local, "m3_local: s=s_local");
    assert_eq!(meta.repo.head().unwrap().target().unwrap(), m3_local);

    opener::open_submodule(&meta.repo, "s").unwrap();

    let opener = Opener::new();
    let err = rewrite::cherry_pick(&meta.repo, &opener, &[m4, m5, m6], &NoDelay).unwrap_err();
    match err {
        Error::SubmoduleConflict { name, sha } => {
            assert_eq!(name, "s");
            assert_eq!(sha, s5.to_string());
        }
        other => panic!("expected a submodule conflict, got {other:?}"),
    }

    let state = git_meta_core::sequencer::read(&meta.repo).expect("sequencer must be persisted");
    assert_eq!(state.kind, SequencerKind::CherryPick);
    assert_eq!(state.current_commit, 1);
    assert_eq!(state.commits, vec![m4, m5, m6]);

    // Resolve the conflict directly in the open submodule's working tree.
    let sub_path = adapter::workdir(&meta.repo).join("s");
    let sub_repo = adapter::open(&sub_path).unwrap();
    std::fs::write(sub_path.join("a.txt"), two_line_file("FOUR", "RESOLVED")).unwrap();
    let mut sub_index = sub_repo.index().unwrap();
    sub_index.add_path(Path::new("a.txt")).unwrap();
    sub_index.write().unwrap();
    assert!(!sub_index.has_conflicts());

    let outcome = rewrite::continue_(&meta.repo, &opener, &NoDelay).unwrap();
    assert!(git_meta_core::sequencer::read(&meta.repo).is_none());

    let new_head = meta.repo.find_commit(outcome.new_head).unwrap();
    let mut count = 0;
    let mut cursor = new_head.id();
    while cursor != m3_local {
        let c = meta.repo.find_commit(cursor).unwrap();
        count += 1;
        cursor = c.parent_id(0).unwrap();
    }
    assert_eq!(count, 3, "all three picked commits were rewritten on top of the local branch");

    let final_sub_path = adapter::workdir(&meta.repo).join("s");
    let final_sub_repo = adapter::open(&final_sub_path).unwrap();
    let sub_head = final_sub_repo.head().unwrap().target().unwrap();
    let sub_head_commit = final_sub_repo.find_commit(sub_head).unwrap();
    let tree = sub_head_commit.tree().unwrap();
    let a_blob = tree
        .get_path(Path::new("a.txt"))
        .unwrap()
        .to_object(&final_sub_repo)
        .unwrap()
        .peel_to_blob()
        .unwrap();
    assert_eq!(a_blob.content(), two_line_file("FOUR", "RESOLVED").as_bytes());
    assert!(tree.get_path(Path::new("b.txt")).is_ok(), "m6's new file made it into the final pick");
}
