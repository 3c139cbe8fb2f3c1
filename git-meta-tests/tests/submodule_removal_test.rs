//! Scenario S4 (`spec.md` §8): a commit that removes a declared submodule
//! entirely drops its gitlink and `.gitmodules` entry, and force-closes the
//! submodule's working tree if it happened to be open.

use git_meta_core::adapter;
use git_meta_core::opener::Opener;
use git_meta_core::rewrite::{self, retry::NoDelay};
use git_meta_core::submodule;
use git_meta_tests::{add_submodule, new_meta_repo, new_sub_repo, remove_submodule};

#[test]
fn cherry_pick_drops_a_removed_submodule_and_closes_its_working_tree() {
    let sub = new_sub_repo("seed");
    let x = sub.repo.head().unwrap().target().unwrap();

    let meta = new_meta_repo();
    let m1 = add_submodule(&meta.repo, "s", "s", &sub.url, x, "m1: add s");
    let m2 = remove_submodule(&meta.repo, "s", "s", "m2: remove s");
    adapter::reset_hard(&meta.repo, m1).unwrap();

    let sub_path = adapter::workdir(&meta.repo).join("s");
    let opener = Opener::new();
    let opened_path = git_meta_core::opener::open_submodule(&meta.repo, "s").unwrap();
    assert_eq!(opened_path, sub_path);
    assert!(sub_path.join("README.md").exists());

    let outcome = rewrite::cherry_pick(&meta.repo, &opener, &[m2], &NoDelay).unwrap();
    assert_eq!(outcome.commits_applied, 1);

    let new_head = meta.repo.find_commit(outcome.new_head).unwrap();
    let tree = new_head.tree().unwrap();
    assert!(tree.get_path(std::path::Path::new("s")).is_err(), "gitlink must be gone");

    let declared = submodule::declared_at_tree(&meta.repo, &tree).unwrap();
    assert!(declared.iter().all(|e| e.name != "s"), ".gitmodules entry must be gone");

    assert!(
        !sub_path.exists(),
        "the open submodule's working tree must be removed as part of applying the removal"
    );

    assert!(git_meta_core::sequencer::read(&meta.repo).is_none());
}
