//! Scenario S5 / testable property 7 (`spec.md` §8): closing a dirty open
//! submodule is refused unless forced, and closing an already-closed
//! submodule is a harmless no-op.

use git_meta_core::error::Error;
use git_meta_core::opener::{self};
use git_meta_core::submodule;
use git_meta_tests::{add_submodule, new_meta_repo, new_sub_repo};

#[test]
fn close_refuses_a_dirty_submodule_unless_forced() {
    let sub = new_sub_repo("seed");
    let x = sub.repo.head().unwrap().target().unwrap();

    let meta = new_meta_repo();
    add_submodule(&meta.repo, "s", "s", &sub.url, x, "m1: add s");

    let sub_repo = opener::open_submodule(&meta.repo, "s").unwrap();
    let sub_path = git_meta_core::adapter::workdir(&sub_repo);
    std::fs::write(sub_path.join("untracked.txt"), "dirty\n").unwrap();

    let workdir_root = git_meta_core::adapter::workdir(&meta.repo);
    assert!(submodule::is_open(&workdir_root, "s"));

    let err = opener::close_submodules(&meta.repo, &["s".to_string()], false).unwrap_err();
    assert!(matches!(err, Error::NotClean { .. }));
    assert!(sub_path.exists(), "a refused close must not touch the working tree");
    assert!(submodule::is_open(&workdir_root, "s"));

    opener::close_submodules(&meta.repo, &["s".to_string()], true).unwrap();
    assert!(!sub_path.exists());
    assert!(!submodule::is_open(&workdir_root, "s"));

    // Closing an already-closed submodule is idempotent.
    opener::close_submodules(&meta.repo, &["s".to_string()], false).unwrap();
    assert!(!sub_path.exists());
}
