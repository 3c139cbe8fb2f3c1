//! Shared fixture helpers for `git-meta-core`'s own unit tests.
//!
//! Integration-style, multi-repo scenarios live in the `git-meta-tests`
//! crate; these helpers are for the small, single-repo unit tests that sit
//! beside the code they exercise.

use git2::{Repository, Signature};
use tempfile::TempDir;

pub fn signature<'a>() -> Signature<'a> {
    Signature::now("Test User", "test@example.com").unwrap()
}

/// A fresh repo with a single commit on `master`/`main` (whatever git2's
/// default init branch is), returning the commit's `Oid` as HEAD.
pub fn fixture_repo() -> (TempDir, Repository, git2::Oid) {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();
    let oid = commit_all(&repo, "initial commit", &[]);
    (dir, repo, oid)
}

pub fn write_file(repo: &Repository, relative: &str, contents: &str) {
    let path = repo.workdir().unwrap().join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
    let mut index = repo.index().unwrap();
    index.add_path(std::path::Path::new(relative)).unwrap();
    index.write().unwrap();
}

pub fn commit_all<'repo>(
    repo: &'repo Repository,
    message: &str,
    parents: &[&git2::Commit<'_>],
) -> git2::Oid {
    let mut index = repo.index().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();
    let sig = signature();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, parents)
        .unwrap()
}

fn zero_entry(path: &str, mode: u32, id: git2::Oid) -> git2::IndexEntry {
    git2::IndexEntry {
        ctime: git2::IndexTime::new(0, 0),
        mtime: git2::IndexTime::new(0, 0),
        dev: 0,
        ino: 0,
        mode,
        uid: 0,
        gid: 0,
        file_size: 0,
        id,
        flags: 0,
        flags_extended: 0,
        path: path.as_bytes().to_vec(),
    }
}

/// Stages a submodule's `.gitmodules` entry and gitlink pointer (`sha` needs
/// no backing object — these unit tests never open the submodule, only
/// classify and replay its pointer; see `git-meta-tests` for fixtures that do
/// stand up a real sub-repo). Does not commit.
pub fn write_submodule_pointer(
    repo: &Repository,
    name: &str,
    path: &str,
    url: &str,
    sha: git2::Oid,
) {
    let mut entries = crate::submodule::declared_in_index(repo).unwrap();
    entries.retain(|e| e.name != name);
    entries.push(crate::submodule::SubmoduleEntry {
        name: name.to_string(),
        path: path.to_string(),
        url: url.to_string(),
    });
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    let bytes = crate::submodule::serialize(&entries);
    let blob_id = repo.blob(&bytes).unwrap();
    let mut index = repo.index().unwrap();
    index
        .add(&zero_entry(crate::submodule::GITMODULES_PATH, 0o100644, blob_id))
        .unwrap();
    index.add(&zero_entry(path, 0o160000, sha)).unwrap();
    index.write().unwrap();
}
