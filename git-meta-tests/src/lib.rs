//! Shared multi-repo fixture builders for `git-meta-tests`'s scenario and
//! property suites.
//!
//! Each test in `tests/` builds its own small constellation of on-disk
//! repositories (one meta-repo, zero or more "remote" sub-repos that act as
//! plain-path origins) rather than parsing an ASCII shorthand into
//! in-memory repositories — that shorthand parser is explicitly out of
//! scope (`spec.md` §1) and lives in the CLI's own test scaffolding, not
//! here.

use std::path::Path;

use git2::{IndexEntry, IndexTime, Oid, Repository, Signature};
use git_meta_core::submodule::{self, SubmoduleEntry};
use tempfile::TempDir;

pub fn sig<'a>() -> Signature<'a> {
    Signature::now("git-meta-tests", "git-meta-tests@example.com").unwrap()
}

pub fn init_repo(dir: &Path) -> Repository {
    Repository::init(dir).unwrap()
}

/// Writes `relpath` with `contents`, stages it, and commits on top of
/// whatever HEAD currently is (or as a root commit if there is none yet).
pub fn write_and_commit(repo: &Repository, relpath: &str, contents: &str, message: &str) -> Oid {
    let path = repo.workdir().unwrap().join(relpath);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, contents).unwrap();
    let mut index = repo.index().unwrap();
    index.add_path(Path::new(relpath)).unwrap();
    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();
    let parent = repo.head().ok().and_then(|h| h.target());
    let parents: Vec<_> = parent.map(|p| repo.find_commit(p).unwrap()).into_iter().collect();
    let parent_refs: Vec<&git2::Commit<'_>> = parents.iter().collect();
    let signature = sig();
    repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parent_refs)
        .unwrap()
}

/// Removes `relpath` and commits the removal.
pub fn remove_and_commit(repo: &Repository, relpath: &str, message: &str) -> Oid {
    std::fs::remove_file(repo.workdir().unwrap().join(relpath)).unwrap();
    let mut index = repo.index().unwrap();
    index.remove_path(Path::new(relpath)).unwrap();
    index.write().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();
    let parent = repo.head().unwrap().target().unwrap();
    let parent_commit = repo.find_commit(parent).unwrap();
    let signature = sig();
    repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &[&parent_commit])
        .unwrap()
}

/// A standalone repo playing the role of a submodule's origin: a plain
/// (non-bare) working directory whose absolute path doubles as its URL —
/// `git2` happily fetches from a local path the same as from a real remote.
pub struct SubFixture {
    pub dir: TempDir,
    pub repo: Repository,
    pub url: String,
}

pub fn new_sub_repo(readme_contents: &str) -> SubFixture {
    let dir = tempfile::tempdir().unwrap();
    let repo = init_repo(dir.path());
    write_and_commit(&repo, "README.md", readme_contents, "initial commit");
    let url = dir.path().to_string_lossy().to_string();
    SubFixture { dir, repo, url }
}

/// A bare repo playing the role of a push target: `git2::Remote::push`
/// refuses non-force-updates of the currently checked-out branch on a
/// non-bare repo, so push-ordering scenarios need a bare remote.
pub fn new_bare_repo() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    Repository::init_bare(dir.path()).unwrap();
    dir
}

pub struct MetaFixture {
    pub dir: TempDir,
    pub repo: Repository,
}

pub fn new_meta_repo() -> MetaFixture {
    let dir = tempfile::tempdir().unwrap();
    let repo = init_repo(dir.path());
    write_and_commit(&repo, "README.md", "meta repo\n", "initial commit");
    MetaFixture { dir, repo }
}

fn zero_entry(path: &str, mode: u32, id: Oid) -> IndexEntry {
    IndexEntry {
        ctime: IndexTime::new(0, 0),
        mtime: IndexTime::new(0, 0),
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

fn write_gitmodules_and_gitlink(
    meta: &Repository,
    entries: &[SubmoduleEntry],
    gitlink: Option<(&str, Oid)>,
) {
    let mut index = meta.index().unwrap();
    let bytes = submodule::serialize(entries);
    let blob_id = meta.blob(&bytes).unwrap();
    index
        .add(&zero_entry(submodule::GITMODULES_PATH, 0o100644, blob_id))
        .unwrap();
    if let Some((path, sha)) = gitlink {
        index.add(&zero_entry(path, 0o160000, sha)).unwrap();
    }
    index.write().unwrap();
}

/// Declares a brand-new submodule in the meta-repo's index and `.gitmodules`,
/// pinned to `sha`, then commits both in one step.
pub fn add_submodule(
    meta: &Repository,
    name: &str,
    path: &str,
    url: &str,
    sha: Oid,
    message: &str,
) -> Oid {
    let mut entries = submodule::declared_in_index(meta).unwrap();
    entries.retain(|e| e.name != name);
    entries.push(SubmoduleEntry {
        name: name.to_string(),
        path: path.to_string(),
        url: url.to_string(),
    });
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    write_gitmodules_and_gitlink(meta, &entries, Some((path, sha)));
    commit_index(meta, message)
}

/// Re-pins an already-declared submodule to a new sha (no `.gitmodules`
/// change), then commits.
pub fn point_submodule(meta: &Repository, path: &str, sha: Oid, message: &str) -> Oid {
    let mut index = meta.index().unwrap();
    index.add(&zero_entry(path, 0o160000, sha)).unwrap();
    index.write().unwrap();
    commit_index(meta, message)
}

/// Changes a declared submodule's origin URL in `.gitmodules` (its gitlink
/// is untouched), then commits — used to build the URL-change-rejected
/// scenario.
pub fn repoint_submodule_url(meta: &Repository, name: &str, new_url: &str, message: &str) -> Oid {
    let mut entries = submodule::declared_in_index(meta).unwrap();
    for entry in &mut entries {
        if entry.name == name {
            entry.url = new_url.to_string();
        }
    }
    write_gitmodules_and_gitlink(meta, &entries, None);
    commit_index(meta, message)
}

/// Removes a declared submodule's gitlink and `.gitmodules` section, then
/// commits.
pub fn remove_submodule(meta: &Repository, name: &str, path: &str, message: &str) -> Oid {
    let mut entries = submodule::declared_in_index(meta).unwrap();
    entries.retain(|e| e.name != name);
    let mut index = meta.index().unwrap();
    index.remove_path(Path::new(path)).unwrap();
    index.write().unwrap();
    write_gitmodules_and_gitlink(meta, &entries, None);
    commit_index(meta, message)
}

fn commit_index(repo: &Repository, message: &str) -> Oid {
    let mut index = repo.index().unwrap();
    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();
    let head = repo.head().unwrap().target().unwrap();
    let parent = repo.find_commit(head).unwrap();
    let signature = sig();
    repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &[&parent])
        .unwrap()
}
