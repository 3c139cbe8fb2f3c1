//! Applying the simple (non-conflicting) half of a rewrite's submodule
//! changes to the live meta-index and working tree (`spec.md` §4.2
//! `changeSubmodules`): additions, removals, and fast-forwards that don't
//! need a pick loop.

use std::path::Path;

use git2::{IndexEntry, IndexTime, Oid, Repository};
use indexmap::IndexMap;

use crate::adapter;
use crate::error::{Error, Result};
use crate::opener::Opener;
use crate::rewrite::compute::SimpleChange;
use crate::submodule::{self, SubmoduleEntry};

const GITLINK_MODE: u32 = 0o160000;
const BLOB_MODE: u32 = 0o100644;

fn zero_index_entry(path: &str, mode: u32, id: Oid) -> IndexEntry {
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

fn write_gitmodules(repo: &Repository, entries: &[SubmoduleEntry]) -> Result<()> {
    let bytes = submodule::serialize(entries);
    let mut index = repo.index().map_err(Error::Git)?;
    if bytes.is_empty() {
        let _ = index.remove_path(Path::new(submodule::GITMODULES_PATH));
    } else {
        let blob_id = repo.blob(&bytes).map_err(Error::Git)?;
        index
            .add(&zero_index_entry(submodule::GITMODULES_PATH, BLOB_MODE, blob_id))
            .map_err(Error::Git)?;
    }
    index.write().map_err(Error::Git)
}

fn current_gitmodules_entries(repo: &Repository) -> Result<Vec<SubmoduleEntry>> {
    submodule::declared_in_index(repo)
}

/// Brings an already-open submodule's working tree up to a new pinned sha,
/// fetching it on demand first.
fn fast_forward_open_submodule(
    repo: &Repository,
    opener: &Opener,
    name: &str,
    sha: Oid,
) -> Result<()> {
    let path = opener.path_for(repo, name)?;
    let sub_repo = adapter::open(&path)?;
    crate::opener::fetch_if_missing(&sub_repo, sha)?;
    adapter::set_head_detached(&sub_repo, sha)?;
    adapter::checkout_tree_force(&sub_repo, sha)
}

/// `changeSubmodules(meta, simpleChanges)`: stages each add/remove/
/// fast-forward in the live index and, for already-open submodules, brings
/// the working tree forward to match.
pub fn change_submodules(
    repo: &Repository,
    opener: &Opener,
    simple_changes: &IndexMap<String, SimpleChange>,
) -> Result<()> {
    if simple_changes.is_empty() {
        return Ok(());
    }
    let workdir_root = adapter::workdir(repo);
    let mut entries = current_gitmodules_entries(repo)?;
    let mut index = repo.index().map_err(Error::Git)?;

    for (name, change) in simple_changes {
        match &change.desc {
            None => {
                let _ = index.remove_path(Path::new(&change.path));
                entries.retain(|e| e.name != *name);
                if submodule::is_open(&workdir_root, &change.path) {
                    crate::opener::close_submodules(repo, std::slice::from_ref(name), true)?;
                    opener.forget(name);
                }
            }
            Some(desc) => {
                index
                    .add(&zero_index_entry(&change.path, GITLINK_MODE, desc.sha))
                    .map_err(Error::Git)?;
                entries.retain(|e| e.name != *name);
                entries.push(SubmoduleEntry {
                    name: name.clone(),
                    path: change.path.clone(),
                    url: desc.url.clone(),
                });
                if submodule::is_open(&workdir_root, &change.path) {
                    fast_forward_open_submodule(repo, opener, name, desc.sha)?;
                }
            }
        }
    }
    index.write().map_err(Error::Git)?;
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    write_gitmodules(repo, &entries)
}

/// Points the index's gitlink for `name` at `new_sha`, once its pick loop has
/// produced a final replayed commit.
pub fn update_gitlink(repo: &Repository, path: &str, new_sha: Oid) -> Result<()> {
    let mut index = repo.index().map_err(Error::Git)?;
    index
        .add(&zero_index_entry(path, GITLINK_MODE, new_sha))
        .map_err(Error::Git)?;
    index.write().map_err(Error::Git)
}
