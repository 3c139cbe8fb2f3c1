//! L3: submodule open/close lifecycle (`spec.md` §4.3).

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use git2::{Repository, RepositoryInitOptions};

use crate::adapter;
use crate::error::{Error, Result};
use crate::status::{self, StatusOptions};
use crate::submodule::{self, SubmoduleEntry};

/// Resolves a (possibly relative) submodule URL against the meta-repo's
/// `origin`, the way `git submodule` does.
pub fn resolve_url(repo: &Repository, url: &str) -> Result<String> {
    if !(url.starts_with("./") || url.starts_with("../")) {
        return Ok(url.to_string());
    }
    let origin = repo
        .find_remote("origin")
        .map_err(|_| Error::RemoteMissing {
            remote: "origin".to_string(),
        })?;
    let origin_url = origin
        .url()
        .ok_or_else(|| Error::internal("origin remote has no URL"))?;
    Ok(join_relative_url(origin_url, url))
}

fn join_relative_url(base: &str, relative: &str) -> String {
    let mut base = base.trim_end_matches('/').to_string();
    let mut rest = relative;
    while let Some(stripped) = rest.strip_prefix("../") {
        if let Some(idx) = base.rfind('/') {
            base.truncate(idx);
        }
        rest = stripped;
    }
    let rest = rest.strip_prefix("./").unwrap_or(rest);
    format!("{base}/{rest}")
}

/// Opens `name`: resolves `(url, sha)` from the index, creates a nested
/// repository at the configured path, configures `origin`, fetches `sha` as a
/// direct object (not a branch), and checks it out detached. Rolls back the
/// working tree on any failure.
pub fn open_submodule(repo: &Repository, name: &str) -> Result<Repository> {
    let entries = submodule::declared_in_index(repo)?;
    let entry = submodule::find_by_name(&entries, name)
        .cloned()
        .ok_or_else(|| Error::Misconfigured {
            name: name.to_string(),
            detail: "no such submodule in the index".to_string(),
        })?;
    let sha = submodule::index_sha(repo, &entry.path)?.ok_or_else(|| Error::Misconfigured {
        name: name.to_string(),
        detail: "declared but missing an index entry".to_string(),
    })?;

    let workdir_root = adapter::workdir(repo);
    let sub_path = workdir_root.join(&entry.path);
    let resolved_url = resolve_url(repo, &entry.url)?;

    match open_submodule_at(&sub_path, &resolved_url, sha) {
        Ok(sub_repo) => Ok(sub_repo),
        Err(err) => {
            let _ = std::fs::remove_dir_all(&sub_path);
            Err(err)
        }
    }
}

fn open_submodule_at(sub_path: &Path, url: &str, sha: git2::Oid) -> Result<Repository> {
    let mut init_opts = RepositoryInitOptions::new();
    init_opts.no_reinit(true);
    let sub_repo = Repository::init_opts(sub_path, &init_opts).map_err(Error::Git)?;
    sub_repo
        .remote("origin", url)
        .map_err(Error::Git)?;
    adapter::fetch_oid(&sub_repo, "origin", sha)?;
    adapter::set_head_detached(&sub_repo, sha)?;
    adapter::checkout_tree_force(&sub_repo, sha)?;
    Ok(sub_repo)
}

/// Fetch `sha` into an already-open submodule, on demand, iff it isn't
/// already locally reachable.
pub fn fetch_if_missing(sub_repo: &Repository, sha: git2::Oid) -> Result<()> {
    if adapter::is_locally_reachable(sub_repo, sha) {
        return Ok(());
    }
    adapter::fetch_oid(sub_repo, "origin", sha)
}

/// Closes the named submodules. Skips (recording an error) any open and
/// dirty submodule unless `force`. Deinitializes the rest: removes the
/// working tree and local config section, preserving the index pointer.
/// Invokes `post-close-submodule` with the names actually closed.
pub fn close_submodules(repo: &Repository, names: &[String], force: bool) -> Result<()> {
    let workdir_root = adapter::workdir(repo);
    let mut closed = Vec::new();
    let mut not_clean = Vec::new();

    for name in names {
        let entries = submodule::declared_in_index(repo)?;
        let Some(entry) = submodule::find_by_name(&entries, name) else {
            continue;
        };
        if !submodule::is_open(&workdir_root, &entry.path) {
            continue;
        }
        if !force && !is_submodule_clean(&workdir_root, entry)? {
            not_clean.push(name.clone());
            continue;
        }
        deinit_one(&workdir_root, entry)?;
        closed.push(name.clone());
    }

    if !closed.is_empty() {
        run_post_close_hook(repo, &closed);
    }

    if !not_clean.is_empty() {
        return Err(Error::NotClean {
            detail: format!("submodule(s) not clean: {}", not_clean.join(", ")),
        });
    }
    Ok(())
}

fn is_submodule_clean(workdir_root: &Path, entry: &SubmoduleEntry) -> Result<bool> {
    let sub_path = workdir_root.join(&entry.path);
    let sub_repo = adapter::open(&sub_path)?;
    let status = status::get_repo_status(&sub_repo, &StatusOptions::default())?;
    Ok(status.is_clean())
}

fn deinit_one(workdir_root: &Path, entry: &SubmoduleEntry) -> Result<()> {
    let sub_path = workdir_root.join(&entry.path);
    std::fs::remove_dir_all(&sub_path).map_err(|source| Error::Io {
        path: sub_path,
        source,
    })?;
    Ok(())
}

fn run_post_close_hook(repo: &Repository, closed: &[String]) {
    let hook_path = repo.path().join("hooks").join("post-close-submodule");
    if !hook_path.is_file() {
        return;
    }
    match std::process::Command::new(&hook_path).args(closed).status() {
        Ok(status) if !status.success() => {
            eprintln!("post-close-submodule hook exited with {status}");
        }
        Err(err) => eprintln!("post-close-submodule hook failed to run: {err}"),
        Ok(_) => {}
    }
}

/// Caches opened sub-repos for the duration of one higher-level operation so
/// repeated access during `rewrite_commit` doesn't reopen or refetch
/// (`spec.md` §4.3 "Opener"). Its lifetime ends with the command; dropping it
/// does not close the on-disk working trees.
pub struct Opener {
    cache: RefCell<HashMap<String, Repository>>,
}

impl Opener {
    pub fn new() -> Self {
        Opener {
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Returns the path to an open (or newly opened) submodule, caching the
    /// handle. `git2::Repository` isn't `Sync`, so callers re-open by path
    /// from the cached path rather than sharing a live handle across the
    /// cache boundary; this keeps `Opener` usable from the single-threaded
    /// borrow-checked call sites in `rewrite`.
    pub fn path_for(&self, repo: &Repository, name: &str) -> Result<PathBuf> {
        {
            let cache = self.cache.borrow();
            if let Some(sub_repo) = cache.get(name) {
                return Ok(adapter::workdir(sub_repo));
            }
        }
        let workdir_root = adapter::workdir(repo);
        let entries = submodule::declared_in_index(repo)?;
        let entry = submodule::find_by_name(&entries, name)
            .cloned()
            .ok_or_else(|| Error::Misconfigured {
                name: name.to_string(),
                detail: "no such submodule in the index".to_string(),
            })?;
        let sub_repo = if submodule::is_open(&workdir_root, &entry.path) {
            adapter::open(&workdir_root.join(&entry.path))?
        } else {
            open_submodule(repo, name)?
        };
        let path = adapter::workdir(&sub_repo);
        self.cache.borrow_mut().insert(name.to_string(), sub_repo);
        Ok(path)
    }

    pub fn forget(&self, name: &str) {
        self.cache.borrow_mut().remove(name);
    }
}

impl Default for Opener {
    fn default() -> Self {
        Self::new()
    }
}
