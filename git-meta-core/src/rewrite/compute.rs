//! Classifying what a target meta-commit changes about each submodule
//! (`spec.md` §4.2 `computeChanges`, `containsUrlChanges`,
//! `resolveUrlsConflicts`).

use std::collections::BTreeMap;
use std::path::Path;

use git2::{Oid, Repository, Tree};
use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::status::types::SubmoduleDesc;
use crate::status::types::SubmoduleChange;
use crate::submodule::{self, SubmoduleEntry};

pub struct SimpleChange {
    pub path: String,
    pub desc: Option<SubmoduleDesc>,
}

pub struct NonTrivialChange {
    pub path: String,
    pub change: SubmoduleChange,
}

pub struct ComputedChanges {
    pub simple_changes: IndexMap<String, SimpleChange>,
    pub changes: IndexMap<String, NonTrivialChange>,
    pub meta_conflicts: Vec<String>,
    pub meta_file_changes: Vec<String>,
}

fn gitlink_at(tree: &Tree<'_>, path: &str) -> Result<Option<Oid>> {
    match tree.get_path(Path::new(path)) {
        Ok(entry) if entry.filemode() == 0o160000 => Ok(Some(entry.id())),
        Ok(_) => Ok(None),
        Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
        Err(e) => Err(Error::Git(e)),
    }
}

enum Classification {
    Simple(Option<Oid>),
    NonTrivial(SubmoduleChange),
}

/// Pure add/remove/fast-forward vs genuine three-way divergence, per
/// `spec.md` §4.2 step 2. Deletions and pure additions are always simple;
/// a change is a fast-forward iff `ancestor == old`.
fn classify(ancestor: Option<Oid>, old: Option<Oid>, new: Option<Oid>) -> Classification {
    match (ancestor, old, new) {
        (_, _, None) => Classification::Simple(None),
        (_, None, Some(_)) => Classification::Simple(new),
        (Some(a), Some(o), Some(_)) if a == o => Classification::Simple(new),
        (_, Some(o), Some(n)) => Classification::NonTrivial(SubmoduleChange {
            old_sha: o,
            new_sha: n,
            ancestor_sha: ancestor,
        }),
    }
}

fn name_and_url_for(
    path: &str,
    head_entries: &[SubmoduleEntry],
    target_entries: &[SubmoduleEntry],
) -> Result<(String, String)> {
    if let Some(entry) = submodule::find_by_path(target_entries, path) {
        return Ok((entry.name.clone(), entry.url.clone()));
    }
    if let Some(entry) = submodule::find_by_path(head_entries, path) {
        return Ok((entry.name.clone(), entry.url.clone()));
    }
    Err(Error::internal(format!(
        "gitlink at '{path}' changed but is declared in neither HEAD's nor the target's \
         .gitmodules"
    )))
}

/// `computeChanges(meta, trial_index, target_commit)`: classifies what a
/// cherry-picked `target` changes relative to `head`, treating `target`'s
/// own parent as the three-way ancestor (the linear-history assumption that
/// holds for cherry-pick and rebase).
pub fn compute_changes(
    repo: &Repository,
    trial_index: &git2::Index,
    head: Oid,
    target: Oid,
) -> Result<ComputedChanges> {
    let target_commit = repo.find_commit(target).map_err(Error::Git)?;
    let base = target_commit.parent(0).ok().map(|p| p.id());
    compute_changes_with_base(repo, trial_index, head, target, base)
}

/// `computeChanges` generalized with an explicit three-way ancestor, for
/// callers (merge) where the ancestor isn't simply `target`'s parent.
pub fn compute_changes_with_base(
    repo: &Repository,
    trial_index: &git2::Index,
    head: Oid,
    target: Oid,
    base: Option<Oid>,
) -> Result<ComputedChanges> {
    let head_commit = repo.find_commit(head).map_err(Error::Git)?;
    let target_commit = repo.find_commit(target).map_err(Error::Git)?;
    let head_tree = head_commit.tree().map_err(Error::Git)?;
    let target_tree = target_commit.tree().map_err(Error::Git)?;
    let base_tree = base
        .map(|oid| repo.find_commit(oid).and_then(|c| c.tree()))
        .transpose()
        .map_err(Error::Git)?;

    let head_entries = submodule::declared_at_tree(repo, &head_tree)?;
    let target_entries = submodule::declared_at_tree(repo, &target_tree)?;

    // `head` and `target` are assumed to differ only in submodule pointers
    // and `.gitmodules` — true of every commit this engine itself produces,
    // and the very invariant step 2 enforces by rejecting anything else as
    // `MetaFileChange`. Diffing the two trees directly (rather than walking
    // the trial index's changes relative to `head`) means that assumption
    // has to hold for *both* commits, not just `target`: a file present on
    // `head` but absent from `target` (e.g. `target` was built on top of an
    // older ancestor than `head`) shows up here as a deletion and is flagged
    // as a meta-file change too.
    let diff = repo
        .diff_tree_to_tree(Some(&head_tree), Some(&target_tree), None)
        .map_err(Error::Git)?;

    let conflicted_paths: std::collections::HashSet<String> = trial_index
        .conflicts()
        .map_err(Error::Git)?
        .filter_map(|c| c.ok())
        .filter_map(|c| {
            c.ancestor
                .or(c.our)
                .or(c.their)
                .map(|e| String::from_utf8_lossy(&e.path).to_string())
        })
        .collect();

    let mut simple_changes = IndexMap::new();
    let mut changes = IndexMap::new();
    let mut meta_conflicts = Vec::new();
    let mut meta_file_changes = Vec::new();

    for delta in diff.deltas() {
        let path = delta
            .new_file()
            .path()
            .or_else(|| delta.old_file().path())
            .and_then(|p| p.to_str())
            .ok_or_else(|| Error::internal("diff delta without a utf-8 path"))?
            .to_string();

        let is_submodule = delta.new_file().mode() == git2::FileMode::Commit
            || delta.old_file().mode() == git2::FileMode::Commit;

        if !is_submodule {
            if path == submodule::GITMODULES_PATH {
                continue;
            }
            if conflicted_paths.contains(&path) {
                meta_conflicts.push(path);
            } else {
                meta_file_changes.push(path);
            }
            continue;
        }

        let ancestor = base_tree
            .as_ref()
            .map(|t| gitlink_at(t, &path))
            .transpose()?
            .flatten();
        let old = gitlink_at(&head_tree, &path)?;
        let new = gitlink_at(&target_tree, &path)?;
        if old == new {
            continue;
        }
        let (name, url) = name_and_url_for(&path, &head_entries, &target_entries)?;

        match classify(ancestor, old, new) {
            Classification::Simple(sha) => {
                simple_changes.insert(
                    name,
                    SimpleChange {
                        path,
                        desc: sha.map(|sha| SubmoduleDesc { url, sha }),
                    },
                );
            }
            Classification::NonTrivial(change) => {
                changes.insert(name, NonTrivialChange { path, change });
            }
        }
    }

    Ok(ComputedChanges {
        simple_changes,
        changes,
        meta_conflicts,
        meta_file_changes,
    })
}

/// `containsUrlChanges(meta, head, base?)`: true iff any submodule's URL
/// differs between `base` (defaults to `head`'s sole parent) and `head`.
pub fn contains_url_changes(repo: &Repository, head: Oid, base: Option<Oid>) -> Result<bool> {
    let head_commit = repo.find_commit(head).map_err(Error::Git)?;
    let base_oid = match base {
        Some(oid) => Some(oid),
        None => head_commit.parent(0).ok().map(|p| p.id()),
    };
    let Some(base_oid) = base_oid else {
        return Ok(false);
    };
    let head_entries = submodule::declared_at_tree(repo, &head_commit.tree().map_err(Error::Git)?)?;
    let base_commit = repo.find_commit(base_oid).map_err(Error::Git)?;
    let base_entries = submodule::declared_at_tree(repo, &base_commit.tree().map_err(Error::Git)?)?;

    for head_entry in &head_entries {
        if let Some(base_entry) = submodule::find_by_name(&base_entries, &head_entry.name) {
            if base_entry.url != head_entry.url {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// First submodule name (if any) whose URL changed between `base` and
/// `head`, for building a precise `UrlChangeUnsupported` error.
pub fn first_url_change(
    repo: &Repository,
    head: Oid,
    base: Option<Oid>,
) -> Result<Option<String>> {
    let head_commit = repo.find_commit(head).map_err(Error::Git)?;
    let base_oid = match base {
        Some(oid) => Some(oid),
        None => head_commit.parent(0).ok().map(|p| p.id()),
    };
    let Some(base_oid) = base_oid else {
        return Ok(None);
    };
    let head_entries = submodule::declared_at_tree(repo, &head_commit.tree().map_err(Error::Git)?)?;
    let base_commit = repo.find_commit(base_oid).map_err(Error::Git)?;
    let base_entries = submodule::declared_at_tree(repo, &base_commit.tree().map_err(Error::Git)?)?;
    for head_entry in &head_entries {
        if let Some(base_entry) = submodule::find_by_name(&base_entries, &head_entry.name) {
            if base_entry.url != head_entry.url {
                return Ok(Some(head_entry.name.clone()));
            }
        }
    }
    Ok(None)
}

/// `resolveUrlsConflicts(ancestors, ours, theirs)` (`spec.md` §4.2).
pub fn resolve_urls_conflicts(
    ancestors: &BTreeMap<String, String>,
    ours: &BTreeMap<String, String>,
    theirs: &BTreeMap<String, String>,
) -> (BTreeMap<String, String>, Vec<String>) {
    let mut names: std::collections::BTreeSet<&String> = std::collections::BTreeSet::new();
    names.extend(ancestors.keys());
    names.extend(ours.keys());
    names.extend(theirs.keys());

    let mut resolved = BTreeMap::new();
    let mut conflicts = Vec::new();

    for name in names {
        let a = ancestors.get(name);
        match (ours.get(name), theirs.get(name)) {
            (Some(o), Some(t)) if o == t => {
                resolved.insert(name.clone(), o.clone());
            }
            (Some(o), Some(t)) if a == Some(o) => {
                resolved.insert(name.clone(), t.clone());
            }
            (Some(o), Some(t)) if a == Some(t) => {
                resolved.insert(name.clone(), o.clone());
            }
            (Some(_), Some(_)) => {
                conflicts.push(name.clone());
            }
            (Some(o), None) => {
                resolved.insert(name.clone(), o.clone());
            }
            (None, Some(t)) => {
                resolved.insert(name.clone(), t.clone());
            }
            (None, None) => {}
        }
    }

    (resolved, conflicts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn ours_only_change_wins() {
        let ancestors = map(&[("a", "base")]);
        let ours = map(&[("a", "changed")]);
        let theirs = map(&[("a", "base")]);
        let (resolved, conflicts) = resolve_urls_conflicts(&ancestors, &ours, &theirs);
        assert_eq!(resolved.get("a").unwrap(), "changed");
        assert!(conflicts.is_empty());
    }

    #[test]
    fn theirs_only_change_wins() {
        let ancestors = map(&[("a", "base")]);
        let ours = map(&[("a", "base")]);
        let theirs = map(&[("a", "changed")]);
        let (resolved, conflicts) = resolve_urls_conflicts(&ancestors, &ours, &theirs);
        assert_eq!(resolved.get("a").unwrap(), "changed");
        assert!(conflicts.is_empty());
    }

    #[test]
    fn same_change_on_both_sides_is_not_a_conflict() {
        let ancestors = map(&[("a", "base")]);
        let ours = map(&[("a", "changed")]);
        let theirs = map(&[("a", "changed")]);
        let (resolved, conflicts) = resolve_urls_conflicts(&ancestors, &ours, &theirs);
        assert_eq!(resolved.get("a").unwrap(), "changed");
        assert!(conflicts.is_empty());
    }

    #[test]
    fn divergent_change_is_a_conflict() {
        let ancestors = map(&[("a", "base")]);
        let ours = map(&[("a", "ours")]);
        let theirs = map(&[("a", "theirs")]);
        let (resolved, conflicts) = resolve_urls_conflicts(&ancestors, &ours, &theirs);
        assert!(!resolved.contains_key("a"));
        assert_eq!(conflicts, vec!["a".to_string()]);
    }
}
