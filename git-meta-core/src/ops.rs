//! L4/L5: the higher-level porcelain operations built on top of the
//! rewriter, status engine, and opener (`spec.md` §4.5): `pull`, `merge`,
//! `rebase`, `checkout`, `commit`.

use git2::{Oid, Repository};

use crate::adapter;
use crate::error::{Error, Result};
use crate::opener::Opener;
use crate::rewrite::compute;
use crate::rewrite::retry::FetchRetry;
use crate::rewrite::{self, RewriteOutcome};
use crate::status::{self, StatusOptions};

/// `rebase(meta, opener, upstream, [branch])`: replays the commits unique to
/// `branch` (default: current HEAD) since `upstream` on top of `upstream`
/// itself — implemented as `cherry_pick` over `(upstream, branch]`, per
/// `spec.md` §4.5 "rebase is cherry-pick in disguise".
pub fn rebase(
    repo: &Repository,
    opener: &Opener,
    upstream: Oid,
    branch: Option<Oid>,
    retry: &dyn FetchRetry,
) -> Result<RewriteOutcome> {
    let branch_head = match branch {
        Some(oid) => oid,
        None => adapter::head_commit(repo)?.ok_or(Error::NoHead)?,
    };
    if adapter::is_ancestor(repo, upstream, branch_head)? {
        // Already contains upstream; nothing to replay, fast-forward onto
        // upstream is a no-op identity rebase.
        adapter::reset_hard(repo, branch_head)?;
        return Ok(RewriteOutcome {
            new_head: branch_head,
            commits_applied: 0,
        });
    }
    let commits = adapter::commits_between(repo, upstream, branch_head)?;
    if commits.is_empty() {
        return Err(Error::BadRange {
            range: format!("{upstream}..{branch_head}"),
        });
    }
    adapter::reset_hard(repo, upstream)?;
    rewrite::cherry_pick(repo, opener, &commits, retry)
}

pub enum MergeOutcome {
    FastForward { new_head: Oid },
    Merged { new_head: Oid },
    UpToDate,
}

/// `merge(meta, opener, other)`: fast-forwards when possible, otherwise
/// performs a real three-way merge — a trial `merge_commits`, the same
/// submodule change classification `rewrite_commit` uses (with the actual
/// merge-base as the three-way ancestor), simple changes applied directly,
/// non-trivial changes picked via `pick_subs`, and a two-parent merge
/// commit.
pub fn merge(repo: &Repository, opener: &Opener, other: Oid, retry: &dyn FetchRetry) -> Result<MergeOutcome> {
    let head = adapter::head_commit(repo)?.ok_or(Error::NoHead)?;
    if head == other || adapter::is_ancestor(repo, other, head)? {
        return Ok(MergeOutcome::UpToDate);
    }
    if adapter::is_ancestor(repo, head, other)? {
        adapter::reset_hard(repo, other)?;
        return Ok(MergeOutcome::FastForward { new_head: other });
    }

    if let Some(name) = compute::first_url_change(repo, other, None)? {
        return Err(Error::UrlChangeUnsupported {
            commit: other.to_string(),
            name,
        });
    }

    let head_commit = adapter::find_commit(repo, head)?;
    let other_commit = adapter::find_commit(repo, other)?;
    let base = repo.merge_base(head, other).map_err(Error::Git)?;

    let mut trial_index = repo
        .merge_commits(&head_commit, &other_commit, None)
        .map_err(Error::Git)?;

    let computed =
        compute::compute_changes_with_base(repo, &trial_index, head, other, Some(base))?;

    if !computed.meta_conflicts.is_empty() {
        repo.set_index(&mut trial_index).map_err(Error::Git)?;
        let mut builder = git2::build::CheckoutBuilder::new();
        builder.force();
        builder.conflict_style_merge(true);
        repo.checkout_index(Some(&mut trial_index), Some(&mut builder))
            .map_err(Error::Git)?;
        return Err(Error::MetaConflict);
    }
    if let Some(path) = computed.meta_file_changes.first() {
        return Err(Error::MetaFileChange {
            commit: other.to_string(),
            path: path.clone(),
        });
    }

    crate::rewrite::apply::change_submodules(repo, opener, &computed.simple_changes)?;

    let pick_result = crate::rewrite::pick_subs(repo, opener, &computed.changes, retry)?;
    if let Some(conflict) = pick_result.conflicts.into_iter().next() {
        return Err(Error::SubmoduleConflict {
            name: conflict.name,
            sha: conflict.sha.to_string(),
        });
    }
    for picked in pick_result.picked.values() {
        crate::rewrite::apply::update_gitlink(repo, &picked.path, picked.final_sha)?;
    }

    let tree_id = adapter::write_index_tree(repo)?;
    let tree = adapter::find_tree(repo, tree_id)?;
    let sig = head_commit.committer();
    let message = format!("Merge commit '{other}'");
    let new_oid = adapter::create_commit(
        repo,
        Some("HEAD"),
        &sig,
        &sig,
        &message,
        &tree,
        &[&head_commit, &other_commit],
    )?;
    adapter::checkout_tree_force(repo, new_oid)?;
    Ok(MergeOutcome::Merged { new_head: new_oid })
}

/// `pull(meta, opener, remote, branch)`: fetches `branch` from `remote`,
/// then merges it into HEAD (`spec.md` §4.5 "pull is fetch-then-merge").
pub fn pull(
    repo: &Repository,
    opener: &Opener,
    remote: &str,
    branch: &str,
    retry: &dyn FetchRetry,
) -> Result<MergeOutcome> {
    let refspec = format!("refs/heads/{branch}:refs/remotes/{remote}/{branch}");
    adapter::fetch_refspec(repo, remote, &refspec)?;
    let fetched = adapter::resolve(repo, &format!("refs/remotes/{remote}/{branch}"))?;
    merge(repo, opener, fetched, retry)
}

/// `spec.md` §6 `checkout -c`: which submodules get a working tree
/// materialized or updated as part of the checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutSubmodules {
    /// Default: only already-open submodules are fast-forwarded; nothing new
    /// is opened.
    None,
    /// Open every submodule declared at the target commit.
    All,
    /// Open only the submodules whose pinned commit actually changes.
    Some,
    /// Synonym for `All` (`spec.md` §6 lists `create` as a distinct literal
    /// from `all`, but the original source left its exact distinction
    /// unspecified; §9 Open Questions instructs not to guess intent beyond
    /// what's written, so this workspace treats the two the same way a
    /// fresh checkout of an unopened path must be *created*).
    Create,
}

impl CheckoutSubmodules {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(CheckoutSubmodules::None),
            "all" => Some(CheckoutSubmodules::All),
            "some" => Some(CheckoutSubmodules::Some),
            "create" => Some(CheckoutSubmodules::Create),
            _ => None,
        }
    }
}

/// `checkout(meta, committish, create)`: moves HEAD (and, if `committish`
/// names a local branch, the branch ref) to the resolved commit, refusing to
/// clobber a dirty working tree. Per `create`, already-open submodules whose
/// pinned sha changes are always fetched-on-demand and fast-forwarded;
/// `All`/`Create` additionally open every submodule declared at the target,
/// `Some` opens only the ones the checkout actually touches.
pub fn checkout(
    repo: &Repository,
    opener: &Opener,
    committish: &str,
    create: CheckoutSubmodules,
) -> Result<Oid> {
    let current = status::get_repo_status(repo, &StatusOptions::default())?;
    if !current.is_clean() {
        return Err(Error::NotClean {
            detail: "checkout requires a clean working tree".to_string(),
        });
    }
    let head = adapter::head_commit(repo)?;
    let target = adapter::resolve(repo, committish)?;

    let workdir_root = adapter::workdir(repo);
    let target_tree = adapter::commit_tree(repo, target)?;
    let target_entries = crate::submodule::declared_at_tree(repo, &target_tree)?;
    let head_tree = head.map(|h| adapter::commit_tree(repo, h)).transpose()?;

    let local_branch = format!("refs/heads/{committish}");
    if repo.find_reference(&local_branch).is_ok() {
        repo.set_head(&local_branch).map_err(Error::Git)?;
    } else {
        adapter::set_head_detached(repo, target)?;
    }
    adapter::checkout_tree_force(repo, target)?;

    for entry in &target_entries {
        let new_sha = crate::submodule::commit_sha(repo, &target_tree, &entry.path)?;
        let Some(new_sha) = new_sha else { continue };
        let old_sha = head_tree
            .as_ref()
            .map(|t| crate::submodule::commit_sha(repo, t, &entry.path))
            .transpose()?
            .flatten();
        let changed = old_sha != Some(new_sha);
        let already_open = crate::submodule::is_open(&workdir_root, &entry.path);

        let should_update = already_open && changed;
        let should_open = !already_open
            && match create {
                CheckoutSubmodules::None => false,
                CheckoutSubmodules::All | CheckoutSubmodules::Create => true,
                CheckoutSubmodules::Some => changed,
            };

        if should_open {
            let sub_repo = crate::opener::open_submodule(repo, &entry.name)?;
            crate::opener::fetch_if_missing(&sub_repo, new_sha)?;
            adapter::set_head_detached(&sub_repo, new_sha)?;
            adapter::checkout_tree_force(&sub_repo, new_sha)?;
        } else if should_update {
            let sub_path = opener.path_for(repo, &entry.name)?;
            let sub_repo = adapter::open(&sub_path)?;
            crate::opener::fetch_if_missing(&sub_repo, new_sha)?;
            adapter::set_head_detached(&sub_repo, new_sha)?;
            adapter::checkout_tree_force(&sub_repo, new_sha)?;
        }
    }

    Ok(target)
}

fn stage_modified_tracked_files(repo: &Repository) -> Result<()> {
    let mut index = repo.index().map_err(Error::Git)?;
    index
        .update_all(["*"].iter(), None)
        .map_err(Error::Git)?;
    index.write().map_err(Error::Git)
}

/// `commit(meta, opener, message, all)`: refuses if any sub-repo is
/// inconsistent (`spec.md` §4.5); with `all`, stages modified tracked files
/// in the meta-repo and in every open sub-repo first; per open sub-repo with
/// staged changes, creates a sub-commit (reusing `message`) before staging
/// its updated pointer in the meta-index, then creates one meta-commit.
pub fn commit(repo: &Repository, opener: &Opener, message: &str, all: bool) -> Result<Oid> {
    let head = adapter::head_commit(repo)?;
    if head.is_some() {
        let current = status::get_repo_status(repo, &StatusOptions::default())?;
        status::ensure_consistent(&current)?;
        status::ensure_ready(&current)?;
    }

    if all {
        stage_modified_tracked_files(repo)?;
    }

    let workdir_root = adapter::workdir(repo);
    let entries = crate::submodule::declared_in_index(repo)?;
    for entry in &entries {
        if !crate::submodule::is_open(&workdir_root, &entry.path) {
            continue;
        }
        let sub_path = opener.path_for(repo, &entry.name)?;
        let sub_repo = adapter::open(&sub_path)?;
        if all {
            stage_modified_tracked_files(&sub_repo)?;
        }
        let sub_status = status::get_repo_status(&sub_repo, &StatusOptions::default())?;
        if sub_status.staged.is_empty() {
            continue;
        }
        let sub_head = adapter::head_commit(&sub_repo)?;
        let sub_parents: Vec<_> = match sub_head {
            Some(oid) => vec![adapter::find_commit(&sub_repo, oid)?],
            None => Vec::new(),
        };
        let sub_parent_refs: Vec<&git2::Commit<'_>> = sub_parents.iter().collect();
        let sub_tree_id = adapter::write_index_tree(&sub_repo)?;
        let sub_tree = adapter::find_tree(&sub_repo, sub_tree_id)?;
        let sub_sig = sub_repo.signature().map_err(Error::Git)?;
        let new_sub_oid = adapter::create_commit(
            &sub_repo,
            Some("HEAD"),
            &sub_sig,
            &sub_sig,
            message,
            &sub_tree,
            &sub_parent_refs,
        )?;
        crate::rewrite::apply::update_gitlink(repo, &entry.path, new_sub_oid)?;
    }

    let parents: Vec<_> = match head {
        Some(oid) => vec![adapter::find_commit(repo, oid)?],
        None => Vec::new(),
    };
    let parent_refs: Vec<&git2::Commit<'_>> = parents.iter().collect();
    let tree_id = adapter::write_index_tree(repo)?;
    let tree = adapter::find_tree(repo, tree_id)?;
    let sig = repo.signature().map_err(Error::Git)?;
    adapter::create_commit(repo, Some("HEAD"), &sig, &sig, message, &tree, &parent_refs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fixture_repo;

    #[test]
    fn checkout_unknown_ref_is_user_error() {
        let (_dir, repo, _head) = fixture_repo();
        let opener = Opener::new();
        let err = checkout(&repo, &opener, "refs/heads/does-not-exist", CheckoutSubmodules::None)
            .unwrap_err();
        assert!(matches!(err, Error::UnknownRef { .. }));
    }

    #[test]
    fn commit_with_nothing_staged_beyond_head_still_succeeds() {
        let (_dir, repo, head) = fixture_repo();
        let opener = Opener::new();
        let new_oid = commit(&repo, &opener, "empty commit", false).unwrap();
        let commit_obj = repo.find_commit(new_oid).unwrap();
        assert_eq!(commit_obj.parent_id(0).unwrap(), head);
    }
}
