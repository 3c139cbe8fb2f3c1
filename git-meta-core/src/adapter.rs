//! L0: a thin, typed surface over `git2`.
//!
//! Higher layers call through here instead of touching `git2` directly so
//! that the handful of operations the rest of the engine actually needs
//! (open, index, refs/commits/trees, history walk, ancestry, fetch, push,
//! reset, commit) have one place that knows the `git2` call shapes.

use std::path::{Path, PathBuf};

use git2::{Commit, Oid, Repository, Signature, Sort, Tree};

use crate::error::{Error, Result};

pub fn open(path: &Path) -> Result<Repository> {
    Repository::discover(path).map_err(|_| Error::NotARepo {
        path: path.to_path_buf(),
    })
}

pub fn workdir(repo: &Repository) -> PathBuf {
    repo.workdir()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| repo.path().to_path_buf())
}

pub fn head_commit(repo: &Repository) -> Result<Option<Oid>> {
    match repo.head() {
        Ok(head) => Ok(head.target()),
        Err(e) if e.code() == git2::ErrorCode::UnbornBranch => Ok(None),
        Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
        Err(e) => Err(Error::Git(e)),
    }
}

pub fn current_branch(repo: &Repository) -> Result<Option<String>> {
    match repo.head() {
        Ok(head) if head.is_branch() => Ok(head.shorthand().map(str::to_string)),
        Ok(_) => Ok(None),
        Err(e) if e.code() == git2::ErrorCode::UnbornBranch => {
            // HEAD points at an unborn branch; still "on" a named branch.
            Ok(current_branch_from_symbolic_ref(repo))
        }
        Err(e) => Err(Error::Git(e)),
    }
}

fn current_branch_from_symbolic_ref(repo: &Repository) -> Option<String> {
    let reference = repo.find_reference("HEAD").ok()?;
    let target = reference.symbolic_target()?;
    target
        .strip_prefix("refs/heads/")
        .map(str::to_string)
        .or_else(|| Some(target.to_string()))
}

pub fn find_commit<'repo>(repo: &'repo Repository, oid: Oid) -> Result<Commit<'repo>> {
    repo.find_commit(oid).map_err(Error::Git)
}

pub fn commit_tree<'repo>(repo: &'repo Repository, oid: Oid) -> Result<Tree<'repo>> {
    find_commit(repo, oid)?.tree().map_err(Error::Git)
}

pub fn resolve(repo: &Repository, committish: &str) -> Result<Oid> {
    repo.revparse_single(committish)
        .map_err(|_| Error::UnknownRef {
            reference: committish.to_string(),
        })?
        .peel_to_commit()
        .map(|c| c.id())
        .map_err(|_| Error::UnknownRef {
            reference: committish.to_string(),
        })
}

/// True iff `oid` can be resolved in the local object database (no network).
pub fn is_locally_reachable(repo: &Repository, oid: Oid) -> bool {
    repo.find_commit(oid).is_ok()
}

/// `ancestor` reachable from `descendant` by walking parent links.
pub fn is_ancestor(repo: &Repository, ancestor: Oid, descendant: Oid) -> Result<bool> {
    if ancestor == descendant {
        return Ok(true);
    }
    repo.graph_descendant_of(descendant, ancestor)
        .map_err(Error::Git)
}

/// Topological, oldest-first walk of `(from, to]` — matches the `(ancestor,
/// new]` ranges the rewriter needs when replaying submodule commits.
pub fn commits_between(repo: &Repository, from: Oid, to: Oid) -> Result<Vec<Oid>> {
    let mut walk = repo.revwalk().map_err(Error::Git)?;
    walk.set_sorting(Sort::REVERSE | Sort::TOPOLOGICAL)
        .map_err(Error::Git)?;
    walk.push(to).map_err(Error::Git)?;
    walk.hide(from).map_err(Error::Git)?;
    walk.map(|r| r.map_err(Error::Git)).collect()
}

pub fn fetch_oid(repo: &Repository, remote_name: &str, oid: Oid) -> Result<()> {
    let mut remote = repo.find_remote(remote_name).map_err(|_| Error::RemoteMissing {
        remote: remote_name.to_string(),
    })?;
    let refspec = format!("{oid}");
    remote
        .fetch(&[refspec.as_str()], None, None)
        .map_err(Error::Git)
}

pub fn fetch_refspec(repo: &Repository, remote_name: &str, refspec: &str) -> Result<()> {
    let mut remote = repo.find_remote(remote_name).map_err(|_| Error::RemoteMissing {
        remote: remote_name.to_string(),
    })?;
    remote.fetch(&[refspec], None, None).map_err(Error::Git)
}

pub fn push_refspec(repo: &Repository, remote_name: &str, refspec: &str) -> Result<()> {
    let mut remote = repo.find_remote(remote_name).map_err(|_| Error::RemoteMissing {
        remote: remote_name.to_string(),
    })?;
    remote.push(&[refspec], None).map_err(Error::Git)
}

pub fn reset_hard(repo: &Repository, oid: Oid) -> Result<()> {
    let object = repo.find_object(oid, None).map_err(Error::Git)?;
    repo.reset(&object, git2::ResetType::Hard, None)
        .map_err(Error::Git)
}

pub fn set_head_detached(repo: &Repository, oid: Oid) -> Result<()> {
    repo.set_head_detached(oid).map_err(Error::Git)
}

pub fn checkout_tree_force(repo: &Repository, oid: Oid) -> Result<()> {
    let object = repo.find_object(oid, None).map_err(Error::Git)?;
    let mut builder = git2::build::CheckoutBuilder::new();
    builder.force();
    repo.checkout_tree(&object, Some(&mut builder))
        .map_err(Error::Git)
}

pub fn fast_forward_branch(repo: &Repository, branch_name: &str, oid: Oid) -> Result<()> {
    let refname = format!("refs/heads/{branch_name}");
    repo.reference(&refname, oid, true, "git-meta: fast-forward")
        .map_err(Error::Git)?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn create_commit(
    repo: &Repository,
    update_ref: Option<&str>,
    author: &Signature<'_>,
    committer: &Signature<'_>,
    message: &str,
    tree: &Tree<'_>,
    parents: &[&Commit<'_>],
) -> Result<Oid> {
    repo.commit(update_ref, author, committer, message, tree, parents)
        .map_err(Error::Git)
}

pub fn find_tree<'repo>(repo: &'repo Repository, oid: Oid) -> Result<Tree<'repo>> {
    repo.find_tree(oid).map_err(Error::Git)
}

pub fn write_index_tree(repo: &Repository) -> Result<Oid> {
    let mut index = repo.index().map_err(Error::Git)?;
    index.write_tree().map_err(Error::Git)
}
