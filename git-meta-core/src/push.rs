//! L4: push orchestration via synthetic meta-refs (`spec.md` §4.4).
//!
//! Every submodule pinned at HEAD gets its commit pushed to a
//! `refs/commits/<sha>` ref before the meta-repo's own ref moves, so a clone
//! of the meta-repo can always find the submodule history it's pinned to —
//! even along a branch nobody in the sub-repo ever pushed. All sub-pushes
//! run through the same bounded work queue `status` and `opener` use
//! (`spec.md` §5); any single sub-push failure aborts the whole push before
//! the meta-repo ref is touched.

use git2::{Oid, Repository};

use crate::adapter;
use crate::error::{Error, Result};
use crate::opener::Opener;
use crate::parallel;
use crate::submodule;

fn synthetic_ref_name(sha: Oid) -> String {
    format!("refs/commits/{sha}")
}

fn push_synthetic_ref(sub_repo: &Repository, sha: Oid, remote: &str) -> Result<()> {
    let refname = synthetic_ref_name(sha);
    sub_repo
        .reference(&refname, sha, true, "git-meta: synthetic meta-ref")
        .map_err(Error::Git)?;
    let refspec = format!("{refname}:{refname}");
    adapter::push_refspec(sub_repo, remote, &refspec)
}

struct PinnedSubmodule {
    name: String,
    path: std::path::PathBuf,
    sha: Oid,
}

pub struct PushOutcome {
    pub submodules_pushed: Vec<String>,
    pub meta_ref: String,
}

/// `push(meta, opener, remote, refspec)`: pushes every submodule pinned at
/// HEAD, then the meta-repo's own `refspec`. Submodule pushes run
/// concurrently; the opener is consulted single-threaded first (it isn't
/// `Sync` — see `opener::Opener`) to resolve each submodule's on-disk path,
/// and each worker re-opens its own `Repository` handle from that path.
pub fn push(repo: &Repository, opener: &Opener, remote: &str, refspec: &str) -> Result<PushOutcome> {
    let head = adapter::head_commit(repo)?.ok_or(Error::NoHead)?;
    let head_tree = adapter::commit_tree(repo, head)?;
    let entries = submodule::declared_at_tree(repo, &head_tree)?;

    let mut pinned = Vec::with_capacity(entries.len());
    for entry in &entries {
        let sha = submodule::commit_sha(repo, &head_tree, &entry.path)?.ok_or_else(|| {
            Error::internal(format!(
                "submodule '{}' is declared but has no gitlink at HEAD",
                entry.name
            ))
        })?;
        let path = opener.path_for(repo, &entry.name)?;
        pinned.push(PinnedSubmodule {
            name: entry.name.clone(),
            path,
            sha,
        });
    }

    let pushed = parallel::run_bounded(
        &pinned,
        parallel::default_parallelism(),
        |p| p.name.clone(),
        |p| -> std::result::Result<String, Error> {
            let sub_repo = adapter::open(&p.path)?;
            push_synthetic_ref(&sub_repo, p.sha, remote)?;
            Ok(p.name.clone())
        },
    )
    .map_err(|labeled| Error::RemoteFailure {
        remote: remote.to_string(),
        attempts: 1,
        source: git2::Error::from_str(&format!(
            "submodule '{}' push failed: {}",
            labeled.label, labeled.error
        )),
    })?;

    adapter::push_refspec(repo, remote, refspec)?;

    Ok(PushOutcome {
        submodules_pushed: pushed,
        meta_ref: refspec.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_ref_name_is_namespaced_by_sha() {
        let mut bytes = [0u8; 20];
        bytes[19] = 7;
        let sha = Oid::from_bytes(&bytes).unwrap();
        assert_eq!(synthetic_ref_name(sha), format!("refs/commits/{sha}"));
    }
}
