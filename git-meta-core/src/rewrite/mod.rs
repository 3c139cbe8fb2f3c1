//! L4: the commit rewriter — cherry-picking (and, by extension, rebasing) a
//! meta-commit across HEAD while replaying whatever submodule history it
//! pins to (`spec.md` §4.2).

pub mod apply;
pub mod compute;
pub mod retry;

use git2::{Oid, Repository};
use indexmap::IndexMap;

use crate::adapter;
use crate::error::{Error, Result};
use crate::opener::Opener;
use crate::sequencer::{self, SequencerKind, SequencerState};
use crate::submodule;
use retry::FetchRetry;

/// One submodule's non-trivial change, successfully replayed.
pub struct PickedSubmodule {
    pub path: String,
    pub final_sha: Oid,
}

/// One submodule's non-trivial change that hit a conflict partway through
/// its pick loop.
pub struct SubmoduleConflict {
    pub name: String,
    pub sha: Oid,
}

pub struct PickSubsResult {
    pub picked: IndexMap<String, PickedSubmodule>,
    pub conflicts: Vec<SubmoduleConflict>,
}

pub struct RewriteOutcome {
    pub new_head: Oid,
    pub commits_applied: usize,
}

/// Cherry-picks a single non-merge commit from `sub_repo` onto `onto`.
/// `Ok(None)` means the pick produced conflicts; the caller is responsible
/// for surfacing them (and, if it wants the user to resolve them by hand,
/// materializing the conflicted tree into the submodule's working copy).
fn cherry_pick_one(sub_repo: &Repository, onto: Oid, commit_oid: Oid) -> Result<Option<Oid>> {
    let onto_commit = adapter::find_commit(sub_repo, onto)?;
    let pick_commit = adapter::find_commit(sub_repo, commit_oid)?;
    let mut index = sub_repo
        .cherrypick_commit(&pick_commit, &onto_commit, 0, None)
        .map_err(Error::Git)?;
    if index.has_conflicts() {
        sub_repo.set_index(&mut index).map_err(Error::Git)?;
        let mut builder = git2::build::CheckoutBuilder::new();
        builder.force();
        builder.conflict_style_merge(true);
        sub_repo
            .checkout_index(Some(&mut index), Some(&mut builder))
            .map_err(Error::Git)?;
        return Ok(None);
    }
    let tree_id = index.write_tree_to(sub_repo).map_err(Error::Git)?;
    let tree = adapter::find_tree(sub_repo, tree_id)?;
    let new_oid = adapter::create_commit(
        sub_repo,
        None,
        &pick_commit.author(),
        &pick_commit.committer(),
        pick_commit.message().unwrap_or(""),
        &tree,
        &[&onto_commit],
    )?;
    Ok(Some(new_oid))
}

/// How many of `commits` (oldest-first, the original, un-rewritten history)
/// a prior attempt already replayed onto `old_sha`, inferred from
/// `sub_head`'s ancestor chain. A cherry-picked commit carries its source
/// commit's message verbatim (see `cherry_pick_one`), so walking back from
/// `sub_head` and matching messages against `commits` in order recovers how
/// far a previous, now-resumed pick got without any extra persisted state.
fn resume_progress(
    sub_repo: &Repository,
    sub_head: Oid,
    old_sha: Oid,
    commits: &[Oid],
) -> Result<usize> {
    if sub_head == old_sha || commits.is_empty() {
        return Ok(0);
    }
    let mut messages = Vec::new();
    let mut cursor = sub_head;
    for _ in 0..commits.len() {
        let commit = adapter::find_commit(sub_repo, cursor)?;
        messages.push(commit.message().unwrap_or("").to_string());
        if cursor == old_sha || commit.parent_count() == 0 {
            break;
        }
        cursor = commit.parent_id(0).map_err(Error::Git)?;
    }
    messages.reverse();

    let mut applied = 0;
    for (i, msg) in messages.iter().enumerate() {
        if i >= commits.len() {
            break;
        }
        let expected = adapter::find_commit(sub_repo, commits[i])?
            .message()
            .unwrap_or("")
            .to_string();
        if *msg == expected {
            applied = i + 1;
        } else {
            break;
        }
    }
    Ok(applied)
}

/// `pickSubs(meta, opener, changes)`: for each non-trivially changed
/// submodule, fetches the target sha (with retry), replays every commit in
/// `(ancestor, new]` onto `old`, and leaves the submodule detached at the
/// final replayed sha. Stops a submodule's loop at its first conflict but
/// keeps trying the other submodules, matching `spec.md` §4.2's "independent
/// per-submodule progress" note.
///
/// Resume-aware: a submodule whose working copy is still sitting where a
/// previous attempt left it (detached HEAD at the pre-conflict cursor) picks
/// up from there instead of restarting the whole range from `old_sha` —
/// restarting would just re-run git's auto-merge and reproduce the same
/// conflict, discarding whatever the user resolved by hand. If the index
/// still has conflicts, nothing has changed; if it's clean but has staged
/// changes beyond HEAD, those are finalized into a commit carrying the
/// original commit's message and author before the remaining commits (if
/// any) are replayed.
pub fn pick_subs(
    repo: &Repository,
    opener: &Opener,
    changes: &IndexMap<String, compute::NonTrivialChange>,
    retry: &dyn FetchRetry,
) -> Result<PickSubsResult> {
    let mut picked = IndexMap::new();
    let mut conflicts = Vec::new();

    for (name, nontrivial) in changes {
        let sub_path = opener.path_for(repo, name)?;
        let sub_repo = adapter::open(&sub_path)?;

        let old_sha = nontrivial.change.old_sha;
        let new_sha = nontrivial.change.new_sha;
        let base = nontrivial.change.ancestor_sha.unwrap_or(old_sha);

        retry::fetch_with_retry(&sub_repo, new_sha, "origin", retry)?;
        let commits = adapter::commits_between(&sub_repo, base, new_sha)?;

        let sub_head = adapter::head_commit(&sub_repo)?.unwrap_or(old_sha);
        let applied = resume_progress(&sub_repo, sub_head, old_sha, &commits)?;

        if applied >= commits.len() {
            picked.insert(
                name.clone(),
                PickedSubmodule {
                    path: nontrivial.path.clone(),
                    final_sha: sub_head,
                },
            );
            continue;
        }

        if sub_repo.index().map_err(Error::Git)?.has_conflicts() {
            conflicts.push(SubmoduleConflict {
                name: name.clone(),
                sha: commits[applied],
            });
            continue;
        }

        let mut cursor = sub_head;
        let mut next = applied;

        let cursor_tree = adapter::commit_tree(&sub_repo, cursor)?;
        let has_staged_resolution = sub_repo
            .diff_tree_to_index(Some(&cursor_tree), None, None)
            .map_err(Error::Git)?
            .deltas()
            .len()
            > 0;
        if has_staged_resolution {
            let orig = adapter::find_commit(&sub_repo, commits[applied])?;
            let tree_id = sub_repo
                .index()
                .map_err(Error::Git)?
                .write_tree_to(&sub_repo)
                .map_err(Error::Git)?;
            let tree = adapter::find_tree(&sub_repo, tree_id)?;
            let cursor_commit = adapter::find_commit(&sub_repo, cursor)?;
            cursor = adapter::create_commit(
                &sub_repo,
                None,
                &orig.author(),
                &orig.committer(),
                orig.message().unwrap_or(""),
                &tree,
                &[&cursor_commit],
            )?;
            next = applied + 1;
        }

        let mut conflicted_at = None;
        for commit_oid in &commits[next..] {
            match cherry_pick_one(&sub_repo, cursor, *commit_oid)? {
                Some(new_oid) => cursor = new_oid,
                None => {
                    conflicted_at = Some(*commit_oid);
                    break;
                }
            }
        }

        match conflicted_at {
            Some(sha) => {
                adapter::set_head_detached(&sub_repo, cursor)?;
                conflicts.push(SubmoduleConflict {
                    name: name.clone(),
                    sha,
                });
            }
            None => {
                adapter::set_head_detached(&sub_repo, cursor)?;
                adapter::checkout_tree_force(&sub_repo, cursor)?;
                picked.insert(
                    name.clone(),
                    PickedSubmodule {
                        path: nontrivial.path.clone(),
                        final_sha: cursor,
                    },
                );
            }
        }
    }

    Ok(PickSubsResult { picked, conflicts })
}

fn stage_conflicted_trial(repo: &Repository, trial_index: &mut git2::Index) -> Result<()> {
    repo.set_index(trial_index).map_err(Error::Git)?;
    let mut builder = git2::build::CheckoutBuilder::new();
    builder.force();
    builder.conflict_style_merge(true);
    repo.checkout_index(Some(trial_index), Some(&mut builder))
        .map_err(Error::Git)
}

/// `rewriteCommit(meta, opener, target)`: the full single-commit pipeline —
/// trial three-way merge, submodule/meta-file change classification, simple
/// changes applied directly, non-trivial changes replayed via `pick_subs`,
/// then a fresh meta-commit authored like `target` but parented on the
/// current HEAD.
///
/// `resume` selects how the classification is obtained: a first attempt
/// (`resume = false`) runs a fresh trial merge and stages it on conflict so
/// the user has something to resolve; a resumed attempt (`resume = true`,
/// used by `continue_`) trusts the meta-repo's live index instead of
/// re-running the trial merge — re-running it would just recompute the same
/// conflict from the original trees and discard whatever the user resolved
/// by hand. Either way, submodule changes are classified straight from
/// trees, so `pick_subs`'s own resume logic applies uniformly.
pub fn rewrite_commit(
    repo: &Repository,
    opener: &Opener,
    target: Oid,
    retry: &dyn FetchRetry,
    resume: bool,
) -> Result<Oid> {
    let head = adapter::head_commit(repo)?.ok_or(Error::NoHead)?;

    if let Some(name) = compute::first_url_change(repo, target, None)? {
        return Err(Error::UrlChangeUnsupported {
            commit: target.to_string(),
            name,
        });
    }

    let head_commit = adapter::find_commit(repo, head)?;
    let target_commit = adapter::find_commit(repo, target)?;

    let computed = if resume {
        let live_index = repo.index().map_err(Error::Git)?;
        let computed = compute::compute_changes(repo, &live_index, head, target)?;
        if !computed.meta_conflicts.is_empty() {
            return Err(Error::MetaConflict);
        }
        computed
    } else {
        let mut trial_index = repo
            .cherrypick_commit(&target_commit, &head_commit, 0, None)
            .map_err(Error::Git)?;
        let computed = compute::compute_changes(repo, &trial_index, head, target)?;
        if !computed.meta_conflicts.is_empty() {
            stage_conflicted_trial(repo, &mut trial_index)?;
            return Err(Error::MetaConflict);
        }
        computed
    };

    if let Some(path) = computed.meta_file_changes.first() {
        return Err(Error::MetaFileChange {
            commit: target.to_string(),
            path: path.clone(),
        });
    }

    apply::change_submodules(repo, opener, &computed.simple_changes)?;

    let pick_result = pick_subs(repo, opener, &computed.changes, retry)?;
    if let Some(conflict) = pick_result.conflicts.into_iter().next() {
        return Err(Error::SubmoduleConflict {
            name: conflict.name,
            sha: conflict.sha.to_string(),
        });
    }
    for picked in pick_result.picked.values() {
        apply::update_gitlink(repo, &picked.path, picked.final_sha)?;
    }

    let tree_id = adapter::write_index_tree(repo)?;
    let tree = adapter::find_tree(repo, tree_id)?;
    let new_oid = adapter::create_commit(
        repo,
        Some("HEAD"),
        &target_commit.author(),
        &target_commit.committer(),
        target_commit.message().unwrap_or(""),
        &tree,
        &[&head_commit],
    )?;
    adapter::checkout_tree_force(repo, new_oid)?;
    Ok(new_oid)
}

fn run_sequence(
    repo: &Repository,
    opener: &Opener,
    retry: &dyn FetchRetry,
    resume_first: bool,
) -> Result<RewriteOutcome> {
    let mut state = sequencer::read(repo).ok_or(Error::NoOperationInProgress)?;
    let total = state.commits.len();
    let mut resume = resume_first;
    loop {
        let target = state.current();
        let new_oid = rewrite_commit(repo, opener, target, retry, resume)?;
        resume = false;
        if state.current_commit + 1 >= state.commits.len() {
            sequencer::clear(repo)?;
            return Ok(RewriteOutcome {
                new_head: new_oid,
                commits_applied: total,
            });
        }
        state = state.advanced(state.current_commit + 1)?;
        sequencer::write(repo, &state)?;
    }
}

/// `cherryPick(meta, opener, commits)`: starts a new sequencer run over
/// `targets`, applied oldest-first.
pub fn cherry_pick(
    repo: &Repository,
    opener: &Opener,
    targets: &[Oid],
    retry: &dyn FetchRetry,
) -> Result<RewriteOutcome> {
    if targets.is_empty() {
        return Err(Error::internal("cherry_pick requires at least one target commit"));
    }
    if sequencer::read(repo).is_some() {
        return Err(Error::OperationInProgress { kind: "cherry-pick" });
    }
    let head = adapter::head_commit(repo)?.ok_or(Error::NoHead)?;
    let original_head_ref = adapter::current_branch(repo)?.map(|b| format!("refs/heads/{b}"));
    let state = SequencerState::new(
        SequencerKind::CherryPick,
        head,
        original_head_ref,
        *targets.last().expect("checked non-empty above"),
        None,
        targets.to_vec(),
        0,
        None,
    )?;
    sequencer::write(repo, &state)?;
    run_sequence(repo, opener, retry, false)
}

/// `continue_(meta, opener)`: resumes a suspended sequencer run. Errors if
/// the meta-repo's index still has unresolved conflicts; otherwise resumes
/// the stalled commit from whatever the user has resolved (see
/// `rewrite_commit`'s doc comment) and proceeds through any remaining
/// commits.
pub fn continue_(repo: &Repository, opener: &Opener, retry: &dyn FetchRetry) -> Result<RewriteOutcome> {
    if sequencer::read(repo).is_none() {
        return Err(Error::NoOperationInProgress);
    }
    let index = repo.index().map_err(Error::Git)?;
    if index.has_conflicts() {
        return Err(Error::MetaConflict);
    }
    run_sequence(repo, opener, retry, true)
}

/// `abort(meta)`: discards the in-progress sequencer run, hard-resets every
/// currently open sub-repo back to the sha it was pinned at before the
/// sequencer started, and resets HEAD (and the branch it was on, if any)
/// back to where it started.
pub fn abort(repo: &Repository) -> Result<()> {
    let Some(state) = sequencer::read(repo) else {
        return Err(Error::NoOperationInProgress);
    };

    let original_tree = adapter::commit_tree(repo, state.original_head_sha)?;
    let workdir = adapter::workdir(repo);
    for entry in submodule::declared_at_tree(repo, &original_tree)? {
        if !submodule::is_open(&workdir, &entry.path) {
            continue;
        }
        let Some(original_sha) = submodule::commit_sha(repo, &original_tree, &entry.path)? else {
            continue;
        };
        let sub_repo = adapter::open(&workdir.join(&entry.path))?;
        crate::opener::fetch_if_missing(&sub_repo, original_sha)?;
        adapter::reset_hard(&sub_repo, original_sha)?;
        adapter::set_head_detached(&sub_repo, original_sha)?;
    }

    adapter::reset_hard(repo, state.original_head_sha)?;
    match &state.original_head_ref {
        Some(branch_ref) => {
            repo.set_head(branch_ref).map_err(Error::Git)?;
        }
        None => adapter::set_head_detached(repo, state.original_head_sha)?,
    }
    sequencer::clear(repo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{commit_all, fixture_repo, write_submodule_pointer};
    use std::path::Path;

    fn fake_sha(byte: u8) -> Oid {
        let mut bytes = [0u8; 20];
        bytes[19] = byte;
        Oid::from_bytes(&bytes).unwrap()
    }

    /// A real git-meta commit only ever touches submodule pointers and
    /// `.gitmodules` (`spec.md` §4.2 step 2 — any other meta-file delta is
    /// `MetaFileChange`), which is also what `compute_changes` assumes when it
    /// diffs `head_tree` straight against `target_tree`: see the comment at
    /// `compute::compute_changes_with_base`. So the fixture here advances a
    /// submodule's pinned sha rather than touching an ordinary file — the
    /// path `rewrite_commit` actually serves. The submodule is never opened
    /// (no working tree exists under `s/`), so the fast-forward is pure
    /// index/`.gitmodules` bookkeeping and needs no real sub-repo, matching
    /// `change_submodules`'s "open" check.
    #[test]
    fn rewrite_commit_replays_a_submodule_fast_forward_onto_a_new_head() {
        let (_dir, repo, base) = fixture_repo();
        write_submodule_pointer(&repo, "s", "s", "https://example.com/s.git", fake_sha(1));
        let base = {
            let base_commit = repo.find_commit(base).unwrap();
            commit_all(&repo, "add s", &[&base_commit])
        };

        let head = {
            let base_commit = repo.find_commit(base).unwrap();
            commit_all(&repo, "unrelated head work", &[&base_commit])
        };
        adapter::reset_hard(&repo, base).unwrap();

        write_submodule_pointer(&repo, "s", "s", "https://example.com/s.git", fake_sha(2));
        let target = {
            let base_commit = repo.find_commit(base).unwrap();
            commit_all(&repo, "advance s", &[&base_commit])
        };
        adapter::reset_hard(&repo, head).unwrap();

        let opener = Opener::new();
        let new_oid = rewrite_commit(&repo, &opener, target, &retry::NoDelay, false).unwrap();
        let new_commit = repo.find_commit(new_oid).unwrap();
        assert_eq!(new_commit.parent_id(0).unwrap(), head);
        assert_eq!(new_commit.message(), Some("advance s"));
        let new_tree = new_commit.tree().unwrap();
        assert_eq!(new_tree.get_path(Path::new("s")).unwrap().id(), fake_sha(2));
    }

    #[test]
    fn continue_with_no_sequencer_errors() {
        let (_dir, repo, _head) = fixture_repo();
        let opener = Opener::new();
        let err = continue_(&repo, &opener, &retry::NoDelay).unwrap_err();
        assert!(matches!(err, Error::NoOperationInProgress));
    }

    #[test]
    fn abort_with_no_sequencer_errors() {
        let (_dir, repo, _head) = fixture_repo();
        let err = abort(&repo).unwrap_err();
        assert!(matches!(err, Error::NoOperationInProgress));
    }

    #[test]
    fn cherry_pick_rejects_empty_target_list() {
        let (_dir, repo, _head) = fixture_repo();
        let opener = Opener::new();
        let err = cherry_pick(&repo, &opener, &[], &retry::NoDelay).unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }
}
