//! L2: the status engine (`spec.md` §4.1).
//!
//! Composes index/workdir/tree diffs and per-submodule states into an
//! immutable [`RepoStatus`], and enforces the three consistency predicates
//! (`ensure_clean`, `ensure_consistent`, `ensure_ready`).

pub mod types;

use std::path::{Path, PathBuf};

use git2::{Delta, DiffOptions, Oid, Repository};
use indexmap::IndexMap;
use path_slash::PathExt as _;

use crate::adapter;
use crate::error::{Error, Result};
use crate::sequencer;
use crate::submodule::{self, SubmoduleEntry};
use types::{
    CommitRelation, CommitSide, Conflict, ConflictEntry, FileMode, FileStatus, IndexSide,
    RepoStatus, StagedEntry, SubmoduleStatus, WorkdirSide,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UntrackedFilesOption {
    All,
    Normal,
    No,
}

#[derive(Debug, Clone, Default)]
pub struct StatusOptions {
    pub paths: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub show_meta_changes: bool,
    pub untracked_files: Option<UntrackedFilesOption>,
    pub ignore_index: bool,
}

impl StatusOptions {
    pub fn untracked_or_default(&self) -> UntrackedFilesOption {
        self.untracked_files.unwrap_or(UntrackedFilesOption::Normal)
    }
}

/// Rewrites `raw_paths` (resolved relative to `cwd`) into repo-root-relative,
/// forward-slash pathspecs, per `spec.md` §4.1 `cwd` option.
pub fn resolve_pathspecs(repo_root: &Path, cwd: &Path, raw_paths: &[String]) -> Vec<String> {
    raw_paths
        .iter()
        .map(|p| {
            let absolute = if Path::new(p).is_absolute() {
                PathBuf::from(p)
            } else {
                cwd.join(p)
            };
            let relative = absolute.strip_prefix(repo_root).unwrap_or(&absolute);
            relative.to_slash_lossy().to_string()
        })
        .collect()
}

fn delta_to_file_status(delta: Delta) -> Option<FileStatus> {
    match delta {
        Delta::Added => Some(FileStatus::Added),
        Delta::Deleted => Some(FileStatus::Removed),
        Delta::Modified => Some(FileStatus::Modified),
        Delta::Renamed => Some(FileStatus::Renamed),
        Delta::Typechange => Some(FileStatus::TypeChanged),
        Delta::Copied | Delta::Ignored | Delta::Untracked | Delta::Unmodified => None,
        _ => None,
    }
}

fn is_submodule_delta(delta: &git2::DiffDelta<'_>) -> bool {
    let old_is_sub = delta.old_file().mode() == git2::FileMode::Commit;
    let new_is_sub = delta.new_file().mode() == git2::FileMode::Commit;
    old_is_sub || new_is_sub
}

fn diff_options(untracked: UntrackedFilesOption, pathspecs: &[String]) -> DiffOptions {
    let mut opts = DiffOptions::new();
    opts.include_untracked(!matches!(untracked, UntrackedFilesOption::No));
    opts.recurse_untracked_dirs(matches!(untracked, UntrackedFilesOption::All));
    opts.include_ignored(false);
    opts.ignore_submodules(git2::SubmoduleIgnore::All);
    for p in pathspecs {
        opts.pathspec(p);
    }
    opts
}

fn collect_diff(
    diff: git2::Diff<'_>,
    show_meta_changes: bool,
) -> Result<IndexMap<String, FileStatus>> {
    let mut out = IndexMap::new();
    for delta in diff.deltas() {
        if is_submodule_delta(&delta) {
            continue;
        }
        if !show_meta_changes {
            continue;
        }
        let Some(status) = delta_to_file_status(delta.status()) else {
            continue;
        };
        let path = delta
            .new_file()
            .path()
            .or_else(|| delta.old_file().path())
            .ok_or_else(|| Error::internal("diff delta without a path"))?;
        out.insert(path.to_slash_lossy().to_string(), status);
    }
    Ok(out)
}

fn collect_conflicts(repo: &Repository) -> Result<IndexMap<String, Conflict>> {
    let index = repo.index().map_err(Error::Git)?;
    let mut out: IndexMap<String, Conflict> = IndexMap::new();
    for conflict in index.conflicts().map_err(Error::Git)? {
        let conflict = conflict.map_err(Error::Git)?;
        let path = conflict
            .ancestor
            .as_ref()
            .or(conflict.our.as_ref())
            .or(conflict.their.as_ref())
            .map(|e| String::from_utf8_lossy(&e.path).to_string())
            .ok_or_else(|| Error::internal("conflict entry without a path"))?;
        let to_entry = |e: Option<git2::IndexEntry>| {
            e.map(|e| ConflictEntry {
                mode: FileMode::from_git2(e.mode as i32),
                object_id: e.id,
            })
        };
        let built = Conflict::new(
            to_entry(conflict.ancestor),
            to_entry(conflict.our),
            to_entry(conflict.their),
        )?;
        out.insert(path, built);
    }
    Ok(out)
}

/// `getRelation(repo, from, to)`: `Same` iff equal; `Ahead`/`Behind` mutual
/// inverses along ancestry; `Unknown` iff exactly one side isn't locally
/// reachable.
pub fn get_relation(repo: &Repository, from: Option<Oid>, to: Option<Oid>) -> CommitRelation {
    match (from, to) {
        (None, None) => CommitRelation::Same,
        (Some(_), None) | (None, Some(_)) => CommitRelation::Unrelated,
        (Some(from), Some(to)) => {
            if from == to {
                return CommitRelation::Same;
            }
            let from_reachable = adapter::is_locally_reachable(repo, from);
            let to_reachable = adapter::is_locally_reachable(repo, to);
            if from_reachable != to_reachable {
                return CommitRelation::Unknown;
            }
            if !from_reachable && !to_reachable {
                return CommitRelation::Unknown;
            }
            if adapter::is_ancestor(repo, from, to).unwrap_or(false) {
                return CommitRelation::Ahead;
            }
            if adapter::is_ancestor(repo, to, from).unwrap_or(false) {
                return CommitRelation::Behind;
            }
            CommitRelation::Unrelated
        }
    }
}

pub fn ensure_clean(status: &RepoStatus) -> Result<()> {
    if status.is_clean() && status.submodules.values().all(SubmoduleStatus::is_clean) {
        return Ok(());
    }
    let mut dirty_submodules: Vec<&str> = status
        .submodules
        .iter()
        .filter(|(_, s)| !s.is_clean())
        .map(|(name, _)| name.as_str())
        .collect();
    dirty_submodules.sort_unstable();
    let detail = if status.is_clean() {
        format!("submodule(s) not clean: {}", dirty_submodules.join(", "))
    } else {
        "meta-repo has staged or modified files".to_string()
    };
    Err(Error::NotClean { detail })
}

pub fn ensure_consistent(status: &RepoStatus) -> Result<()> {
    let Some(branch) = &status.current_branch else {
        return Err(Error::Inconsistent {
            detail: "meta-repo HEAD is not on a named branch".to_string(),
        });
    };
    for (name, sub) in &status.submodules {
        if let Some(workdir) = &sub.workdir {
            if workdir.status.current_branch.as_deref() != Some(branch.as_str()) {
                return Err(Error::Inconsistent {
                    detail: format!("submodule '{name}' is on a different branch than the meta-repo"),
                });
            }
            let head_matches_index = sub
                .index
                .as_ref()
                .map(|index| workdir.status.head_commit == Some(index.sha))
                .unwrap_or(false);
            if !head_matches_index {
                return Err(Error::Inconsistent {
                    detail: format!(
                        "open submodule '{name}' HEAD differs from the meta-repo's index pointer"
                    ),
                });
            }
        }
        // Submodule pointer changes never show up in `status.staged` --
        // `collect_diff` excludes gitlink deltas entirely -- so "a submodule
        // has a staged change" has to be read off `SubmoduleStatus` itself:
        // the index pointer disagreeing with HEAD's.
        if let Some(index) = &sub.index {
            if index.relation != CommitRelation::Same {
                return Err(Error::Inconsistent {
                    detail: format!("submodule '{name}' has a staged change"),
                });
            }
        }
    }
    Ok(())
}

pub fn ensure_ready(status: &RepoStatus) -> Result<()> {
    if status.rebase.is_some() {
        return Err(Error::OperationInProgress { kind: "rebase" });
    }
    if status.sequencer.is_some() {
        return Err(Error::OperationInProgress { kind: "sequencer" });
    }
    Ok(())
}

pub struct SubmoduleStatusInputs<'a> {
    name: &'a str,
    entry_path: &'a str,
    commit_entry: Option<&'a SubmoduleEntry>,
    commit_sha: Option<Oid>,
    index_entry: Option<&'a SubmoduleEntry>,
    index_sha: Option<Oid>,
}

pub fn get_submodule_status(
    repo: &Repository,
    workdir_root: &Path,
    inputs: SubmoduleStatusInputs<'_>,
    opts: &StatusOptions,
) -> Result<SubmoduleStatus> {
    let commit_side = match (inputs.commit_entry, inputs.commit_sha) {
        (Some(entry), Some(sha)) => Some(CommitSide {
            sha,
            url: entry.url.clone(),
        }),
        _ => None,
    };

    let index_side = match (inputs.index_entry, inputs.index_sha) {
        (Some(entry), Some(sha)) => {
            let relation = get_relation(repo, commit_side.as_ref().map(|c| c.sha), Some(sha));
            Some(IndexSide {
                sha,
                url: entry.url.clone(),
                relation,
            })
        }
        (Some(_), None) => {
            return Err(Error::Misconfigured {
                name: inputs.name.to_string(),
                detail: "declared in .gitmodules but missing from the index".to_string(),
            });
        }
        _ => None,
    };

    let workdir_side = if submodule::is_open(workdir_root, inputs.entry_path) {
        let sub_path = workdir_root.join(inputs.entry_path);
        let sub_repo = adapter::open(&sub_path)?;
        let sub_opts = StatusOptions {
            paths: Vec::new(),
            cwd: None,
            show_meta_changes: true,
            untracked_files: opts.untracked_files,
            ignore_index: false,
        };
        let inner = get_repo_status(&sub_repo, &sub_opts)?;
        let relation = get_relation(
            &sub_repo,
            index_side.as_ref().map(|i| i.sha),
            inner.head_commit,
        );
        Some(WorkdirSide {
            status: Box::new(inner),
            relation,
        })
    } else {
        None
    };

    SubmoduleStatus::new(commit_side, index_side, workdir_side)
}

/// `getRepoStatus(repo, opts) -> RepoStatus` (`spec.md` §4.1).
pub fn get_repo_status(repo: &Repository, opts: &StatusOptions) -> Result<RepoStatus> {
    let head_commit = adapter::head_commit(repo)?;
    let Some(head_oid) = head_commit else {
        return Err(Error::NoHead);
    };
    let current_branch = adapter::current_branch(repo)?;
    let head_tree = adapter::commit_tree(repo, head_oid)?;

    let repo_root = adapter::workdir(repo);
    let cwd = opts.cwd.clone().unwrap_or_else(|| repo_root.clone());
    let pathspecs = resolve_pathspecs(&repo_root, &cwd, &opts.paths);
    let untracked = opts.untracked_or_default();

    let staged_diff = if opts.ignore_index {
        None
    } else {
        let mut diffopts = diff_options(untracked, &pathspecs);
        Some(
            repo.diff_tree_to_index(Some(&head_tree), None, Some(&mut diffopts))
                .map_err(Error::Git)?,
        )
    };
    let mut staged: IndexMap<String, StagedEntry> = IndexMap::new();
    if let Some(diff) = staged_diff {
        for (path, status) in collect_diff(diff, opts.show_meta_changes)? {
            staged.insert(path, StagedEntry::Change(status));
        }
    }
    if !opts.ignore_index {
        for (path, conflict) in collect_conflicts(repo)? {
            staged.insert(path, StagedEntry::Conflict(conflict));
        }
    }

    let workdir_diff = {
        let mut diffopts = diff_options(untracked, &pathspecs);
        if opts.ignore_index {
            repo.diff_tree_to_workdir(Some(&head_tree), Some(&mut diffopts))
                .map_err(Error::Git)?
        } else {
            repo.diff_index_to_workdir(None, Some(&mut diffopts))
                .map_err(Error::Git)?
        }
    };
    let workdir = collect_diff(workdir_diff, opts.show_meta_changes)?;

    let index_entries = submodule::declared_in_index(repo)?;
    let names = submodule::declared_names_union(repo, Some(&head_tree), &index_entries)?;

    let mut submodules = IndexMap::new();
    for name in names {
        let commit_entry_guess = submodule::find_by_name(
            &submodule::declared_at_tree(repo, &head_tree)?,
            &name,
        )
        .cloned();
        let index_entry = submodule::find_by_name(&index_entries, &name).cloned();
        let entry_path = index_entry
            .as_ref()
            .or(commit_entry_guess.as_ref())
            .map(|e| e.path.clone())
            .ok_or_else(|| Error::internal("submodule name with neither commit nor index entry"))?;
        let commit_sha = submodule::commit_sha(repo, &head_tree, &entry_path)?;
        let index_sha = submodule::index_sha(repo, &entry_path)?;

        let status = get_submodule_status(
            repo,
            &repo_root,
            SubmoduleStatusInputs {
                name: &name,
                entry_path: &entry_path,
                commit_entry: commit_entry_guess.as_ref(),
                commit_sha,
                index_entry: index_entry.as_ref(),
                index_sha,
            },
            opts,
        )?;
        submodules.insert(name, status);
    }

    let seq = sequencer::read(repo);

    Ok(RepoStatus::new(
        current_branch,
        Some(head_oid),
        staged,
        workdir,
        submodules,
        None,
        seq,
    ))
}
