//! Value-semantic immutable records (`spec.md` §3, §9 "Value-semantic
//! immutable records"). Each type is built once through a validating
//! constructor and never mutated afterwards; there are no setters.

use git2::Oid;
use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::sequencer::SequencerState;

/// One changed path's status, for entries that aren't three-way conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Modified,
    Added,
    Removed,
    Renamed,
    TypeChanged,
}

/// `staged` holds either a plain change or a three-way conflict — a sum type,
/// per `spec.md` §9 "Tagged variants instead of nullable pairs".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StagedEntry {
    Change(FileStatus),
    Conflict(Conflict),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitRelation {
    Same,
    Ahead,
    Behind,
    Unrelated,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    Regular,
    Executable,
    Symlink,
    Gitlink,
    Tree,
}

impl FileMode {
    pub fn from_git2(mode: i32) -> Self {
        match mode {
            0o160000 => FileMode::Gitlink,
            0o120000 => FileMode::Symlink,
            0o040000 => FileMode::Tree,
            0o100755 => FileMode::Executable,
            _ => FileMode::Regular,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConflictEntry {
    pub mode: FileMode,
    pub object_id: Oid,
}

/// A three-way conflict. Any side may be absent: missing ancestor encodes
/// add/add, missing ours/theirs encodes edit/delete or delete/edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Conflict {
    pub ancestor: Option<ConflictEntry>,
    pub ours: Option<ConflictEntry>,
    pub theirs: Option<ConflictEntry>,
}

impl Conflict {
    pub fn new(
        ancestor: Option<ConflictEntry>,
        ours: Option<ConflictEntry>,
        theirs: Option<ConflictEntry>,
    ) -> Result<Self> {
        if ancestor.is_none() && ours.is_none() && theirs.is_none() {
            return Err(Error::internal("a conflict must have at least one side"));
        }
        Ok(Conflict {
            ancestor,
            ours,
            theirs,
        })
    }
}

/// The declared origin URL and pinned commit for one submodule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmoduleDesc {
    pub url: String,
    pub sha: Oid,
}

/// The transition a meta commit induces on one submodule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmoduleChange {
    pub old_sha: Oid,
    pub new_sha: Oid,
    pub ancestor_sha: Option<Oid>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSide {
    pub sha: Oid,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSide {
    pub sha: Oid,
    pub url: String,
    pub relation: CommitRelation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkdirSide {
    pub status: Box<RepoStatus>,
    pub relation: CommitRelation,
}

/// Per-submodule status, per `spec.md` §3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmoduleStatus {
    pub commit: Option<CommitSide>,
    pub index: Option<IndexSide>,
    pub workdir: Option<WorkdirSide>,
}

impl SubmoduleStatus {
    pub fn new(
        commit: Option<CommitSide>,
        index: Option<IndexSide>,
        workdir: Option<WorkdirSide>,
    ) -> Result<Self> {
        // "If index is absent the submodule is being removed; then workdir
        // must also be absent."
        if index.is_none() && workdir.is_some() {
            return Err(Error::internal(
                "submodule being removed (no index entry) cannot have a workdir entry",
            ));
        }
        // "If commit is absent the submodule is being added; index must be
        // present."
        if commit.is_none() && index.is_none() {
            return Err(Error::internal(
                "submodule being added (no commit entry) must have an index entry",
            ));
        }
        // "If index and commit are both present, their CommitRelation must
        // be Same iff their shas are equal." The spec's broken literal
        // (`FILESTATUS.MODIFIED === this.d_indexSha`) is almost certainly a
        // typo for comparing indexStatus against a relation, not a sha
        // against a tag; we implement the evidently intended check here:
        // modification implies the shas (or urls) differ.
        if let (Some(commit), Some(index)) = (&commit, &index) {
            let shas_equal = commit.sha == index.sha;
            if (index.relation == CommitRelation::Same) != shas_equal {
                return Err(Error::internal(
                    "index/commit relation must be Same iff their shas are equal",
                ));
            }
        }
        // "workdirShaRelation must be Same iff the open repo's head equals
        // index.sha; Unknown is forbidden here."
        if let (Some(index), Some(workdir)) = (&index, &workdir) {
            if workdir.relation == CommitRelation::Unknown {
                return Err(Error::internal(
                    "workdir/index relation may not be Unknown: the open repo's HEAD is always \
                     locally reachable",
                ));
            }
            let head_equals_index = workdir
                .status
                .head_commit
                .map(|head| head == index.sha)
                .unwrap_or(false);
            if (workdir.relation == CommitRelation::Same) != head_equals_index {
                return Err(Error::internal(
                    "workdir/index relation must be Same iff the open repo's HEAD equals \
                     index.sha",
                ));
            }
        }
        Ok(SubmoduleStatus {
            commit,
            index,
            workdir,
        })
    }

    pub fn is_clean(&self) -> bool {
        self.workdir
            .as_ref()
            .map(|w| w.status.is_clean())
            .unwrap_or(true)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebaseState {
    pub head_name: &'static str,
    pub original_head_sha: Oid,
    pub onto_sha: Oid,
}

/// A consistent snapshot of working state across the meta-repo (or any open
/// sub-repo, since status recurses) per `spec.md` §3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoStatus {
    pub current_branch: Option<String>,
    pub head_commit: Option<Oid>,
    pub staged: IndexMap<String, StagedEntry>,
    pub workdir: IndexMap<String, FileStatus>,
    pub submodules: IndexMap<String, SubmoduleStatus>,
    pub rebase: Option<(String, Oid, Oid)>,
    pub sequencer: Option<SequencerState>,
}

impl RepoStatus {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        current_branch: Option<String>,
        head_commit: Option<Oid>,
        mut staged: IndexMap<String, StagedEntry>,
        mut workdir: IndexMap<String, FileStatus>,
        mut submodules: IndexMap<String, SubmoduleStatus>,
        rebase: Option<(String, Oid, Oid)>,
        sequencer: Option<SequencerState>,
    ) -> Self {
        staged.sort_keys();
        workdir.sort_keys();
        submodules.sort_keys();
        RepoStatus {
            current_branch,
            head_commit,
            staged,
            workdir,
            submodules,
            rebase,
            sequencer,
        }
    }

    /// Clean iff `staged` is empty and every `workdir` entry is `Added`
    /// (untracked files and submodule changes don't count as dirty).
    pub fn is_clean(&self) -> bool {
        self.staged.is_empty()
            && self
                .workdir
                .values()
                .all(|status| matches!(status, FileStatus::Added))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(byte: u8) -> Oid {
        let mut bytes = [0u8; 20];
        bytes[19] = byte;
        Oid::from_bytes(&bytes).unwrap()
    }

    #[test]
    fn is_clean_true_when_only_untracked_additions() {
        let mut workdir = IndexMap::new();
        workdir.insert("new.txt".to_string(), FileStatus::Added);
        let status = RepoStatus::new(
            Some("main".to_string()),
            Some(oid(1)),
            IndexMap::new(),
            workdir,
            IndexMap::new(),
            None,
            None,
        );
        assert!(status.is_clean());
    }

    #[test]
    fn is_clean_false_with_staged_entries() {
        let mut staged = IndexMap::new();
        staged.insert("a.txt".to_string(), StagedEntry::Change(FileStatus::Modified));
        let status = RepoStatus::new(
            Some("main".to_string()),
            Some(oid(1)),
            staged,
            IndexMap::new(),
            IndexMap::new(),
            None,
            None,
        );
        assert!(!status.is_clean());
    }

    #[test]
    fn is_clean_false_with_modified_workdir_entry() {
        let mut workdir = IndexMap::new();
        workdir.insert("a.txt".to_string(), FileStatus::Modified);
        let status = RepoStatus::new(
            Some("main".to_string()),
            Some(oid(1)),
            IndexMap::new(),
            workdir,
            IndexMap::new(),
            None,
            None,
        );
        assert!(!status.is_clean());
    }

    #[test]
    fn submodule_status_rejects_workdir_without_index() {
        let inner = RepoStatus::new(
            None,
            Some(oid(2)),
            IndexMap::new(),
            IndexMap::new(),
            IndexMap::new(),
            None,
            None,
        );
        let err = SubmoduleStatus::new(
            Some(CommitSide {
                sha: oid(1),
                url: "u".to_string(),
            }),
            None,
            Some(WorkdirSide {
                status: Box::new(inner),
                relation: CommitRelation::Same,
            }),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }

    #[test]
    fn submodule_status_rejects_added_without_index() {
        let err = SubmoduleStatus::new(None, None, None).unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }

    #[test]
    fn submodule_status_rejects_unknown_workdir_relation() {
        let inner = RepoStatus::new(
            None,
            Some(oid(1)),
            IndexMap::new(),
            IndexMap::new(),
            IndexMap::new(),
            None,
            None,
        );
        let err = SubmoduleStatus::new(
            Some(CommitSide {
                sha: oid(1),
                url: "u".to_string(),
            }),
            Some(IndexSide {
                sha: oid(1),
                url: "u".to_string(),
                relation: CommitRelation::Same,
            }),
            Some(WorkdirSide {
                status: Box::new(inner),
                relation: CommitRelation::Unknown,
            }),
        )
        .unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }

    #[test]
    fn submodule_status_accepts_consistent_values() {
        let inner = RepoStatus::new(
            None,
            Some(oid(1)),
            IndexMap::new(),
            IndexMap::new(),
            IndexMap::new(),
            None,
            None,
        );
        let status = SubmoduleStatus::new(
            Some(CommitSide {
                sha: oid(1),
                url: "u".to_string(),
            }),
            Some(IndexSide {
                sha: oid(1),
                url: "u".to_string(),
                relation: CommitRelation::Same,
            }),
            Some(WorkdirSide {
                status: Box::new(inner),
                relation: CommitRelation::Same,
            }),
        )
        .unwrap();
        assert!(status.is_clean());
    }
}
