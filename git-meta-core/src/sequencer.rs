//! L2: the persisted record of a suspended multi-commit operation
//! (`spec.md` §3 "SequencerState", §6 "Persisted state").
//!
//! Stored as a handful of plain-text files under
//! `<meta-repo>/.git/meta_sequencer/`, written atomically (temp file in the
//! same directory, then rename) per `spec.md` §5's shared-resource policy.

use std::fs;
use std::path::{Path, PathBuf};

use git2::{Oid, Repository};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerKind {
    Rebase,
    Merge,
    CherryPick,
    Revert,
}

impl SequencerKind {
    fn as_str(self) -> &'static str {
        match self {
            SequencerKind::Rebase => "rebase",
            SequencerKind::Merge => "merge",
            SequencerKind::CherryPick => "cherry-pick",
            SequencerKind::Revert => "revert",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "rebase" => Some(SequencerKind::Rebase),
            "merge" => Some(SequencerKind::Merge),
            "cherry-pick" => Some(SequencerKind::CherryPick),
            "revert" => Some(SequencerKind::Revert),
            _ => None,
        }
    }
}

/// `spec.md` §3 "SequencerState".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencerState {
    pub kind: SequencerKind,
    pub original_head_sha: Oid,
    pub original_head_ref: Option<String>,
    pub target_sha: Oid,
    pub target_ref: Option<String>,
    pub commits: Vec<Oid>,
    pub current_commit: usize,
    pub message: Option<Vec<u8>>,
}

impl SequencerState {
    pub fn new(
        kind: SequencerKind,
        original_head_sha: Oid,
        original_head_ref: Option<String>,
        target_sha: Oid,
        target_ref: Option<String>,
        commits: Vec<Oid>,
        current_commit: usize,
        message: Option<Vec<u8>>,
    ) -> Result<Self> {
        if commits.is_empty() {
            return Err(Error::internal("sequencer must track at least one commit"));
        }
        if current_commit >= commits.len() {
            return Err(Error::internal(
                "current_commit must be strictly less than commits.len()",
            ));
        }
        Ok(SequencerState {
            kind,
            original_head_sha,
            original_head_ref,
            target_sha,
            target_ref,
            commits,
            current_commit,
            message,
        })
    }

    pub fn current(&self) -> Oid {
        self.commits[self.current_commit]
    }

    pub fn advanced(&self, current_commit: usize) -> Result<Self> {
        let mut next = self.clone();
        if current_commit >= next.commits.len() {
            return Err(Error::internal(
                "current_commit must be strictly less than commits.len()",
            ));
        }
        next.current_commit = current_commit;
        Ok(next)
    }

    pub fn remaining(&self) -> &[Oid] {
        &self.commits[self.current_commit + 1..]
    }
}

fn sequencer_dir(repo: &Repository) -> PathBuf {
    repo.path().join("meta_sequencer")
}

fn write_atomic(dir: &Path, file_name: &str, contents: &[u8]) -> Result<()> {
    fs::create_dir_all(dir).map_err(|source| Error::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let final_path = dir.join(file_name);
    let tmp_path = dir.join(format!(".{file_name}.tmp"));
    fs::write(&tmp_path, contents).map_err(|source| Error::Io {
        path: tmp_path.clone(),
        source,
    })?;
    fs::rename(&tmp_path, &final_path).map_err(|source| Error::Io {
        path: final_path,
        source,
    })
}

fn read_file(dir: &Path, file_name: &str) -> Option<Vec<u8>> {
    fs::read(dir.join(file_name)).ok()
}

fn format_ref_target(sha: Oid, ref_name: Option<&str>) -> String {
    match ref_name {
        Some(name) => format!("{sha}\n{name}\n"),
        None => format!("{sha}\n"),
    }
}

fn parse_ref_target(bytes: &[u8]) -> Option<(Oid, Option<String>)> {
    let text = std::str::from_utf8(bytes).ok()?;
    let mut lines = text.lines();
    let sha = Oid::from_str(lines.next()?.trim()).ok()?;
    let ref_name = lines.next().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    Some((sha, ref_name))
}

pub fn write(repo: &Repository, state: &SequencerState) -> Result<()> {
    let dir = sequencer_dir(repo);
    write_atomic(&dir, "TYPE", format!("{}\n", state.kind.as_str()).as_bytes())?;
    write_atomic(
        &dir,
        "ORIGINAL_HEAD",
        format_ref_target(state.original_head_sha, state.original_head_ref.as_deref()).as_bytes(),
    )?;
    write_atomic(
        &dir,
        "TARGET",
        format_ref_target(state.target_sha, state.target_ref.as_deref()).as_bytes(),
    )?;
    let commits_text = state
        .commits
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join("\n")
        + "\n";
    write_atomic(&dir, "COMMITS", commits_text.as_bytes())?;
    write_atomic(
        &dir,
        "CURRENT_COMMIT",
        format!("{}\n", state.current_commit).as_bytes(),
    )?;
    if let Some(message) = &state.message {
        write_atomic(&dir, "MESSAGE", message)?;
    }
    Ok(())
}

/// Returns `None` on any corruption (bad type, wrong `current_commit`,
/// missing field) rather than erroring, per `spec.md` §8 property 3.
pub fn read(repo: &Repository) -> Option<SequencerState> {
    let dir = sequencer_dir(repo);
    if !dir.is_dir() {
        return None;
    }
    let kind = SequencerKind::parse(
        std::str::from_utf8(&read_file(&dir, "TYPE")?).ok()?.trim(),
    )?;
    let (original_head_sha, original_head_ref) = parse_ref_target(&read_file(&dir, "ORIGINAL_HEAD")?)?;
    let (target_sha, target_ref) = parse_ref_target(&read_file(&dir, "TARGET")?)?;
    let commits_bytes = read_file(&dir, "COMMITS")?;
    let commits_text = std::str::from_utf8(&commits_bytes).ok()?;
    let commits: Vec<Oid> = commits_text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| Oid::from_str(l.trim()))
        .collect::<std::result::Result<_, _>>()
        .ok()?;
    if commits.is_empty() {
        return None;
    }
    let current_commit_bytes = read_file(&dir, "CURRENT_COMMIT")?;
    let current_commit: usize = std::str::from_utf8(&current_commit_bytes)
        .ok()?
        .trim()
        .parse()
        .ok()?;
    if current_commit >= commits.len() {
        return None;
    }
    let message = read_file(&dir, "MESSAGE");
    Some(SequencerState {
        kind,
        original_head_sha,
        original_head_ref,
        target_sha,
        target_ref,
        commits,
        current_commit,
        message,
    })
}

pub fn clear(repo: &Repository) -> Result<()> {
    let dir = sequencer_dir(repo);
    if dir.exists() {
        fs::remove_dir_all(&dir).map_err(|source| Error::Io { path: dir, source })?;
    }
    Ok(())
}
