//! Resolves `cherry-pick`'s committish arguments into an ordered list of
//! commit `Oid`s, per `spec.md` §6: "A token containing `..`, `...`, `^@`,
//! `^!`, `^-N`, or a leading `^` is treated as a range and resolved via a
//! revision walker."

use git2::{Oid, Repository, Sort};
use git_meta_core::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static RANGE_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\.\.|\^@|\^!|\^-\d+|^\^").expect("valid regex"));

pub fn is_range_token(token: &str) -> bool {
    RANGE_TOKEN.is_match(token)
}

/// Expands one token into an oldest-first sequence of commit oids: a plain
/// committish resolves to itself, a range token is walked via `revspec` +
/// `revwalk`.
fn expand_token(repo: &Repository, token: &str) -> Result<Vec<Oid>> {
    if !is_range_token(token) {
        let oid = git_meta_core::adapter::resolve(repo, token)?;
        return Ok(vec![oid]);
    }

    let spec = repo.revparse(token).map_err(|_| Error::BadRange {
        range: token.to_string(),
    })?;

    if spec.mode().contains(git2::RevparseMode::SINGLE) {
        let oid = spec
            .from()
            .ok_or_else(|| Error::BadRange {
                range: token.to_string(),
            })?
            .id();
        return Ok(vec![oid]);
    }

    let to = spec
        .to()
        .ok_or_else(|| Error::BadRange {
            range: token.to_string(),
        })?
        .id();

    let mut walk = repo.revwalk().map_err(Error::Git)?;
    walk.set_sorting(Sort::REVERSE | Sort::TOPOLOGICAL)
        .map_err(Error::Git)?;
    walk.push(to).map_err(Error::Git)?;

    if spec.mode().contains(git2::RevparseMode::MERGE_BASE) {
        let from = spec
            .from()
            .ok_or_else(|| Error::BadRange {
                range: token.to_string(),
            })?
            .id();
        let base = repo.merge_base(from, to).map_err(Error::Git)?;
        walk.hide(base).map_err(Error::Git)?;
    } else if let Some(from) = spec.from() {
        walk.hide(from.id()).map_err(Error::Git)?;
    }

    let commits: Vec<Oid> = walk.map(|r| r.map_err(Error::Git)).collect::<Result<_>>()?;
    if commits.is_empty() {
        return Err(Error::BadRange {
            range: token.to_string(),
        });
    }
    Ok(commits)
}

/// Resolves every token in `tokens`, concatenated oldest-first, duplicates
/// removed while preserving first occurrence (a commit named directly and
/// also reachable via an earlier range collapses to one entry).
pub fn resolve_commit_args(repo: &Repository, tokens: &[String]) -> Result<Vec<Oid>> {
    if tokens.is_empty() {
        return Err(Error::BadRange {
            range: String::new(),
        });
    }
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for token in tokens {
        for oid in expand_token(repo, token)? {
            if seen.insert(oid) {
                out.push(oid);
            }
        }
    }
    Ok(out)
}
