//! L1: submodule primitives — parsing and writing `.gitmodules`, enumerating
//! submodules declared at a commit or in the index, listing which are
//! currently open, and resolving name↔path.
//!
//! `.gitmodules` is an INI file with one `[submodule "name"]` section per
//! entry, each carrying at least `path` and `url`. Reading it out of a
//! historical tree (rather than the live working copy) is the one thing
//! `git2::Repository::submodules()` can't do for us, so this module parses it
//! by hand the way `Minoru-git-submerge` does when it rewrites `.gitmodules`
//! blobs in place — generalized here to a full parse/enumerate/add/remove
//! surface rather than "delete one section".

use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;

use git2::{Oid, Repository, Tree};
use ini::Ini;

use crate::error::{Error, Result};

pub const GITMODULES_PATH: &str = ".gitmodules";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmoduleEntry {
    pub name: String,
    pub path: String,
    pub url: String,
}

fn section_name(name: &str) -> String {
    format!("submodule \"{name}\"")
}

pub fn parse(contents: &[u8]) -> Result<Vec<SubmoduleEntry>> {
    let ini = Ini::read_from(&mut Cursor::new(contents))
        .map_err(|e| Error::internal(format!("couldn't parse .gitmodules: {e}")))?;
    let mut entries = Vec::new();
    for (section, props) in ini.iter() {
        let Some(section) = section else { continue };
        let Some(name) = section
            .strip_prefix("submodule \"")
            .and_then(|s| s.strip_suffix('"'))
        else {
            continue;
        };
        let path = props.get("path").unwrap_or(name).to_string();
        let url = props
            .get("url")
            .ok_or_else(|| {
                Error::Misconfigured {
                    name: name.to_string(),
                    detail: "declared submodule has no url".to_string(),
                }
            })?
            .to_string();
        entries.push(SubmoduleEntry {
            name: name.to_string(),
            path,
            url,
        });
    }
    Ok(entries)
}

pub fn serialize(entries: &[SubmoduleEntry]) -> Vec<u8> {
    let mut ini = Ini::new();
    for entry in entries {
        ini.with_section(Some(section_name(&entry.name)))
            .set("path", &entry.path)
            .set("url", &entry.url);
    }
    let mut buf = Vec::new();
    ini.write_to(&mut buf).expect("writing to an in-memory buffer cannot fail");
    buf
}

/// Add or replace `entry`, or remove it (when `entry` is `None` for `name`).
pub fn with_entry(contents: &[u8], name: &str, entry: Option<SubmoduleEntry>) -> Result<Vec<u8>> {
    let mut entries: Vec<SubmoduleEntry> = if contents.is_empty() {
        Vec::new()
    } else {
        parse(contents)?
    };
    entries.retain(|e| e.name != name);
    if let Some(entry) = entry {
        entries.push(entry);
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(serialize(&entries))
}

fn gitmodules_blob_in_tree(repo: &Repository, tree: &Tree<'_>) -> Result<Option<Vec<u8>>> {
    match tree.get_path(Path::new(GITMODULES_PATH)) {
        Ok(entry) => {
            let blob = entry
                .to_object(repo)
                .map_err(Error::Git)?
                .peel_to_blob()
                .map_err(Error::Git)?;
            Ok(Some(blob.content().to_vec()))
        }
        Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
        Err(e) => Err(Error::Git(e)),
    }
}

/// Submodules declared in `.gitmodules` as of `tree` (typically HEAD's tree).
pub fn declared_at_tree(repo: &Repository, tree: &Tree<'_>) -> Result<Vec<SubmoduleEntry>> {
    match gitmodules_blob_in_tree(repo, tree)? {
        Some(bytes) => parse(&bytes),
        None => Ok(Vec::new()),
    }
}

/// Submodules declared in `.gitmodules` as staged in the index.
pub fn declared_in_index(repo: &Repository) -> Result<Vec<SubmoduleEntry>> {
    match gitmodules_bytes_in_index(repo)? {
        Some(bytes) => parse(&bytes),
        None => Ok(Vec::new()),
    }
}

/// Raw `.gitmodules` blob content as staged in the index, if any.
pub fn gitmodules_bytes_in_index(repo: &Repository) -> Result<Option<Vec<u8>>> {
    let index = repo.index().map_err(Error::Git)?;
    let Some(entry) = index.get_path(Path::new(GITMODULES_PATH), 0) else {
        return Ok(None);
    };
    let blob = repo.find_blob(entry.id).map_err(Error::Git)?;
    Ok(Some(blob.content().to_vec()))
}

/// The set of names declared in either `head_tree` or the index — the "union
/// to report" `spec.md` §4.1 step 3 asks for.
pub fn declared_names_union(
    repo: &Repository,
    head_tree: Option<&Tree<'_>>,
    index_entries: &[SubmoduleEntry],
) -> Result<Vec<String>> {
    let mut names: BTreeMap<String, ()> = BTreeMap::new();
    if let Some(tree) = head_tree {
        for entry in declared_at_tree(repo, tree)? {
            names.insert(entry.name, ());
        }
    }
    for entry in index_entries {
        names.insert(entry.name.clone(), ());
    }
    Ok(names.into_keys().collect())
}

/// A submodule is "open" iff its working-tree path exists and contains a
/// `.git` file or directory (the filesystem probe `spec.md` §2 L1 calls for).
pub fn is_open(workdir: &Path, submodule_path: &str) -> bool {
    let sub_dir = workdir.join(submodule_path);
    sub_dir.is_dir() && sub_dir.join(".git").exists()
}

/// Names of submodules under `workdir` that are currently open, restricted to
/// `declared`.
pub fn open_names(workdir: &Path, declared: &[SubmoduleEntry]) -> Vec<String> {
    declared
        .iter()
        .filter(|e| is_open(workdir, &e.path))
        .map(|e| e.name.clone())
        .collect()
}

pub fn find_by_name<'a>(entries: &'a [SubmoduleEntry], name: &str) -> Option<&'a SubmoduleEntry> {
    entries.iter().find(|e| e.name == name)
}

pub fn find_by_path<'a>(entries: &'a [SubmoduleEntry], path: &str) -> Option<&'a SubmoduleEntry> {
    entries.iter().find(|e| e.path == path)
}

/// Index entry sha for a submodule's gitlink, or `None` if it isn't (yet, or
/// any more) staged.
pub fn index_sha(repo: &Repository, path: &str) -> Result<Option<Oid>> {
    let index = repo.index().map_err(Error::Git)?;
    Ok(index.get_path(Path::new(path), 0).map(|e| e.id))
}

/// HEAD-tree gitlink sha for a submodule, or `None` if the path doesn't exist
/// in that tree (submodule is being added).
pub fn commit_sha(repo: &Repository, tree: &Tree<'_>, path: &str) -> Result<Option<Oid>> {
    match tree.get_path(Path::new(path)) {
        Ok(entry) if entry.filemode() == 0o160000 => Ok(Some(entry.id())),
        Ok(_) => Ok(None),
        Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
        Err(e) => Err(Error::Git(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<SubmoduleEntry> {
        vec![
            SubmoduleEntry {
                name: "a".to_string(),
                path: "libs/a".to_string(),
                url: "https://example.com/a.git".to_string(),
            },
            SubmoduleEntry {
                name: "b".to_string(),
                path: "libs/b".to_string(),
                url: "../b.git".to_string(),
            },
        ]
    }

    #[test]
    fn round_trips_through_serialize_and_parse() {
        let entries = sample();
        let bytes = serialize(&entries);
        let mut parsed = parse(&bytes).unwrap();
        parsed.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(parsed, entries);
    }

    #[test]
    fn with_entry_removes_when_none() {
        let bytes = serialize(&sample());
        let updated = with_entry(&bytes, "a", None).unwrap();
        let parsed = parse(&updated).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].name, "b");
    }

    #[test]
    fn with_entry_adds_new_section() {
        let updated = with_entry(
            &[],
            "c",
            Some(SubmoduleEntry {
                name: "c".to_string(),
                path: "libs/c".to_string(),
                url: "https://example.com/c.git".to_string(),
            }),
        )
        .unwrap();
        let parsed = parse(&updated).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].path, "libs/c");
    }

    #[test]
    fn missing_url_is_misconfigured() {
        let bytes = b"[submodule \"a\"]\n\tpath = libs/a\n";
        let err = parse(bytes).unwrap_err();
        assert!(matches!(err, Error::Misconfigured { .. }));
    }
}
