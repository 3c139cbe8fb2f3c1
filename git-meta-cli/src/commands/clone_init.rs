use std::path::Path;

use git2::{IndexEntry, IndexTime, Repository};
use git_meta_core::{submodule, Error};

use super::report_error;

pub fn clone(url: &str, dir: &str) -> i32 {
    match git2::build::RepoBuilder::new().clone(url, Path::new(dir)) {
        Ok(_) => {
            println!("Cloned {url} into {dir}");
            0
        }
        Err(e) => report_error(&Error::Git(e)),
    }
}

pub fn init(cwd: &Path) -> i32 {
    match Repository::init(cwd) {
        Ok(_) => {
            println!("Initialized empty meta-repo in {}", cwd.display());
            0
        }
        Err(e) => report_error(&Error::Git(e)),
    }
}

const GITLINK_MODE: u32 = 0o160000;

/// `include URL PATH`: clones `url` straight into `path` (detached at
/// whatever its default branch resolves to), then stages a new gitlink and
/// `.gitmodules` section for it, leaving the addition to be committed by a
/// subsequent `git-meta commit`.
pub fn include(cwd: &Path, url: &str, path: &str) -> i32 {
    let repo = match super::discover_repo(cwd) {
        Ok(repo) => repo,
        Err(err) => return report_error(&err),
    };
    let workdir_root = git_meta_core::adapter::workdir(&repo);
    let sub_path = workdir_root.join(path);

    let sub_repo = match git2::build::RepoBuilder::new().clone(url, &sub_path) {
        Ok(r) => r,
        Err(e) => return report_error(&Error::Git(e)),
    };
    let sha = match git_meta_core::adapter::head_commit(&sub_repo) {
        Ok(Some(oid)) => oid,
        Ok(None) => {
            let _ = std::fs::remove_dir_all(&sub_path);
            return report_error(&Error::internal(format!(
                "cloned '{url}' has no commits to pin"
            )));
        }
        Err(err) => return report_error(&err),
    };

    let name = path.to_string();
    let mut entries = match submodule::declared_in_index(&repo) {
        Ok(e) => e,
        Err(err) => return report_error(&err),
    };
    entries.retain(|e| e.name != name);
    entries.push(submodule::SubmoduleEntry {
        name: name.clone(),
        path: path.to_string(),
        url: url.to_string(),
    });
    entries.sort_by(|a, b| a.name.cmp(&b.name));

    let mut index = match repo.index() {
        Ok(i) => i,
        Err(e) => return report_error(&Error::Git(e)),
    };
    let gitlink = IndexEntry {
        ctime: IndexTime::new(0, 0),
        mtime: IndexTime::new(0, 0),
        dev: 0,
        ino: 0,
        mode: GITLINK_MODE,
        uid: 0,
        gid: 0,
        file_size: 0,
        id: sha,
        flags: 0,
        flags_extended: 0,
        path: path.as_bytes().to_vec(),
    };
    if let Err(e) = index.add(&gitlink) {
        return report_error(&Error::Git(e));
    }

    let bytes = submodule::serialize(&entries);
    let blob_id = match repo.blob(&bytes) {
        Ok(id) => id,
        Err(e) => return report_error(&Error::Git(e)),
    };
    let gitmodules_entry = IndexEntry {
        ctime: IndexTime::new(0, 0),
        mtime: IndexTime::new(0, 0),
        dev: 0,
        ino: 0,
        mode: 0o100644,
        uid: 0,
        gid: 0,
        file_size: 0,
        id: blob_id,
        flags: 0,
        flags_extended: 0,
        path: submodule::GITMODULES_PATH.as_bytes().to_vec(),
    };
    if let Err(e) = index.add(&gitmodules_entry) {
        return report_error(&Error::Git(e));
    }
    if let Err(e) = index.write() {
        return report_error(&Error::Git(e));
    }

    println!(
        "staged new submodule {} at {} (pinned to {sha})",
        crate::format::ansi::quote_name(&name),
        path
    );
    0
}
