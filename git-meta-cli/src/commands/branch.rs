use std::path::Path;

use git2::BranchType;
use git_meta_core::adapter;

pub fn run(cwd: &Path, name: Option<&str>, all: bool, delete: bool) -> i32 {
    let repo = match super::discover_repo(cwd) {
        Ok(repo) => repo,
        Err(err) => return super::report_error(&err),
    };

    if delete {
        let Some(name) = name else {
            eprintln!("git-meta: branch -d requires a branch name");
            return 1;
        };
        return match repo.find_branch(name, BranchType::Local) {
            Ok(mut branch) => match branch.delete() {
                Ok(()) => 0,
                Err(e) => super::report_error(&git_meta_core::Error::Git(e)),
            },
            Err(_) => super::report_error(&git_meta_core::Error::UnknownRef {
                reference: name.to_string(),
            }),
        };
    }

    if let Some(name) = name {
        let head = match adapter::head_commit(&repo) {
            Ok(Some(oid)) => oid,
            Ok(None) => return super::report_error(&git_meta_core::Error::NoHead),
            Err(err) => return super::report_error(&err),
        };
        let commit = match repo.find_commit(head) {
            Ok(c) => c,
            Err(e) => return super::report_error(&git_meta_core::Error::Git(e)),
        };
        return match repo.branch(name, &commit, false) {
            Ok(_) => 0,
            Err(e) => super::report_error(&git_meta_core::Error::Git(e)),
        };
    }

    let current = adapter::current_branch(&repo).ok().flatten();
    let branch_type = if all { None } else { Some(BranchType::Local) };
    let branches = match repo.branches(branch_type) {
        Ok(b) => b,
        Err(e) => return super::report_error(&git_meta_core::Error::Git(e)),
    };
    for entry in branches.flatten() {
        let (branch, _) = entry;
        if let Ok(Some(name)) = branch.name() {
            let marker = if Some(name) == current.as_deref() { "*" } else { " " };
            println!("{marker} {name}");
        }
    }
    0
}
