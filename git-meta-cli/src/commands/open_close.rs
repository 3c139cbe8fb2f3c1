use std::path::Path;

use git_meta_core::{opener, submodule, Error};

use super::report_error;

fn name_for_path(repo: &git2::Repository, path: &str) -> Result<String, Error> {
    let entries = submodule::declared_in_index(repo)?;
    submodule::find_by_path(&entries, path)
        .map(|e| e.name.clone())
        .ok_or_else(|| Error::Misconfigured {
            name: path.to_string(),
            detail: "no submodule declared at this path".to_string(),
        })
}

pub fn open(cwd: &Path, paths: &[String]) -> i32 {
    let repo = match super::discover_repo(cwd) {
        Ok(repo) => repo,
        Err(err) => return report_error(&err),
    };
    for path in paths {
        let name = match name_for_path(&repo, path) {
            Ok(name) => name,
            Err(err) => return report_error(&err),
        };
        match opener::open_submodule(&repo, &name) {
            Ok(_) => println!("opened {}", crate::format::ansi::quote_name(&name)),
            Err(err) => return report_error(&err),
        }
    }
    0
}

pub fn close(cwd: &Path, paths: &[String], force: bool) -> i32 {
    let repo = match super::discover_repo(cwd) {
        Ok(repo) => repo,
        Err(err) => return report_error(&err),
    };
    let mut names = Vec::with_capacity(paths.len());
    for path in paths {
        match name_for_path(&repo, path) {
            Ok(name) => names.push(name),
            Err(err) => return report_error(&err),
        }
    }
    match opener::close_submodules(&repo, &names, force) {
        Ok(()) => {
            for name in &names {
                println!("closed {}", crate::format::ansi::quote_name(name));
            }
            0
        }
        Err(err) => report_error(&err),
    }
}
