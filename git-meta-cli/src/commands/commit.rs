use std::path::Path;

use git_meta_core::ops;
use git_meta_core::opener::Opener;

pub fn run(cwd: &Path, message: &str, all: bool) -> i32 {
    let repo = match super::discover_repo(cwd) {
        Ok(repo) => repo,
        Err(err) => return super::report_error(&err),
    };
    let opener = Opener::new();
    match ops::commit(&repo, &opener, message, all) {
        Ok(oid) => {
            println!("[{}] {message}", &oid.to_string()[..12.min(oid.to_string().len())]);
            0
        }
        Err(err) => super::report_error(&err),
    }
}
