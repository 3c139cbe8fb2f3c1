use std::path::Path;

use git_meta_core::ops::{self, CheckoutSubmodules};
use git_meta_core::opener::Opener;

pub fn run(cwd: &Path, committish: &str, create: Option<&str>) -> i32 {
    let repo = match super::discover_repo(cwd) {
        Ok(repo) => repo,
        Err(err) => return super::report_error(&err),
    };
    let create = match create {
        None => CheckoutSubmodules::None,
        Some(raw) => match CheckoutSubmodules::parse(raw) {
            Some(policy) => policy,
            None => {
                eprintln!("git-meta: -c must be one of create|none|all|some, got '{raw}'");
                return 1;
            }
        },
    };
    let opener = Opener::new();
    match ops::checkout(&repo, &opener, committish, create) {
        Ok(oid) => {
            println!("HEAD is now at {}", &oid.to_string()[..12.min(oid.to_string().len())]);
            0
        }
        Err(err) => super::report_error(&err),
    }
}
