use std::path::Path;

use git_meta_core::ops::{self, MergeOutcome};
use git_meta_core::opener::Opener;
use git_meta_core::rewrite::retry::LinearBackoff;

use super::{discover_repo, report_error};

fn report_merge_outcome(outcome: MergeOutcome) -> i32 {
    match outcome {
        MergeOutcome::UpToDate => println!("Already up to date."),
        MergeOutcome::FastForward { new_head } => {
            println!("Fast-forward to {}", &new_head.to_string()[..12])
        }
        MergeOutcome::Merged { new_head } => {
            println!("Merged, new HEAD {}", &new_head.to_string()[..12])
        }
    }
    0
}

pub fn merge(cwd: &Path, committish: &str) -> i32 {
    let repo = match discover_repo(cwd) {
        Ok(repo) => repo,
        Err(err) => return report_error(&err),
    };
    let other = match git_meta_core::adapter::resolve(&repo, committish) {
        Ok(oid) => oid,
        Err(err) => return report_error(&err),
    };
    let opener = Opener::new();
    match ops::merge(&repo, &opener, other, &LinearBackoff) {
        Ok(outcome) => report_merge_outcome(outcome),
        Err(err) => report_error(&err),
    }
}

pub fn pull(cwd: &Path, remote: &str, src: Option<&str>) -> i32 {
    let repo = match discover_repo(cwd) {
        Ok(repo) => repo,
        Err(err) => return report_error(&err),
    };
    let branch = match src {
        Some(b) => b.to_string(),
        None => match git_meta_core::adapter::current_branch(&repo) {
            Ok(Some(b)) => b,
            Ok(None) => return report_error(&git_meta_core::Error::NoHead),
            Err(err) => return report_error(&err),
        },
    };
    let opener = Opener::new();
    match ops::pull(&repo, &opener, remote, &branch, &LinearBackoff) {
        Ok(outcome) => report_merge_outcome(outcome),
        Err(err) => report_error(&err),
    }
}

pub fn push(cwd: &Path, remote: &str, src: &str, dst: Option<&str>, force: bool) -> i32 {
    let repo = match discover_repo(cwd) {
        Ok(repo) => repo,
        Err(err) => return report_error(&err),
    };
    let branch = match git_meta_core::adapter::current_branch(&repo) {
        Ok(Some(b)) => b,
        Ok(None) => return report_error(&git_meta_core::Error::NoHead),
        Err(err) => return report_error(&err),
    };
    let dst = dst.unwrap_or(&branch);
    let lhs = if src == "HEAD" { "HEAD" } else { src };
    let refspec = if force {
        format!("+{lhs}:refs/heads/{dst}")
    } else {
        format!("{lhs}:refs/heads/{dst}")
    };
    let opener = Opener::new();
    match git_meta_core::push::push(&repo, &opener, remote, &refspec) {
        Ok(outcome) => {
            for name in &outcome.submodules_pushed {
                println!("pushed submodule {}", crate::format::ansi::quote_name(name));
            }
            println!("pushed {} -> {remote} {dst}", src);
            0
        }
        Err(err) => report_error(&err),
    }
}
