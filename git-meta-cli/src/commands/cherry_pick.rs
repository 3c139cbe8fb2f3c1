use std::path::Path;

use git_meta_core::opener::Opener;
use git_meta_core::rewrite::retry::LinearBackoff;
use git_meta_core::rewrite::{self, RewriteOutcome};

use super::{discover_repo, report_error};

fn report_outcome(outcome: RewriteOutcome) -> i32 {
    println!(
        "cherry-pick applied {} commit(s), HEAD now at {}",
        outcome.commits_applied,
        &outcome.new_head.to_string()[..12]
    );
    0
}

pub fn run(cwd: &Path, committish: &[String], cont: bool, abort: bool) -> i32 {
    let repo = match discover_repo(cwd) {
        Ok(repo) => repo,
        Err(err) => return report_error(&err),
    };

    if abort {
        return match rewrite::abort(&repo) {
            Ok(()) => {
                println!("cherry-pick aborted, HEAD restored");
                0
            }
            Err(err) => report_error(&err),
        };
    }

    let opener = Opener::new();

    if cont {
        return match rewrite::continue_(&repo, &opener, &LinearBackoff) {
            Ok(outcome) => report_outcome(outcome),
            Err(err) => report_error(&err),
        };
    }

    let targets = match super::range::resolve_commit_args(&repo, committish) {
        Ok(targets) => targets,
        Err(err) => return report_error(&err),
    };

    match rewrite::cherry_pick(&repo, &opener, &targets, &LinearBackoff) {
        Ok(outcome) => report_outcome(outcome),
        Err(err) => report_error(&err),
    }
}
