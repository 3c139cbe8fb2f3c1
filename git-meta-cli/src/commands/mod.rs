pub mod branch;
pub mod checkout;
pub mod cherry_pick;
pub mod clone_init;
pub mod commit;
pub mod merge_pull_push;
pub mod open_close;
pub mod range;
pub mod status;

use std::path::Path;

use git_meta_core::error::Error;

/// Renders `err` the way `spec.md` §7 wants: affected names already quoted
/// by the call site, the next command spelled out for `ConflictError`.
pub fn report_error(err: &Error) -> i32 {
    eprintln!("git-meta: {err}");
    if matches!(err.kind(), git_meta_core::error::ErrorKind::Conflict) {
        eprintln!("Resolve the conflict(s), then run `git-meta cherry-pick --continue`,");
        eprintln!("or run `git-meta cherry-pick --abort` to give up and restore HEAD.");
    }
    err.exit_code()
}

pub fn discover_repo(cwd: &Path) -> Result<git2::Repository, Error> {
    git_meta_core::adapter::open(cwd)
}
