use std::path::Path;

use git_meta_core::status::{self, StatusOptions};

use crate::format;

#[allow(clippy::too_many_arguments)]
pub fn run(cwd: &Path, subs: &[String], list: bool, verbose: bool) -> i32 {
    let repo = match super::discover_repo(cwd) {
        Ok(repo) => repo,
        Err(err) => return super::report_error(&err),
    };
    let opts = StatusOptions {
        paths: Vec::new(),
        cwd: Some(cwd.to_path_buf()),
        show_meta_changes: false,
        untracked_files: None,
        ignore_index: false,
    };
    let repo_status = match status::get_repo_status(&repo, &opts) {
        Ok(s) => s,
        Err(err) => return super::report_error(&err),
    };

    let rendered = if verbose {
        format::status::render_list_verbose(&repo_status, subs)
    } else if list {
        format::status::render_list(&repo_status, subs)
    } else {
        format::status::render_default(&repo_status, subs)
    };
    print!("{rendered}");
    0
}
