//! Renders a `RepoStatus` for the `status` subcommand (`spec.md` §6).

use git_meta_core::status::types::{FileStatus, RepoStatus, StagedEntry};

use super::ansi;

fn file_status_label(status: FileStatus) -> &'static str {
    match status {
        FileStatus::Modified => "modified",
        FileStatus::Added => "added",
        FileStatus::Removed => "removed",
        FileStatus::Renamed => "renamed",
        FileStatus::TypeChanged => "typechange",
    }
}

/// Default (`git status`-shaped) rendering: branch line, staged/workdir
/// entries, then one line per submodule with a pointer summary.
pub fn render_default(status: &RepoStatus, only: &[String]) -> String {
    let mut out = String::new();
    match &status.current_branch {
        Some(branch) => out.push_str(&format!("On branch {branch}\n")),
        None => out.push_str("HEAD detached\n"),
    }
    if let Some(seq) = &status.sequencer {
        out.push_str(&format!(
            "{} in progress; {} of {} commits applied\n",
            ansi::yellow(&format!("{:?}", seq.kind)),
            seq.current_commit,
            seq.commits.len()
        ));
    }

    if !status.staged.is_empty() {
        out.push_str("Changes staged:\n");
        for (path, entry) in &status.staged {
            match entry {
                StagedEntry::Change(fs) => {
                    out.push_str(&format!("  {}: {path}\n", file_status_label(*fs)))
                }
                StagedEntry::Conflict(_) => {
                    out.push_str(&format!("  {}: {path}\n", ansi::red("conflict")))
                }
            }
        }
    }
    if !status.workdir.is_empty() {
        out.push_str("Changes not staged:\n");
        for (path, fs) in &status.workdir {
            out.push_str(&format!("  {}: {path}\n", file_status_label(*fs)));
        }
    }

    let mut names: Vec<&String> = status.submodules.keys().collect();
    if !only.is_empty() {
        names.retain(|n| only.contains(n));
    }
    if !names.is_empty() {
        out.push_str("Submodules:\n");
        for name in names {
            let sub = &status.submodules[name];
            let open = sub.workdir.is_some();
            let marker = if open { " " } else { "-" };
            let sha = sub
                .index
                .as_ref()
                .map(|i| i.sha.to_string()[..7].to_string())
                .unwrap_or_else(|| "(removed)".to_string());
            let dirty = if sub.is_clean() { "" } else { " (dirty)" };
            out.push_str(&format!("{marker} {} {sha}{dirty}\n", ansi::quote_name(name)));
        }
    }
    out
}

/// `-l`: one line per open submodule, `HEAD sha + name`.
pub fn render_list(status: &RepoStatus, only: &[String]) -> String {
    let mut out = String::new();
    for (name, sub) in &status.submodules {
        if !only.is_empty() && !only.contains(name) {
            continue;
        }
        if let Some(workdir) = &sub.workdir {
            if let Some(head) = workdir.status.head_commit {
                out.push_str(&format!("{head} {name}\n"));
            }
        }
    }
    out
}

/// `-v`: like `-l` but also lists closed submodules with a leading `-`.
pub fn render_list_verbose(status: &RepoStatus, only: &[String]) -> String {
    let mut out = render_list(status, only);
    for (name, sub) in &status.submodules {
        if !only.is_empty() && !only.contains(name) {
            continue;
        }
        if sub.workdir.is_none() {
            let sha = sub
                .index
                .as_ref()
                .map(|i| i.sha.to_string())
                .unwrap_or_else(|| "(removed)".to_string());
            out.push_str(&format!("-{sha} {name}\n"));
        }
    }
    out
}
