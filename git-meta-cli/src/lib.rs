//! In-process facade for the `git-meta` binary. Kept as a library, not just
//! a `main.rs`, so integration tests can drive the full CLI surface
//! in-process (no subprocess spawn, no PATH dependency) — the same split
//! `headlamp`/`headlamp_core` use, generalized here to one crate instead of
//! two since the command layer is thin enough not to warrant its own crate.

pub mod cli;
pub mod commands;
pub mod format;

use std::ffi::OsString;
use std::path::Path;

use clap::Parser;

use cli::{Cli, Command};

/// Parses `args` (program name included, as `std::env::args_os` yields) and
/// dispatches the resulting command, returning the process exit code.
pub fn run<I, T>(cwd: &Path, args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    dispatch(cwd, cli.command)
}

/// Dispatches an already-parsed [`Command`] to its handler.
pub fn dispatch(cwd: &Path, command: Command) -> i32 {
    match command {
        Command::Status { subs, list, verbose } => commands::status::run(cwd, &subs, list, verbose),
        Command::Branch { name, all, delete } => {
            commands::branch::run(cwd, name.as_deref(), all, delete)
        }
        Command::Checkout { committish, create } => {
            commands::checkout::run(cwd, &committish, create.as_deref())
        }
        Command::Commit { message, all } => commands::commit::run(cwd, &message, all),
        Command::Open { paths } => commands::open_close::open(cwd, &paths),
        Command::Close { paths, force } => commands::open_close::close(cwd, &paths, force),
        Command::Clone { url, dir } => commands::clone_init::clone(&url, &dir),
        Command::Init => commands::clone_init::init(cwd),
        Command::Include { url, path } => commands::clone_init::include(cwd, &url, &path),
        Command::Push {
            remote,
            src,
            dst,
            force,
        } => commands::merge_pull_push::push(cwd, &remote, &src, dst.as_deref(), force),
        Command::Pull { remote, src } => commands::merge_pull_push::pull(cwd, &remote, src.as_deref()),
        Command::Merge { committish } => commands::merge_pull_push::merge(cwd, &committish),
        Command::CherryPick {
            committish,
            cont,
            abort,
        } => commands::cherry_pick::run(cwd, &committish, cont, abort),
    }
}
