//! `spec.md` §6 "CLI surface", implemented with `clap`'s derive API — both
//! `headlamp` and `headlamp_core` already depend on `clap`, exercised there
//! by hand for a much larger, constantly-growing flag set; git-meta's
//! surface is small and stable enough that the derive macro is the
//! idiomatic default for a crate whose whole job is to *be* a CLI.

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "git-meta", about = "Mono-repo tooling over many sub-repos")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the working-tree status of the meta-repo and its submodules.
    Status {
        /// Restrict the report to these named sub-repos.
        #[arg(short = 's', long = "sub", value_name = "NAME")]
        subs: Vec<String>,
        /// Print one line per open submodule (HEAD sha + name).
        #[arg(short = 'l', long = "list")]
        list: bool,
        /// Also list closed submodules, each with a leading `-`.
        #[arg(short = 'v', long = "verbose")]
        verbose: bool,
    },
    /// List, create, or delete a branch.
    Branch {
        name: Option<String>,
        #[arg(short = 'a', long = "all")]
        all: bool,
        #[arg(short = 'd', long = "delete")]
        delete: bool,
    },
    /// Move HEAD (and, for open submodules, their working trees).
    Checkout {
        committish: String,
        #[arg(short = 'c', long = "create", value_name = "create|none|all|some")]
        create: Option<String>,
    },
    /// Create a meta-repo commit.
    Commit {
        #[arg(short = 'm', long = "message")]
        message: String,
        #[arg(short = 'a', long = "all")]
        all: bool,
    },
    /// Open (materialize) one or more submodules.
    Open { paths: Vec<String> },
    /// Close (dematerialize) one or more submodules.
    Close {
        paths: Vec<String>,
        #[arg(long = "force")]
        force: bool,
    },
    /// Clone a meta-repo.
    Clone { url: String, dir: String },
    /// Initialize a new meta-repo in the current directory.
    Init,
    /// Declare a new submodule.
    Include { url: String, path: String },
    /// Push synthetic meta-refs then the meta-repo ref.
    Push {
        #[arg(short = 'r', long = "remote", default_value = "origin")]
        remote: String,
        #[arg(short = 's', long = "source", default_value = "HEAD")]
        src: String,
        #[arg(short = 't', long = "target")]
        dst: Option<String>,
        #[arg(short = 'f', long = "force")]
        force: bool,
    },
    /// Fetch and rebase onto a remote branch.
    Pull {
        #[arg(short = 'r', long = "remote", default_value = "origin")]
        remote: String,
        #[arg(short = 's', long = "source")]
        src: Option<String>,
    },
    /// Merge a committish into HEAD.
    Merge { committish: String },
    /// Cherry-pick one or more commits (or resume/abort one in progress).
    CherryPick {
        committish: Vec<String>,
        #[arg(long = "continue")]
        cont: bool,
        #[arg(long = "abort")]
        abort: bool,
    },
}
