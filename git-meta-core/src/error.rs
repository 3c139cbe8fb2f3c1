use std::path::PathBuf;

use thiserror::Error;

/// The four error kinds `spec.md` §7 groups propagation policy by.
///
/// Kept as a classifier over one flat enum (rather than four separate enums)
/// so call sites that need to branch on kind — exit-code mapping, deciding
/// whether to keep the sequencer on disk — don't have to match every
/// variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    User,
    Conflict,
    Io,
    Internal,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("'{path}' is not a git repository")]
    NotARepo { path: PathBuf },

    #[error("the meta-repo has no HEAD commit")]
    NoHead,

    #[error("the working tree is not clean: {detail}")]
    NotClean { detail: String },

    #[error("repository state is inconsistent: {detail}")]
    Inconsistent { detail: String },

    #[error("submodule '{name}' is misconfigured: {detail}")]
    Misconfigured { name: String, detail: String },

    #[error("an operation is already in progress ({kind}); run --continue or --abort first")]
    OperationInProgress { kind: &'static str },

    #[error("no cherry-pick, rebase, merge, or revert is in progress")]
    NoOperationInProgress,

    #[error("unknown ref '{reference}'")]
    UnknownRef { reference: String },

    #[error("'{range}' is not a valid commit range")]
    BadRange { range: String },

    #[error(
        "commit {commit} changes submodule '{name}' origin URL; url changes are not \
         supported by cherry-pick/rebase"
    )]
    UrlChangeUnsupported { commit: String, name: String },

    #[error(
        "commit {commit} modifies meta-repo file '{path}'; git-meta commits may only touch \
         submodule pointers and .gitmodules"
    )]
    MetaFileChange { commit: String, path: String },

    #[error("no remote named '{remote}'")]
    RemoteMissing { remote: String },

    #[error("fetch/push to '{remote}' failed after {attempts} attempts: {source}")]
    RemoteFailure {
        remote: String,
        attempts: u32,
        #[source]
        source: git2::Error,
    },

    #[error("conflict(s) in the meta-repo; resolve and continue, or abort")]
    MetaConflict,

    #[error("submodule '{name}' conflicted while picking {sha}")]
    SubmoduleConflict { name: String, sha: String },

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    #[error("internal invariant violated: {0}")]
    Internal(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotARepo { .. }
            | Error::NoHead
            | Error::NotClean { .. }
            | Error::Inconsistent { .. }
            | Error::Misconfigured { .. }
            | Error::OperationInProgress { .. }
            | Error::NoOperationInProgress
            | Error::UnknownRef { .. }
            | Error::BadRange { .. }
            | Error::UrlChangeUnsupported { .. }
            | Error::MetaFileChange { .. }
            | Error::RemoteMissing { .. }
            | Error::RemoteFailure { .. } => ErrorKind::User,

            Error::MetaConflict | Error::SubmoduleConflict { .. } => ErrorKind::Conflict,

            Error::Io { .. } | Error::Git(_) => ErrorKind::Io,

            Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Exit code per `spec.md` §6: 0 success (not modeled here), 1 user/conflict
    /// error, 255 internal error. IO errors reaching this far have already been
    /// retried at the adapter level and are surfaced as user errors by the
    /// caller that wraps them in `RemoteFailure`.
    pub fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::User | ErrorKind::Conflict => 1,
            ErrorKind::Io => 1,
            ErrorKind::Internal => 255,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
