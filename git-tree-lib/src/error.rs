//! The error kinds shared by every public entry point of the core.
//!
//! Mirrors §7 of the specification. Every public operation returns a
//! [`Result`] carrying one of these kinds instead of panicking or silently
//! swallowing a failure; preconditions are checked (and reported as
//! [`Error::InvalidArgument`]) before any mutation is attempted.

use std::path::PathBuf;

use crate::git::Oid;

/// The result type returned by every public entry point in this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// A core-level error, classified by §7's error kinds.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Tree metadata is absent where a command requires it to be present.
    #[error("this repository has not been initialized for git-tree (run `git tree init`)")]
    NotInitialized,

    /// `init` was invoked on an already-initialized repository.
    #[error("this repository has already been initialized for git-tree")]
    AlreadyInitialized,

    /// A precondition of the requested operation was not met.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Human-readable description of which precondition failed.
        message: String,
    },

    /// A rebase-tree checkpoint already exists; the requested operation
    /// conflicts with it.
    #[error("a rebase is already in progress; run `git tree rebase --continue` or `--abort`")]
    RebaseInProgress,

    /// The VCS reported merge conflicts while applying a rebase. The
    /// checkpoint has already been written; the caller should report this as
    /// a non-error, coherent paused state.
    #[error("merge conflict while rebasing {commit}")]
    MergeConflict {
        /// The commit whose application produced the conflict, if known.
        commit: Option<Oid>,
    },

    /// `rebase --continue` was invoked before the user staged conflict
    /// resolutions.
    #[error("unstaged changes: resolve conflicts and `git add` them before continuing")]
    UnstagedChanges,

    /// An adapter (VCS) call failed for a reason not otherwise classified.
    #[error("git error: {source}")]
    VcsError {
        #[source]
        source: git2::Error,
    },

    /// A filesystem operation failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// A structured metadata file was malformed.
    #[error("malformed metadata file {path}: {message}")]
    MalformedMetadata {
        path: PathBuf,
        message: String,
    },
}

impl Error {
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Error::InvalidArgument {
            message: message.into(),
        }
    }

    pub(crate) fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        Error::IoError {
            source,
            path: path.into(),
        }
    }

    pub(crate) fn malformed(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::MalformedMetadata {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl From<git2::Error> for Error {
    fn from(source: git2::Error) -> Self {
        Error::VcsError { source }
    }
}
