//! Command-line options for `git-tree` (§6).

use clap::{Args, Parser, Subcommand};

/// Stacked-branch tracking, subtree rebase, and evolve for Git.
#[derive(Debug, Parser)]
#[clap(version = env!("CARGO_PKG_VERSION"))]
pub struct Opts {
    /// The subcommand to run.
    #[clap(subcommand)]
    pub command: Command,
}

/// `git-tree` subcommands (§6 "Command surface").
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Initialize tracking for this repository.
    Init(InitArgs),

    /// Remove tracking from this repository.
    Drop,

    /// Create a branch at HEAD and attach it under the current branch.
    Branch(BranchArgs),

    /// Move a tracked branch and its descendants onto a new parent.
    Rebase(RebaseArgs),

    /// Repoint and replay tracked branches after a history rewrite.
    Evolve,

    /// Internal use: invoked by the installed Git hooks.
    #[clap(hide = true)]
    Obsolete(ObsoleteArgs),
}

/// Arguments to `git tree init`.
#[derive(Debug, Args)]
pub struct InitArgs {
    /// A branch to track; may be repeated. Defaults to the configured main
    /// branch when omitted.
    #[clap(short = 'b', long = "branch")]
    pub branches: Vec<String>,
}

/// Arguments to `git tree branch`.
#[derive(Debug, Args)]
pub struct BranchArgs {
    /// The name of the new branch.
    #[clap(value_parser)]
    pub name: String,
}

/// Arguments to `git tree rebase`.
#[derive(Debug, Args)]
pub struct RebaseArgs {
    /// The tracked branch to move.
    #[clap(short = 's', long, requires = "dest")]
    pub source: Option<String>,

    /// The tracked branch to move `source` onto.
    #[clap(short = 'd', long, requires = "source")]
    pub dest: Option<String>,

    /// Resume a rebase-tree paused by a merge conflict.
    #[clap(long = "continue", conflicts_with_all = ["source", "abort"])]
    pub cont: bool,

    /// Abandon a rebase-tree paused by a merge conflict.
    #[clap(long, conflicts_with_all = ["source", "cont"])]
    pub abort: bool,
}

/// Arguments to the hidden `obsolete` hook dispatcher.
#[derive(Debug, Args)]
pub struct ObsoleteArgs {
    /// One of `pre-rebase`, `pre-commit`, `post-commit`, `post-rewrite`.
    #[clap(value_parser)]
    pub hook_name: String,

    /// For `post-rewrite`: the rewrite type Git passes as its `$1`, one of
    /// `amend` or `rebase`. Old/new oid pairs are read from stdin.
    #[clap(value_parser)]
    pub rewrite_type: Option<String>,
}
