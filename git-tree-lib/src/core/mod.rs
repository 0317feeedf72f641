//! The hard core (§4): everything above the VCS adapter and below the CLI.

mod branch_map;
mod config;
mod effects;
mod evolve;
mod lifecycle;
mod obsolescence;
mod rebase_tree;
mod repo_tree;
mod store;

pub use branch_map::BranchMap;
pub use config::TreeConfig;
pub use effects::Effects;
pub use evolve::{evolve, EvolveSummary};
pub use lifecycle::{create_branch, drop_tracking, init};
pub use obsolescence::{
    post_commit, post_rewrite_amend, post_rewrite_rebase, pre_commit, pre_rebase, Action,
    ActionKind, Entry, HookSource, ObsolescenceLog, RewritePair,
};
pub use rebase_tree::{abort, continue_rebase_tree, rebase_tree};
pub use repo_tree::RepoTree;
pub use store::{Store, StoreFile};
