//! Repository-specific configuration (SPEC_FULL §B), in the style of
//! `git-branchless-lib::core::config`: a handful of `tree.*` Git config
//! lookups with sensible defaults, nothing more.

use tracing::instrument;

use crate::error::Result;
use crate::git::Repo;

/// The default name used for the synthetic root branch and the main branch
/// fallback, read from a live `git2::Config` rather than cached.
#[derive(Debug, Clone)]
pub struct TreeConfig;

impl TreeConfig {
    /// The branch `init` should treat as the default tree root when the
    /// caller passes no `-b` flags, from `tree.mainBranch`, falling back to
    /// `master`.
    #[instrument(skip(repo))]
    pub fn main_branch_name(repo: &Repo) -> Result<String> {
        let config = repo.inner.config()?;
        match config.get_string("tree.mainBranch") {
            Ok(name) => Ok(name),
            Err(source) if source.code() == git2::ErrorCode::NotFound => Ok("master".to_string()),
            Err(source) => Err(source.into()),
        }
    }

    /// The name of the synthetic root branch (§6 "Synthetic root branch").
    /// Not presently configurable, but kept as a single named constant so a
    /// future `tree.rootBranchName` override has one place to land.
    pub fn root_branch_name() -> &'static str {
        "git-tree-root"
    }
}
