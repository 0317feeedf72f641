//! `git tree branch`.

use tracing::instrument;
use tree_core::core::{Effects, Store};
use tree_core::git::Repo;

use crate::opts::BranchArgs;

/// Create a branch at `HEAD` and attach it under the current branch.
#[instrument(skip(effects))]
pub fn branch(effects: &mut Effects, args: BranchArgs) -> eyre::Result<()> {
    let repo = Repo::from_current_dir()?;
    let store = Store::new(&repo);

    tree_core::core::create_branch(&repo, &store, &args.name)?;

    effects.println(format!("git-tree: created branch {}", args.name));
    Ok(())
}
