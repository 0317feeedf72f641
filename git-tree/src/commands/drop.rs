//! `git tree drop`.

use tracing::instrument;
use tree_core::core::{Effects, Store};
use tree_core::git::Repo;

/// Stop tracking this repository's branches.
#[instrument(skip(effects))]
pub fn drop(effects: &mut Effects) -> eyre::Result<()> {
    let repo = Repo::from_current_dir()?;
    let store = Store::new(&repo);

    tree_core::core::drop_tracking(&repo, &store)?;
    hook::uninstall_hooks(&repo)?;

    effects.println("git-tree: tracking removed");
    Ok(())
}
