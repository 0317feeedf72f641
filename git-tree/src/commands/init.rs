//! `git tree init`.

use tracing::instrument;
use tree_core::core::{Effects, Store};
use tree_core::git::Repo;

use crate::opts::InitArgs;

/// Start tracking this repository's branches.
#[instrument(skip(effects))]
pub fn init(effects: &mut Effects, args: InitArgs) -> eyre::Result<()> {
    let repo = Repo::from_current_dir()?;
    let store = Store::new(&repo);

    tree_core::core::init(&repo, &store, &args.branches)?;
    hook::install_hooks(&repo)?;

    effects.println("git-tree: initialized");
    Ok(())
}
