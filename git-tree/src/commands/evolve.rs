//! `git tree evolve`.

use tracing::instrument;
use tree_core::core::{Effects, Store};
use tree_core::git::Repo;

/// Repoint and replay tracked branches after a history rewrite.
#[instrument(skip(effects))]
pub fn evolve(effects: &mut Effects) -> eyre::Result<()> {
    let repo = Repo::from_current_dir()?;
    let store = Store::new(&repo);

    let summary = tree_core::core::evolve(&repo, &store)?;

    effects.println(format!(
        "git-tree: replayed {} commit(s)",
        summary.commits_replayed
    ));
    for branch in &summary.repointed_branches {
        effects.println(format!("git-tree: repointed {branch}"));
    }
    Ok(())
}
