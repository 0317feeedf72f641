//! `git tree rebase`.

use eyre::bail;
use tracing::instrument;
use tree_core::core::{Effects, Store};
use tree_core::git::Repo;

use crate::opts::RebaseArgs;

/// Move a tracked branch (and its descendants) onto a new parent, or
/// resume/abandon a rebase-tree paused by a merge conflict.
#[instrument(skip(effects))]
pub fn rebase(effects: &mut Effects, args: RebaseArgs) -> eyre::Result<()> {
    let repo = Repo::from_current_dir()?;
    let store = Store::new(&repo);

    match args {
        RebaseArgs {
            source: Some(source),
            dest: Some(dest),
            cont: false,
            abort: false,
        } => {
            tree_core::core::rebase_tree(&repo, &store, &source, &dest)?;
            effects.println(format!("git-tree: moved {source} onto {dest}"));
        }
        RebaseArgs {
            cont: true,
            source: None,
            dest: None,
            abort: false,
        } => {
            tree_core::core::continue_rebase_tree(&repo, &store)?;
            effects.println("git-tree: rebase continued");
        }
        RebaseArgs {
            abort: true,
            source: None,
            dest: None,
            cont: false,
        } => {
            tree_core::core::abort(&repo, &store)?;
            effects.println("git-tree: rebase aborted");
        }
        _ => bail!("rebase requires either --source/--dest, --continue, or --abort"),
    }
    Ok(())
}
