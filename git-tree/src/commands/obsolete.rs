//! `git tree obsolete`: the hidden dispatcher invoked by installed hooks.

use eyre::bail;
use tracing::instrument;
use tree_core::core::Store;
use tree_core::git::Repo;

use crate::opts::ObsoleteArgs;

/// Forward one hook invocation into [`hook`]'s entry points.
#[instrument]
pub fn obsolete(args: ObsoleteArgs) -> eyre::Result<()> {
    let repo = Repo::from_current_dir()?;
    let store = Store::new(&repo);

    match args.hook_name.as_str() {
        "pre-rebase" => hook::run_pre_rebase(&store),
        "pre-commit" => hook::run_pre_commit(&repo, &store),
        "post-commit" => hook::run_post_commit(&repo, &store),
        "post-rewrite" => {
            let rewrite_type = args
                .rewrite_type
                .ok_or_else(|| eyre::eyre!("post-rewrite requires a rewrite-type argument"))?;
            hook::run_post_rewrite(&repo, &store, &rewrite_type, std::io::stdin().lock())
        }
        other => bail!("unrecognized hook name: {other}"),
    }
}
