//! RebaseTree engine (§4.5, C5): a recursive, resumable rebase of a subtree
//! of tracked branches onto a new parent, with merge-conflict
//! checkpointing, continue, and abort.

use std::collections::BTreeMap;

use tracing::instrument;

use crate::error::{Error, Result};
use crate::git::{abort_rebase, continue_rebase, init_and_run_rebase, Oid, RebaseOutcome, Repo};

use super::branch_map::BranchMap;
use super::store::{Store, StoreFile};

/// Move `source` (and every branch tracked beneath it) to become a child of
/// `dest`, re-applying its commits on top. On success the `branches` file
/// is rewritten and no checkpoint remains; on conflict the four checkpoint
/// files are left in place and `Error::MergeConflict` is returned.
#[instrument(skip(repo, store))]
pub fn rebase_tree(repo: &Repo, store: &Store, source: &str, dest: &str) -> Result<()> {
    require_initialized(store)?;
    if store.exists(StoreFile::Rebasing) {
        return Err(Error::RebaseInProgress);
    }

    let mut branch_map = load_branch_map(store)?;
    let source_ref = repo.find_local_branch_or_fail(source)?;
    let dest_ref = repo.find_local_branch_or_fail(dest)?;

    if source_ref.oid == dest_ref.oid {
        return Err(Error::invalid_argument(
            "source and dest point at the same commit",
        ));
    }
    if !branch_map.contains(source) {
        return Err(Error::invalid_argument(format!(
            "{source} is not a tracked branch"
        )));
    }
    if !branch_map.contains(dest) {
        return Err(Error::invalid_argument(format!(
            "{dest} is not a tracked branch"
        )));
    }
    if branch_map.is_ancestor(source, dest) {
        return Err(Error::invalid_argument(format!(
            "{source} is an ancestor of {dest} in the branch map"
        )));
    }
    if branch_map.is_parent(dest, source) {
        return Err(Error::invalid_argument(format!(
            "{source} is already a child of {dest}"
        )));
    }
    ensure_no_merge_commits_in_subtree(repo, &branch_map, source)?;

    let old_parent = branch_map
        .parent_of(source)
        .expect("source is tracked and non-root")
        .to_string();

    let mut ctx = Ctx {
        repo,
        store,
        source: source.to_string(),
        dest: dest.to_string(),
        temps: BTreeMap::new(),
    };

    move_one(&mut ctx, &branch_map, &old_parent, dest, source)?;
    finish_success(repo, store, &mut branch_map, &ctx.temps, source, dest)
}

/// Resume an in-progress rebase-tree after the user has resolved the
/// conflict and staged the result.
#[instrument(skip(repo, store))]
pub fn continue_rebase_tree(repo: &Repo, store: &Store) -> Result<()> {
    require_initialized(store)?;
    if !store.exists(StoreFile::Rebasing) {
        return Err(Error::invalid_argument("no rebase-tree is in progress"));
    }

    let source = store.read(StoreFile::RebasingSource)?;
    let dest = store.read(StoreFile::RebasingDest)?;
    let temps = parse_temps(&store.read(StoreFile::RebasingTemps)?)?;

    match continue_rebase(repo)? {
        RebaseOutcome::Success => {}
        RebaseOutcome::MergeConflict { commit } => {
            write_checkpoint(store, &source, &dest, &temps)?;
            return Err(Error::MergeConflict {
                commit: Some(commit),
            });
        }
        RebaseOutcome::UnstagedChanges => return Err(Error::UnstagedChanges),
    }

    let mut branch_map = load_branch_map(store)?;
    let old_parent = branch_map
        .parent_of(&source)
        .expect("source is tracked and non-root")
        .to_string();

    let mut ctx = Ctx {
        repo,
        store,
        source: source.clone(),
        dest: dest.clone(),
        temps,
    };

    move_one(&mut ctx, &branch_map, &old_parent, &dest, &source)?;
    let temps = ctx.temps.clone();
    finish_success(repo, store, &mut branch_map, &temps, &source, &dest)
}

/// Abort an in-progress rebase-tree, restoring every branch to its
/// pre-rebase position.
#[instrument(skip(repo, store))]
pub fn abort(repo: &Repo, store: &Store) -> Result<()> {
    require_initialized(store)?;
    if !store.exists(StoreFile::Rebasing) {
        return Err(Error::invalid_argument("no rebase-tree is in progress"));
    }

    abort_rebase(repo)?;

    let temps = parse_temps(&store.read(StoreFile::RebasingTemps)?)?;
    for (temp, original) in &temps {
        let temp_oid = repo.find_local_branch_or_fail(temp)?.oid;
        repo.set_branch_target(original, temp_oid, "git-tree: rebase-tree abort")?;
        repo.delete_branch(temp)?;
    }

    clear_checkpoint(store)
}

// -- Internals ------------------------------------------------------------

struct Ctx<'a> {
    repo: &'a Repo,
    store: &'a Store,
    source: String,
    dest: String,
    temps: BTreeMap<String, String>,
}

/// Move `to_move` from beside `upstream_name` onto `onto_name`, then recurse
/// into its tracked children. Idempotent: a `to_move` already present as a
/// value in `ctx.temps` (from an earlier, interrupted run) is assumed
/// already moved, and only its children are visited.
fn move_one(
    ctx: &mut Ctx,
    branch_map: &BranchMap,
    upstream_name: &str,
    onto_name: &str,
    to_move: &str,
) -> Result<()> {
    let already_moved = ctx
        .temps
        .iter()
        .find(|(_, original)| original.as_str() == to_move)
        .map(|(temp, _)| temp.clone());

    let temp_name = match already_moved {
        Some(temp_name) => temp_name,
        None => {
            let to_move_oid = ctx.repo.find_local_branch_or_fail(to_move)?.oid;
            let temp_name = ctx.repo.unique_branch_name(&format!("rebase-{to_move}"))?;
            ctx.repo.create_branch(&temp_name, to_move_oid, false)?;
            ctx.temps.insert(temp_name.clone(), to_move.to_string());

            let upstream_oid = ctx.repo.find_local_branch_or_fail(upstream_name)?.oid;
            let onto_oid = ctx.repo.find_local_branch_or_fail(onto_name)?.oid;

            match init_and_run_rebase(ctx.repo, to_move, Some(upstream_oid), onto_oid)? {
                RebaseOutcome::Success => {}
                RebaseOutcome::MergeConflict { commit } => {
                    write_checkpoint(ctx.store, &ctx.source, &ctx.dest, &ctx.temps)?;
                    return Err(Error::MergeConflict {
                        commit: Some(commit),
                    });
                }
                RebaseOutcome::UnstagedChanges => {
                    unreachable!("init_and_run_rebase never yields UnstagedChanges")
                }
            }
            temp_name
        }
    };

    for child in branch_map.children_of(to_move).to_vec() {
        move_one(ctx, branch_map, &temp_name, to_move, &child)?;
    }
    Ok(())
}

fn finish_success(
    repo: &Repo,
    store: &Store,
    branch_map: &mut BranchMap,
    temps: &BTreeMap<String, String>,
    source: &str,
    dest: &str,
) -> Result<()> {
    for temp in temps.keys() {
        repo.delete_branch(temp)?;
    }
    branch_map.move_subtree(repo, source, dest)?;
    store.write(StoreFile::Branches, &branch_map.emit())?;
    clear_checkpoint(store)
}

fn clear_checkpoint(store: &Store) -> Result<()> {
    store.delete(StoreFile::Rebasing)?;
    store.delete(StoreFile::RebasingSource)?;
    store.delete(StoreFile::RebasingDest)?;
    store.delete(StoreFile::RebasingTemps)?;
    Ok(())
}

fn write_checkpoint(
    store: &Store,
    source: &str,
    dest: &str,
    temps: &BTreeMap<String, String>,
) -> Result<()> {
    store.write(StoreFile::Rebasing, "")?;
    store.write(StoreFile::RebasingSource, source)?;
    store.write(StoreFile::RebasingDest, dest)?;
    store.write(StoreFile::RebasingTemps, &serialize_temps(temps))
}

fn serialize_temps(temps: &BTreeMap<String, String>) -> String {
    temps
        .iter()
        .map(|(temp, original)| format!("{temp} {original}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_temps(contents: &str) -> Result<BTreeMap<String, String>> {
    let mut map = BTreeMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.split_whitespace();
        let temp = parts
            .next()
            .ok_or_else(|| Error::malformed("rebasing-temps", "line missing temp branch name"))?
            .to_string();
        let original = parts
            .next()
            .ok_or_else(|| {
                Error::malformed("rebasing-temps", "line missing original branch name")
            })?
            .to_string();
        map.insert(temp, original);
    }
    Ok(map)
}

fn load_branch_map(store: &Store) -> Result<BranchMap> {
    BranchMap::parse(&store.read(StoreFile::Branches)?)
}

fn require_initialized(store: &Store) -> Result<()> {
    if store.is_initialized() {
        Ok(())
    } else {
        Err(Error::NotInitialized)
    }
}

/// Reject a move whose range touches a merge commit (Non-goal, §1): a
/// decision recorded in SPEC_FULL.md since the VCS rebase primitive is
/// documented as misbehaving on merges.
fn ensure_no_merge_commits_in_subtree(repo: &Repo, branch_map: &BranchMap, node: &str) -> Result<()> {
    let parent_name = branch_map
        .parent_of(node)
        .expect("node is tracked and non-root");
    ensure_no_merge_commits_below(repo, branch_map, node, parent_name)
}

fn ensure_no_merge_commits_below(
    repo: &Repo,
    branch_map: &BranchMap,
    node: &str,
    parent: &str,
) -> Result<()> {
    let parent_oid = repo.find_local_branch_or_fail(parent)?.oid;
    check_range(repo, parent_oid, node)?;
    for child in branch_map.children_of(node) {
        ensure_no_merge_commits_below(repo, branch_map, child, node)?;
    }
    Ok(())
}

fn check_range(repo: &Repo, parent_oid: Oid, node: &str) -> Result<()> {
    let node_oid = repo.find_local_branch_or_fail(node)?.oid;
    for oid in repo.walk_ancestors(&[node_oid], Some(parent_oid))? {
        if repo.find_commit(oid)?.parent_oids.len() > 1 {
            return Err(Error::invalid_argument(format!(
                "cannot rebase-tree across merge commit {oid}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestRepo;

    fn init_store(test_repo: &TestRepo, branch_map: &BranchMap) -> Store {
        let store = Store::new(&test_repo.repo);
        store.write(StoreFile::Branches, &branch_map.emit()).unwrap();
        store
    }

    fn build_stack(test_repo: &TestRepo) -> BranchMap {
        test_repo.checkout_new_branch("mew");
        test_repo.commit_file("mew", "mew");
        test_repo.checkout_new_branch("treecko");
        test_repo.commit_file("treecko", "treecko");
        test_repo
            .repo
            .inner
            .set_head("refs/heads/mew")
            .unwrap();
        test_repo.checkout_new_branch("mudkip");
        test_repo.commit_file("mudkip", "mudkip");

        let tracked = vec!["mew".to_string(), "treecko".to_string(), "mudkip".to_string()];
        BranchMap::from_repo(&test_repo.repo, "master", &tracked).unwrap()
    }

    #[test]
    fn single_child_rebase_succeeds() {
        let test_repo = TestRepo::init();
        let branch_map = build_stack(&test_repo);
        let store = init_store(&test_repo, &branch_map);

        rebase_tree(&test_repo.repo, &store, "treecko", "mudkip").unwrap();

        assert!(!store.exists(StoreFile::Rebasing));
        let updated = load_branch_map(&store).unwrap();
        assert!(updated.is_parent("mudkip", "treecko"));
        assert!(!updated.is_parent("mew", "treecko"));
        assert!(test_repo.repo.find_local_branch("rebase-treecko").unwrap().is_none());
    }

    #[test]
    fn rejects_when_source_equals_dest_commit() {
        let test_repo = TestRepo::init();
        test_repo.checkout_new_branch("mew");
        test_repo.commit_file("mew", "mew");
        let tracked = vec!["mew".to_string()];
        let branch_map = BranchMap::from_repo(&test_repo.repo, "master", &tracked).unwrap();
        let store = init_store(&test_repo, &branch_map);

        let err = rebase_tree(&test_repo.repo, &store, "mew", "mew").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[test]
    fn conflicting_rebase_checkpoints_then_continue_succeeds() {
        let test_repo = TestRepo::init();
        test_repo.checkout_new_branch("mew");
        std::fs::write(test_repo.path().join("shared"), "mew\n").unwrap();
        {
            let mut index = test_repo.repo.inner.index().unwrap();
            index.add_path(std::path::Path::new("shared")).unwrap();
            index.write().unwrap();
        }
        test_repo.commit_file("mew-marker", "mew-marker");

        test_repo.checkout_new_branch("treecko");
        std::fs::write(test_repo.path().join("shared"), "treecko\n").unwrap();
        {
            let mut index = test_repo.repo.inner.index().unwrap();
            index.add_path(std::path::Path::new("shared")).unwrap();
            index.write().unwrap();
        }
        test_repo.commit_file("treecko-marker", "treecko-marker");

        test_repo.repo.inner.set_head("refs/heads/mew").unwrap();
        test_repo.checkout_new_branch("mudkip");
        std::fs::write(test_repo.path().join("shared"), "mudkip\n").unwrap();
        {
            let mut index = test_repo.repo.inner.index().unwrap();
            index.add_path(std::path::Path::new("shared")).unwrap();
            index.write().unwrap();
        }
        test_repo.commit_file("mudkip-marker", "mudkip-marker");

        let tracked = vec!["mew".to_string(), "treecko".to_string(), "mudkip".to_string()];
        let branch_map = BranchMap::from_repo(&test_repo.repo, "master", &tracked).unwrap();
        let store = init_store(&test_repo, &branch_map);

        let err = rebase_tree(&test_repo.repo, &store, "treecko", "mudkip").unwrap_err();
        assert!(matches!(err, Error::MergeConflict { .. }));
        assert!(store.exists(StoreFile::Rebasing));
        assert_eq!(store.read(StoreFile::RebasingSource).unwrap(), "treecko");
        assert_eq!(store.read(StoreFile::RebasingDest).unwrap(), "mudkip");

        std::fs::write(test_repo.path().join("shared"), "resolved\n").unwrap();
        {
            let mut index = test_repo.repo.inner.index().unwrap();
            index.add_path(std::path::Path::new("shared")).unwrap();
            index.write().unwrap();
        }

        continue_rebase_tree(&test_repo.repo, &store).unwrap();
        assert!(!store.exists(StoreFile::Rebasing));
        let updated = load_branch_map(&store).unwrap();
        assert!(updated.is_parent("mudkip", "treecko"));
    }
}
