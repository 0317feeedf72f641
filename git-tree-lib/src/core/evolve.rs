//! Evolve engine (§4.7, C7): repoints tracked branches past rewritten
//! history by building obsolescence chains over the log and replaying the
//! RepoTree onto the chains' ultimate successors.

use std::collections::{HashMap, HashSet};

use tracing::instrument;

use crate::error::{Error, Result};
use crate::git::{init_and_run_rebase, Oid, RebaseOutcome, Repo};

use super::branch_map::BranchMap;
use super::obsolescence::{Action, ObsolescenceLog};
use super::repo_tree::RepoTree;
use super::store::{Store, StoreFile};

/// What `evolve` did, for the CLI to report.
#[derive(Debug, Clone, Default)]
pub struct EvolveSummary {
    pub commits_replayed: usize,
    pub repointed_branches: Vec<String>,
}

/// The paired obsoleted/obsoleter commit sequences produced by one host
/// action, rooted at their common ancestor (§4.7, GLOSSARY).
#[derive(Debug, Clone)]
struct Chain {
    obsoleted: Vec<Oid>,
    obsoleter: Vec<Oid>,
}

impl Chain {
    fn contains(&self, oid: Oid) -> bool {
        self.obsoleted.contains(&oid)
    }
}

struct ChainIndex {
    chains: Vec<Chain>,
    by_obsoleted: HashMap<Oid, usize>,
}

impl ChainIndex {
    fn build(repo: &Repo, log: &ObsolescenceLog) -> Result<Self> {
        let mut chains = Vec::new();
        let mut by_obsoleted = HashMap::new();
        for action in &log.actions {
            if let Some(chain) = build_chain(repo, action)? {
                let index = chains.len();
                for &oid in &chain.obsoleted {
                    by_obsoleted.insert(oid, index);
                }
                chains.push(chain);
            }
        }
        Ok(Self {
            chains,
            by_obsoleted,
        })
    }

    fn chain_for(&self, oid: Oid) -> Option<&Chain> {
        self.by_obsoleted.get(&oid).map(|&index| &self.chains[index])
    }
}

/// §4.7 "Obsolescence chain construction", steps 1-6.
fn build_chain(repo: &Repo, action: &Action) -> Result<Option<Chain>> {
    let mut oids: Vec<Oid> = Vec::new();
    for entry in &action.entries {
        oids.push(entry.obsolete);
        oids.push(entry.obsoleter);
    }
    oids.retain(|&oid| repo.commit_exists(oid));
    oids.sort();
    oids.dedup();
    if oids.len() < 2 {
        return Ok(None);
    }

    let root = repo
        .merge_base_octopus(&oids)?
        .ok_or_else(|| Error::invalid_argument("no common ancestor for obsolescence chain"))?;

    let mut paths: HashMap<Oid, Vec<Oid>> = HashMap::new();
    for &oid in &oids {
        if oid != root {
            paths.insert(oid, first_parent_path_from_root(repo, oid, root)?);
        }
    }

    let mut sides: HashMap<Oid, Vec<Oid>> = HashMap::new();
    for (&survivor, path) in &paths {
        let first = *path.first().expect("non-root survivor has a non-empty path");
        sides.entry(first).or_default().push(survivor);
    }
    if sides.len() > 2 {
        return Err(Error::invalid_argument(
            "malformed obsolescence chain: root has more than two descendant lines",
        ));
    }

    let mut side_lines: Vec<Vec<Oid>> = sides
        .values()
        .map(|members| {
            let farthest = *members
                .iter()
                .max_by_key(|member| paths[member].len())
                .expect("non-empty side");
            paths[&farthest].clone()
        })
        .collect();
    while side_lines.len() < 2 {
        side_lines.push(Vec::new());
    }

    let (obsoleted, obsoleter) = orient_sides(action, side_lines.remove(0), side_lines.remove(0))?;
    Ok(Some(Chain { obsoleted, obsoleter }))
}

/// Decide which side of a two-line chain is `obsoleted` vs `obsoleter`
/// (§4.7 step 6).
fn orient_sides(action: &Action, side_a: Vec<Oid>, side_b: Vec<Oid>) -> Result<(Vec<Oid>, Vec<Oid>)> {
    if side_a.is_empty() {
        return Ok((side_a, side_b));
    }
    if side_b.is_empty() {
        return Ok((side_b, side_a));
    }

    let set_a: HashSet<Oid> = side_a.iter().copied().collect();
    let set_b: HashSet<Oid> = side_b.iter().copied().collect();
    for entry in &action.entries {
        if set_a.contains(&entry.obsolete) && set_b.contains(&entry.obsoleter) {
            return Ok((side_a, side_b));
        }
        if set_b.contains(&entry.obsolete) && set_a.contains(&entry.obsoleter) {
            return Ok((side_b, side_a));
        }
    }
    Err(Error::invalid_argument(
        "cannot orient obsolescence chain: no entry spans both descendant lines",
    ))
}

/// First-parent path from (but excluding) `root` down to `oid`, oldest
/// first.
fn first_parent_path_from_root(repo: &Repo, oid: Oid, root: Oid) -> Result<Vec<Oid>> {
    let mut path = vec![oid];
    let mut current = oid;
    while current != root {
        let parent = repo
            .find_commit(current)?
            .parent_oids
            .first()
            .copied()
            .ok_or_else(|| {
                Error::invalid_argument(format!(
                    "commit {current} has no parent but is not the chain root"
                ))
            })?;
        if parent == root {
            break;
        }
        path.push(parent);
        current = parent;
    }
    path.reverse();
    Ok(path)
}

/// §4.7 "Single-commit rebase primitive": rebase `commit` alone onto
/// `evolve_head`, advancing it, without checkpointing (v1 scope).
#[instrument(skip(repo))]
fn rebase_single_commit(repo: &Repo, commit: Oid, evolve_head: &str) -> Result<Oid> {
    let parent = repo
        .find_commit(commit)?
        .parent_oids
        .first()
        .copied()
        .ok_or_else(|| Error::invalid_argument(format!("commit {commit} has no parent")))?;

    let parent_marker = repo.unique_branch_name("evolve-parent")?;
    let commit_marker = repo.unique_branch_name("evolve-commit")?;
    repo.create_branch(&parent_marker, parent, false)?;
    repo.create_branch(&commit_marker, commit, false)?;

    let result = (|| -> Result<Oid> {
        let evolve_head_oid = repo.find_local_branch_or_fail(evolve_head)?.oid;
        match init_and_run_rebase(repo, &commit_marker, Some(parent), evolve_head_oid)? {
            RebaseOutcome::Success => {}
            RebaseOutcome::MergeConflict { commit } => {
                return Err(Error::MergeConflict {
                    commit: Some(commit),
                })
            }
            RebaseOutcome::UnstagedChanges => {
                unreachable!("init_and_run_rebase never yields UnstagedChanges")
            }
        }
        let new_oid = repo.find_local_branch_or_fail(&commit_marker)?.oid;
        repo.set_branch_target(evolve_head, new_oid, "git-tree: evolve")?;
        Ok(new_oid)
    })();

    let _ = repo.delete_branch(&parent_marker);
    let _ = repo.delete_branch(&commit_marker);
    result
}

/// §4.7 "Chain resolution": replay a chain's `obsoleter` line onto the
/// evolve head, recursing into any chain nested within it.
fn resolve_chain(repo: &Repo, chain_index: &ChainIndex, chain: &Chain, evolve_head: &str) -> Result<Oid> {
    let mut placed = repo.find_local_branch_or_fail(evolve_head)?.oid;
    let mut index = 0;
    while index < chain.obsoleter.len() {
        let commit = chain.obsoleter[index];
        match chain_index.chain_for(commit) {
            Some(nested) => {
                placed = resolve_chain(repo, chain_index, nested, evolve_head)?;
                while index < chain.obsoleter.len() && nested.contains(chain.obsoleter[index]) {
                    index += 1;
                }
            }
            None => {
                placed = rebase_single_commit(repo, commit, evolve_head)?;
                index += 1;
            }
        }
    }
    Ok(placed)
}

/// §4.7 "Evolve traversal": DFS the RepoTree, replaying each commit (or
/// resolving the chain it belongs to) onto the evolve head, then repointing
/// any branch that used to sit at that position.
#[allow(clippy::too_many_arguments)]
fn walk(
    repo: &Repo,
    chain_index: &ChainIndex,
    tree: &RepoTree,
    evolve_head: &str,
    commit: Oid,
    is_history_root: bool,
    summary: &mut EvolveSummary,
) -> Result<()> {
    let chain = chain_index.chain_for(commit);

    let placed = if is_history_root {
        commit
    } else if let Some(chain) = chain {
        let placed = resolve_chain(repo, chain_index, chain, evolve_head)?;
        summary.commits_replayed += chain.obsoleter.len();
        placed
    } else {
        let placed = rebase_single_commit(repo, commit, evolve_head)?;
        summary.commits_replayed += 1;
        placed
    };

    let branches_source = match chain {
        Some(chain) => chain.obsoleted.last().copied().unwrap_or(commit),
        None => commit,
    };
    for name in tree.find_branches_at(branches_source) {
        repo.set_branch_target(name, placed, "git-tree: evolve")?;
        summary.repointed_branches.push(name.clone());
    }

    let saved_head_oid = repo.find_local_branch_or_fail(evolve_head)?.oid;
    let children = tree.find_children(branches_source);
    for (index, &child) in children.iter().enumerate() {
        if index > 0 {
            repo.set_branch_target(evolve_head, saved_head_oid, "git-tree: evolve (sibling reset)")?;
        }
        walk(repo, chain_index, tree, evolve_head, child, false, summary)?;
    }
    Ok(())
}

/// Repoint every tracked branch whose commit was obsoleted (directly or
/// transitively) to its ultimate successor, re-applying descendants.
#[instrument(skip(repo, store))]
pub fn evolve(repo: &Repo, store: &Store) -> Result<EvolveSummary> {
    require_initialized(store)?;
    // Decision (SPEC_FULL §D, open question): evolve refuses while any kind
    // of rebase (tree or plain) is in progress, since hook entries can land
    // in the wrong action otherwise.
    if repo.is_rebase_in_progress() || store.exists(StoreFile::Rebasing) {
        return Err(Error::RebaseInProgress);
    }

    let branch_map = BranchMap::parse(&store.read(StoreFile::Branches)?)?;
    let log = ObsolescenceLog::load(store)?;
    let chain_index = ChainIndex::build(repo, &log)?;

    let mut branch_refs = Vec::new();
    for name in branch_map.list_branch_names() {
        if let Some(branch_ref) = repo.find_local_branch(&name)? {
            branch_refs.push(branch_ref);
        }
    }
    let tree = RepoTree::build(repo, None, &branch_refs)?;

    let original_head_branch = repo.head_branch_name()?;
    let evolve_head_name = repo.unique_branch_name("evolve-head")?;

    let root = tree.root();
    let (evolve_head_start, is_history_root) = match repo.find_commit(root)?.parent_oids.first().copied() {
        Some(parent) => (parent, false),
        None => (root, true),
    };
    repo.create_branch(&evolve_head_name, evolve_head_start, false)?;

    let mut summary = EvolveSummary::default();
    let result = walk(
        repo,
        &chain_index,
        &tree,
        &evolve_head_name,
        root,
        is_history_root,
        &mut summary,
    );

    let _ = repo.delete_branch(&evolve_head_name);
    if let Some(name) = original_head_branch {
        let _ = repo.set_head_branch(&name);
    }

    result.map(|()| summary)
}

fn require_initialized(store: &Store) -> Result<()> {
    if store.is_initialized() {
        Ok(())
    } else {
        Err(Error::NotInitialized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestRepo;

    fn setup_tracked(test_repo: &TestRepo, names: &[&str]) -> (BranchMap, Store) {
        let tracked: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        let branch_map = BranchMap::from_repo(&test_repo.repo, "master", &tracked).unwrap();
        let store = Store::new(&test_repo.repo);
        store.write(StoreFile::Branches, &branch_map.emit()).unwrap();
        (branch_map, store)
    }

    #[test]
    fn evolve_repoints_descendant_after_amend() {
        let test_repo = TestRepo::init();
        test_repo.checkout_new_branch("treecko");
        test_repo.commit_file("treecko", "treecko");
        let old_treecko = test_repo.repo.head_oid().unwrap().unwrap();

        test_repo.checkout_new_branch("grovyle");
        test_repo.commit_file("grovyle", "grovyle");

        let (_branch_map, store) = setup_tracked(&test_repo, &["treecko", "grovyle"]);

        // Simulate `git commit --amend` on treecko: detach, create a new
        // commit with the same parent, then fast-forward the branch.
        let treecko_commit = test_repo.repo.find_commit(old_treecko).unwrap();
        let parent = treecko_commit.only_parent().unwrap();
        test_repo.repo.inner.set_head_detached(parent.inner()).unwrap();
        test_repo.commit_file("treecko", "treecko-amended");
        let new_treecko = test_repo.repo.head_oid().unwrap().unwrap();
        test_repo.repo.set_branch_target("treecko", new_treecko, "amend").unwrap();
        test_repo.repo.set_head_branch("master").unwrap();

        let mut log = ObsolescenceLog::default();
        log.actions.push(Action {
            kind: crate::core::obsolescence::ActionKind::Amend,
            entries: vec![crate::core::obsolescence::Entry {
                obsolete: old_treecko,
                obsoleter: new_treecko,
                source: crate::core::obsolescence::HookSource::PostRewriteAmend,
            }],
        });
        log.save(&store).unwrap();

        let summary = evolve(&test_repo.repo, &store).unwrap();
        assert!(summary.repointed_branches.contains(&"treecko".to_string()));
        assert!(summary.repointed_branches.contains(&"grovyle".to_string()));

        let grovyle_oid = test_repo.repo.find_local_branch_or_fail("grovyle").unwrap().oid;
        let grovyle_parent = test_repo.repo.find_commit(grovyle_oid).unwrap().only_parent().unwrap();
        assert_eq!(grovyle_parent, new_treecko);
    }
}
