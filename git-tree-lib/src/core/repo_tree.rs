//! RepoTree (§4.4, C4): a read-only snapshot of commit descendancy, used as
//! a deterministic oracle in tests and as the traversal order for evolve.

use std::collections::{HashMap, HashSet};

use tracing::instrument;

use crate::error::{Error, Result};
use crate::git::{BranchRef, Oid, Repo};

/// `{root-oid, children: oid → sorted child oids, branches-at: oid → sorted
/// branch names}`, built over the ancestors of a set of branches.
#[derive(Debug, Clone)]
pub struct RepoTree {
    root: Oid,
    children: HashMap<Oid, Vec<Oid>>,
    branches_at: HashMap<Oid, Vec<String>>,
}

impl RepoTree {
    pub fn root(&self) -> Oid {
        self.root
    }

    pub fn find_children(&self, oid: Oid) -> &[Oid] {
        self.children.get(&oid).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn find_branches_at(&self, oid: Oid) -> &[String] {
        self.branches_at.get(&oid).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Build the tree over `branches`, rooted at `root` (or, if `None`, the
    /// commit with no parents reachable from any of `branches`).
    #[instrument(skip(repo, branches))]
    pub fn build(repo: &Repo, root: Option<Oid>, branches: &[BranchRef]) -> Result<Self> {
        let branch_oids: Vec<Oid> = branches.iter().map(|b| b.oid).collect();
        let root = match root {
            Some(oid) => oid,
            None => Self::find_history_root(repo, &branch_oids)?,
        };

        let mut members: HashSet<Oid> = repo
            .walk_ancestors(&branch_oids, Some(root))?
            .into_iter()
            .collect();
        members.insert(root);

        let mut children: HashMap<Oid, Vec<Oid>> = HashMap::new();
        for &oid in &members {
            let commit = repo.find_commit(oid)?;
            if let Some(first_parent) = commit.parent_oids.first().copied() {
                if members.contains(&first_parent) {
                    children.entry(first_parent).or_default().push(oid);
                }
            }
        }
        for child_list in children.values_mut() {
            child_list.sort();
        }

        let mut branches_at: HashMap<Oid, Vec<String>> = HashMap::new();
        for branch in branches {
            if members.contains(&branch.oid) {
                branches_at
                    .entry(branch.oid)
                    .or_default()
                    .push(branch.name.clone());
            }
        }
        for names in branches_at.values_mut() {
            names.sort();
        }

        Ok(Self {
            root,
            children,
            branches_at,
        })
    }

    fn find_history_root(repo: &Repo, branch_oids: &[Oid]) -> Result<Oid> {
        for oid in repo.walk_ancestors(branch_oids, None)? {
            if repo.find_commit(oid)?.parent_oids.is_empty() {
                return Ok(oid);
            }
        }
        Err(Error::invalid_argument(
            "no root commit reachable from the given branches",
        ))
    }

    /// Structural equality oracle for tests (§3, §4.4): recursively compares
    /// commit messages at corresponding positions plus the sorted
    /// branch-name lists, without relying on oids matching across the two
    /// repositories.
    #[instrument(skip(repo_a, a, repo_b, b))]
    pub fn trees_equal(repo_a: &Repo, a: &RepoTree, repo_b: &Repo, b: &RepoTree) -> Result<bool> {
        Self::nodes_equal(repo_a, a, a.root, repo_b, b, b.root)
    }

    fn nodes_equal(
        repo_a: &Repo,
        a: &RepoTree,
        node_a: Oid,
        repo_b: &Repo,
        b: &RepoTree,
        node_b: Oid,
    ) -> Result<bool> {
        if repo_a.find_commit(node_a)?.message != repo_b.find_commit(node_b)?.message {
            return Ok(false);
        }
        if a.find_branches_at(node_a) != b.find_branches_at(node_b) {
            return Ok(false);
        }
        let children_a = a.find_children(node_a);
        let children_b = b.find_children(node_b);
        if children_a.len() != children_b.len() {
            return Ok(false);
        }
        for (&child_a, &child_b) in children_a.iter().zip(children_b.iter()) {
            if !Self::nodes_equal(repo_a, a, child_a, repo_b, b, child_b)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestRepo;

    fn branch_ref(repo: &Repo, name: &str) -> BranchRef {
        repo.find_local_branch_or_fail(name).unwrap()
    }

    #[test]
    fn build_collects_first_parent_lineage() {
        let test_repo = TestRepo::init();
        test_repo.checkout_new_branch("feature");
        test_repo.commit_file("feature", "feature");

        let branches = vec![
            branch_ref(&test_repo.repo, "master"),
            branch_ref(&test_repo.repo, "feature"),
        ];
        let tree = RepoTree::build(&test_repo.repo, None, &branches).unwrap();

        let master_oid = branch_ref(&test_repo.repo, "master").oid;
        let feature_oid = branch_ref(&test_repo.repo, "feature").oid;
        assert_eq!(tree.root(), master_oid);
        assert_eq!(tree.find_children(master_oid), &[feature_oid]);
        assert_eq!(tree.find_branches_at(master_oid), &["master".to_string()]);
        assert_eq!(tree.find_branches_at(feature_oid), &["feature".to_string()]);
    }

    #[test]
    fn trees_equal_ignores_oid_identity() {
        let repo_a = TestRepo::init();
        let repo_b = TestRepo::init();
        let branches_a = vec![branch_ref(&repo_a.repo, "master")];
        let branches_b = vec![branch_ref(&repo_b.repo, "master")];
        let tree_a = RepoTree::build(&repo_a.repo, None, &branches_a).unwrap();
        let tree_b = RepoTree::build(&repo_b.repo, None, &branches_b).unwrap();
        assert!(RepoTree::trees_equal(&repo_a.repo, &tree_a, &repo_b.repo, &tree_b).unwrap());
    }
}
