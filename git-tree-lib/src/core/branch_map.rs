//! BranchMap (§4.3, C3): the persisted parent/child graph of tracked
//! branches.

use std::collections::HashMap;

use tracing::instrument;

use crate::error::{Error, Result};
use crate::git::Repo;

/// The in-memory parent/child graph of tracked branches (§3 "BranchMap").
///
/// Branches are identified by name (see "Design Notes" in the spec): a
/// `BranchMap` never stores a commit oid, only structure. Invariants I1-I5
/// of §3 are enforced by every mutating method; a mutation that would
/// violate one leaves the map unchanged and returns
/// [`Error::InvalidArgument`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchMap {
    root: String,
    parent_of: HashMap<String, String>,
    children_of: HashMap<String, Vec<String>>,
}

impl BranchMap {
    /// A map with only a root and no children (I1, I2 trivially hold).
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            parent_of: HashMap::new(),
            children_of: HashMap::new(),
        }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn contains(&self, name: &str) -> bool {
        name == self.root || self.parent_of.contains_key(name)
    }

    pub fn find(&self, name: &str) -> Option<&str> {
        self.contains(name).then_some(name)
    }

    pub fn parent_of(&self, name: &str) -> Option<&str> {
        self.parent_of.get(name).map(String::as_str)
    }

    pub fn children_of(&self, name: &str) -> &[String] {
        self.children_of
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_parent(&self, parent: &str, child: &str) -> bool {
        self.parent_of(child) == Some(parent)
    }

    /// Whether `descendant` is reachable from `ancestor` by following child
    /// edges. Reflexive case (`ancestor == descendant`) is `false`.
    pub fn is_ancestor(&self, ancestor: &str, descendant: &str) -> bool {
        if ancestor == descendant {
            return false;
        }
        let mut stack: Vec<&str> = self.children_of(ancestor).iter().map(String::as_str).collect();
        while let Some(node) = stack.pop() {
            if node == descendant {
                return true;
            }
            stack.extend(self.children_of(node).iter().map(String::as_str));
        }
        false
    }

    /// All tracked branch names (including the root) in DFS pre-order —
    /// the same order used by [`BranchMap::emit`].
    pub fn list_branch_names(&self) -> Vec<String> {
        let mut result = vec![self.root.clone()];
        self.dfs_collect(&self.root, &mut result);
        result
    }

    fn dfs_collect(&self, node: &str, out: &mut Vec<String>) {
        for child in self.children_of(node) {
            out.push(child.clone());
            self.dfs_collect(child, out);
        }
    }

    /// Add `child` as a new child of `parent` (I1-I5 checked).
    #[instrument(skip(self, repo))]
    pub fn add_child(&mut self, repo: &Repo, parent: &str, child: &str) -> Result<()> {
        if !self.contains(parent) {
            return Err(Error::invalid_argument(format!(
                "unknown parent branch: {parent}"
            )));
        }
        if self.contains(child) {
            return Err(Error::invalid_argument(format!(
                "branch {child} is already tracked"
            )));
        }
        if self.is_ancestor(child, parent) {
            return Err(Error::invalid_argument(format!(
                "{child} is already an ancestor of {parent} in the branch map"
            )));
        }
        self.check_vcs_ancestry(repo, parent, child)?;

        self.parent_of.insert(child.to_string(), parent.to_string());
        self.children_of
            .entry(parent.to_string())
            .or_default()
            .push(child.to_string());
        Ok(())
    }

    /// Untrack `child` (and, transitively, everything beneath it) as a
    /// child of `parent`. A no-op if `child` is not currently a child of
    /// `parent`.
    #[instrument(skip(self))]
    pub fn remove_child(&mut self, parent: &str, child: &str) -> Result<()> {
        if !self.is_parent(parent, child) {
            return Ok(());
        }
        if let Some(children) = self.children_of.get_mut(parent) {
            children.retain(|name| name != child);
        }
        self.remove_subtree(child);
        Ok(())
    }

    fn remove_subtree(&mut self, node: &str) {
        let children = self.children_of.remove(node).unwrap_or_default();
        self.parent_of.remove(node);
        for child in children {
            self.remove_subtree(&child);
        }
    }

    /// Detach `src` from its current parent and attach it as a new child of
    /// `new_parent`, used by rebase-tree on success (§4.5).
    #[instrument(skip(self, repo))]
    pub fn move_subtree(&mut self, repo: &Repo, src: &str, new_parent: &str) -> Result<()> {
        if src == self.root {
            return Err(Error::invalid_argument("cannot move the root branch"));
        }
        if !self.contains(src) {
            return Err(Error::invalid_argument(format!("unknown branch: {src}")));
        }
        if !self.contains(new_parent) {
            return Err(Error::invalid_argument(format!(
                "unknown parent branch: {new_parent}"
            )));
        }
        if src == new_parent {
            return Err(Error::invalid_argument(
                "cannot move a branch to be its own parent",
            ));
        }
        if self.is_ancestor(src, new_parent) {
            return Err(Error::invalid_argument(format!(
                "{new_parent} is a descendant of {src}; this move would create a cycle"
            )));
        }
        self.check_vcs_ancestry(repo, new_parent, src)?;

        let old_parent = self
            .parent_of(src)
            .expect("src is non-root and tracked, so it has a parent")
            .to_string();
        if let Some(children) = self.children_of.get_mut(&old_parent) {
            children.retain(|name| name != src);
        }
        self.children_of
            .entry(new_parent.to_string())
            .or_default()
            .push(src.to_string());
        self.parent_of.insert(src.to_string(), new_parent.to_string());
        Ok(())
    }

    fn check_vcs_ancestry(&self, repo: &Repo, parent: &str, child: &str) -> Result<()> {
        let parent_oid = repo.find_local_branch_or_fail(parent)?.oid;
        let child_oid = repo.find_local_branch_or_fail(child)?.oid;
        if !repo.is_ancestor(parent_oid, child_oid)? {
            return Err(Error::invalid_argument(format!(
                "{parent} is not an ancestor of {child}'s commit"
            )));
        }
        Ok(())
    }

    /// Build the unique BranchMap consistent with commit ancestry over
    /// `tracked`, per the incremental insertion algorithm of §4.3
    /// "Construction". `tracked` must not include `root`.
    #[instrument(skip(repo))]
    pub fn from_repo(repo: &Repo, root: &str, tracked: &[String]) -> Result<Self> {
        let mut map = BranchMap::new(root);
        for branch in tracked {
            map.insert_branch(repo, &root.to_string(), branch)?;
        }
        Ok(map)
    }

    fn insert_branch(&mut self, repo: &Repo, node: &str, branch: &str) -> Result<()> {
        let branch_oid = repo.find_local_branch_or_fail(branch)?.oid;

        let children = self.children_of(node).to_vec();
        for candidate in &children {
            let candidate_oid = repo.find_local_branch_or_fail(candidate)?.oid;
            if repo.is_ancestor(candidate_oid, branch_oid)? {
                return self.insert_branch(repo, candidate, branch);
            }
        }

        let mut moved = Vec::new();
        let mut remaining = Vec::new();
        for candidate in &children {
            let candidate_oid = repo.find_local_branch_or_fail(candidate)?.oid;
            if repo.is_ancestor(branch_oid, candidate_oid)? {
                moved.push(candidate.clone());
            } else {
                remaining.push(candidate.clone());
            }
        }

        self.children_of.insert(node.to_string(), remaining);
        self.parent_of.insert(branch.to_string(), node.to_string());
        self.children_of
            .entry(node.to_string())
            .or_default()
            .push(branch.to_string());

        for moved_child in moved {
            self.parent_of
                .insert(moved_child.clone(), branch.to_string());
            self.children_of
                .entry(branch.to_string())
                .or_default()
                .push(moved_child);
        }

        Ok(())
    }

    /// Serialize to the on-disk format described in §4.3/§6: root name on
    /// line 1, then `parent child1 child2 ...` in DFS pre-order, omitting
    /// childless nodes.
    pub fn emit(&self) -> String {
        let mut lines = vec![self.root.clone()];
        self.emit_recurse(&self.root, &mut lines);
        lines.join("\n")
    }

    fn emit_recurse(&self, node: &str, lines: &mut Vec<String>) {
        let children = self.children_of(node);
        if children.is_empty() {
            return;
        }
        let mut parts = vec![node.to_string()];
        parts.extend(children.iter().cloned());
        lines.push(parts.join(" "));
        for child in children {
            self.emit_recurse(child, lines);
        }
    }

    /// Parse the on-disk format. Inverse of [`BranchMap::emit`] up to child
    /// order, which is preserved (P1).
    pub fn parse(contents: &str) -> Result<Self> {
        let mut lines = contents.lines();
        let root = lines
            .next()
            .ok_or_else(|| Error::malformed("branches", "empty file: missing root branch name"))?
            .trim()
            .to_string();
        if root.is_empty() {
            return Err(Error::malformed("branches", "root branch name is empty"));
        }

        let mut map = BranchMap::new(&root);
        for line in lines {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let mut parts = line.split_whitespace();
            let parent = parts
                .next()
                .ok_or_else(|| Error::malformed("branches", "line has no parent branch"))?
                .to_string();
            let children: Vec<String> = parts.map(str::to_string).collect();

            for child in &children {
                map.parent_of.insert(child.clone(), parent.clone());
            }
            map.children_of.insert(parent, children);
        }
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestRepo;

    fn linear_map() -> BranchMap {
        let mut map = BranchMap::new("root");
        map.parent_of.insert("a".into(), "root".into());
        map.children_of.insert("root".into(), vec!["a".into()]);
        map.parent_of.insert("b".into(), "a".into());
        map.children_of.insert("a".into(), vec!["b".into()]);
        map
    }

    #[test]
    fn round_trip_preserves_child_order() {
        let map = linear_map();
        let emitted = map.emit();
        let parsed = BranchMap::parse(&emitted).unwrap();
        assert_eq!(parsed, map);
    }

    #[test]
    fn emit_omits_childless_nodes() {
        let map = linear_map();
        assert_eq!(map.emit(), "root\nroot a\na b");
    }

    #[test]
    fn is_ancestor_is_not_reflexive() {
        let map = linear_map();
        assert!(!map.is_ancestor("a", "a"));
        assert!(map.is_ancestor("root", "b"));
        assert!(!map.is_ancestor("b", "root"));
    }

    #[test]
    fn add_child_rejects_cycle() {
        let test_repo = TestRepo::init();
        test_repo.checkout_new_branch("feature");
        test_repo.commit_file("feature", "feature");

        let mut map = BranchMap::new("master");
        map.add_child(&test_repo.repo, "master", "feature").unwrap();

        let err = map.add_child(&test_repo.repo, "feature", "master").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }

    #[test]
    fn remove_child_untracks_descendants() {
        let mut map = linear_map();
        map.remove_child("root", "a").unwrap();
        assert!(!map.contains("a"));
        assert!(!map.contains("b"));
        assert_eq!(map.children_of("root"), &[] as &[String]);
    }

    #[test]
    fn remove_child_absent_is_noop() {
        let mut map = linear_map();
        map.remove_child("root", "nonexistent").unwrap();
        assert_eq!(map, linear_map());
    }

    #[test]
    fn from_repo_builds_unique_ancestry_tree() {
        let test_repo = TestRepo::init();
        test_repo.checkout_new_branch("mew");
        test_repo.commit_file("mew", "mew");
        test_repo.checkout_new_branch("burmy");
        test_repo.commit_file("burmy", "burmy");
        test_repo.repo.inner.set_head("refs/heads/mew").unwrap();
        test_repo
            .repo
            .inner
            .checkout_head(None)
            .expect("checkout mew");
        test_repo.checkout_new_branch("wurmple");
        test_repo.commit_file("wurmple", "wurmple");

        let tracked = vec![
            "mew".to_string(),
            "burmy".to_string(),
            "wurmple".to_string(),
        ];
        let map = BranchMap::from_repo(&test_repo.repo, "master", &tracked).unwrap();
        assert_eq!(map.children_of("master"), &["mew".to_string()]);
        assert_eq!(
            map.children_of("mew"),
            &["burmy".to_string(), "wurmple".to_string()]
        );
    }
}
