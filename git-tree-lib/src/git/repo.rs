//! Thin wrapper around `git2`, exposing exactly the capability surface the
//! core needs (§4.1 "VCS Adapter"). Every `git2` call that can fail is given
//! an associated `wrap`-style conversion into [`crate::error::Error`] here,
//! so the rest of the crate never touches `git2::Error` directly.

use std::path::{Path, PathBuf};

use tracing::instrument;

use crate::error::{Error, Result};
use crate::git::oid::Oid;

/// A named local branch together with the commit it currently points at.
///
/// The original implementation keyed data structures by `git2::Branch`
/// pointer identity; that does not survive a single rebase (the reference is
/// re-pointed or re-created under the hood). Branches are instead identified
/// **by name** everywhere in this crate, and re-read from the repository
/// whenever their target might have changed. See "Design Notes" in the spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchRef {
    pub name: String,
    pub oid: Oid,
}

/// A commit, together with the handful of fields the core ever reads.
#[derive(Debug, Clone)]
pub struct CommitInfo {
    pub oid: Oid,
    pub parent_oids: Vec<Oid>,
    pub message: String,
}

impl CommitInfo {
    pub fn only_parent(&self) -> Option<Oid> {
        match self.parent_oids.as_slice() {
            [only] => Some(*only),
            _ => None,
        }
    }
}

/// An open repository.
pub struct Repo {
    pub(crate) inner: git2::Repository,
}

impl std::fmt::Debug for Repo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repo").field("path", &self.git_dir()).finish()
    }
}

impl Repo {
    /// Open the repository containing `path` (or `path` itself).
    #[instrument]
    pub fn open(path: &Path) -> Result<Self> {
        let inner = git2::Repository::discover(path)?;
        Ok(Self { inner })
    }

    /// Open the repository containing the current working directory.
    #[instrument]
    pub fn from_current_dir() -> Result<Self> {
        let cwd = std::env::current_dir().map_err(|source| Error::io(source, "."))?;
        Self::open(&cwd)
    }

    /// The repository's working directory, if any (bare repos have none).
    pub fn workdir(&self) -> Option<&Path> {
        self.inner.workdir()
    }

    /// The repository's `.git` directory (or the bare repo root).
    pub fn git_dir(&self) -> &Path {
        self.inner.path()
    }

    /// The directory under which this crate's metadata files live:
    /// `<git_dir>/tree/`.
    pub fn tree_dir(&self) -> PathBuf {
        self.git_dir().join("tree")
    }

    // -- Commit ops ---------------------------------------------------

    #[instrument]
    pub fn find_commit(&self, oid: Oid) -> Result<CommitInfo> {
        let commit = self.inner.find_commit(oid.inner())?;
        Ok(CommitInfo {
            oid,
            parent_oids: commit.parent_ids().map(Oid::from_git2).collect(),
            message: commit.message().unwrap_or_default().to_string(),
        })
    }

    /// Whether `oid` names a commit that currently exists in the repository.
    #[instrument]
    pub fn commit_exists(&self, oid: Oid) -> bool {
        self.inner.find_commit(oid.inner()).is_ok()
    }

    // -- Branch ops -----------------------------------------------------

    #[instrument]
    pub fn find_local_branch(&self, name: &str) -> Result<Option<BranchRef>> {
        match self.inner.find_branch(name, git2::BranchType::Local) {
            Ok(branch) => {
                let oid = branch
                    .get()
                    .target()
                    .ok_or_else(|| Error::invalid_argument(format!("branch {name} has no target")))?;
                Ok(Some(BranchRef {
                    name: name.to_string(),
                    oid: Oid::from_git2(oid),
                }))
            }
            Err(source) if source.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(source) => Err(source.into()),
        }
    }

    #[instrument]
    pub fn find_local_branch_or_fail(&self, name: &str) -> Result<BranchRef> {
        self.find_local_branch(name)?
            .ok_or_else(|| Error::invalid_argument(format!("no such branch: {name}")))
    }

    #[instrument]
    pub fn create_branch(&self, name: &str, target: Oid, force: bool) -> Result<BranchRef> {
        let commit = self.inner.find_commit(target.inner())?;
        self.inner.branch(name, &commit, force)?;
        Ok(BranchRef {
            name: name.to_string(),
            oid: target,
        })
    }

    #[instrument]
    pub fn list_local_branch_names(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in self.inner.branches(Some(git2::BranchType::Local))? {
            let (branch, _) = entry?;
            if let Some(name) = branch.name()? {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    #[instrument]
    pub fn set_branch_target(&self, name: &str, oid: Oid, reflog_message: &str) -> Result<()> {
        let mut branch = self.inner.find_branch(name, git2::BranchType::Local)?;
        branch
            .get_mut()
            .set_target(oid.inner(), reflog_message)?;
        Ok(())
    }

    #[instrument]
    pub fn delete_branch(&self, name: &str) -> Result<()> {
        match self.inner.find_branch(name, git2::BranchType::Local) {
            Ok(mut branch) => {
                branch.delete()?;
                Ok(())
            }
            Err(source) if source.code() == git2::ErrorCode::NotFound => Ok(()),
            Err(source) => Err(source.into()),
        }
    }

    /// A branch name that does not currently exist, preferring `base`,
    /// falling back to `base-1`, `base-2`, ... (§6 "Unique temporary-branch
    /// naming").
    #[instrument]
    pub fn unique_branch_name(&self, base: &str) -> Result<String> {
        if self.find_local_branch(base)?.is_none() {
            return Ok(base.to_string());
        }
        for suffix in 1..10_000 {
            let candidate = format!("{base}-{suffix}");
            if self.find_local_branch(&candidate)?.is_none() {
                return Ok(candidate);
            }
        }
        Err(Error::invalid_argument(format!(
            "could not find a unique branch name based on {base}"
        )))
    }

    // -- Ref / HEAD ops ---------------------------------------------------

    #[instrument]
    pub fn head_oid(&self) -> Result<Option<Oid>> {
        match self.inner.head() {
            Ok(reference) => Ok(reference.target().map(Oid::from_git2)),
            Err(source) if source.code() == git2::ErrorCode::UnbornBranch => Ok(None),
            Err(source) => Err(source.into()),
        }
    }

    /// The name of the currently checked-out local branch, if HEAD is not
    /// detached.
    #[instrument]
    pub fn head_branch_name(&self) -> Result<Option<String>> {
        match self.inner.head() {
            Ok(reference) if reference.is_branch() => {
                Ok(reference.shorthand().map(|s| s.to_string()))
            }
            Ok(_) => Ok(None),
            Err(source) if source.code() == git2::ErrorCode::UnbornBranch => Ok(None),
            Err(source) => Err(source.into()),
        }
    }

    #[instrument]
    pub fn set_head_branch(&self, name: &str) -> Result<()> {
        self.inner.set_head(&format!("refs/heads/{name}"))?;
        Ok(())
    }

    #[instrument]
    pub fn is_rebase_in_progress(&self) -> bool {
        matches!(
            self.inner.state(),
            git2::RepositoryState::Rebase
                | git2::RepositoryState::RebaseInteractive
                | git2::RepositoryState::RebaseMerge
        )
    }

    // -- Merge-base & ancestry --------------------------------------------

    #[instrument]
    pub fn merge_base(&self, a: Oid, b: Oid) -> Result<Option<Oid>> {
        match self.inner.merge_base(a.inner(), b.inner()) {
            Ok(oid) => Ok(Some(Oid::from_git2(oid))),
            Err(source) if source.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(source) => Err(source.into()),
        }
    }

    /// Best common ancestor of more than two commits ("octopus" merge-base).
    #[instrument]
    pub fn merge_base_octopus(&self, oids: &[Oid]) -> Result<Option<Oid>> {
        match oids {
            [] => Ok(None),
            [single] => Ok(Some(*single)),
            _ => {
                let raw: Vec<git2::Oid> = oids.iter().map(|oid| oid.inner()).collect();
                match self.inner.merge_base_octopus(&raw) {
                    Ok(oid) => Ok(Some(Oid::from_git2(oid))),
                    Err(source) if source.code() == git2::ErrorCode::NotFound => Ok(None),
                    Err(source) => Err(source.into()),
                }
            }
        }
    }

    #[instrument]
    pub fn is_ancestor(&self, ancestor: Oid, descendant: Oid) -> Result<bool> {
        if ancestor == descendant {
            return Ok(false);
        }
        match self
            .inner
            .graph_descendant_of(descendant.inner(), ancestor.inner())
        {
            Ok(result) => Ok(result),
            Err(source) => Err(source.into()),
        }
    }

    /// Topologically sorted set of commits reachable from `heads` down to
    /// (and not including) `stop_at`, if given.
    #[instrument]
    pub fn walk_ancestors(&self, heads: &[Oid], stop_at: Option<Oid>) -> Result<Vec<Oid>> {
        let mut walk = self.inner.revwalk()?;
        walk.set_sorting(git2::Sort::TOPOLOGICAL)?;
        for &head in heads {
            walk.push(head.inner())?;
        }
        if let Some(stop_at) = stop_at {
            walk.hide(stop_at.inner())?;
        }
        let mut result = Vec::new();
        for oid in walk {
            result.push(Oid::from_git2(oid?));
        }
        Ok(result)
    }
}
