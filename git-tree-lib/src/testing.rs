//! Testing utilities shared by unit tests across this crate, modeled on
//! `git-branchless-lib`'s own `testing` module: a disposable repository with
//! a convenience method for creating the "branch named after the file it
//! commits" fixtures used throughout the specification's scenarios.

use std::fs;

use tempfile::TempDir;

use crate::git::{Oid, Repo};

const DUMMY_NAME: &str = "Testy McTestface";
const DUMMY_EMAIL: &str = "test@example.com";

/// A throwaway Git repository, deleted when dropped.
pub struct TestRepo {
    pub repo: Repo,
    _temp_dir: TempDir,
}

impl TestRepo {
    /// Create a fresh repository with one initial commit on `master`.
    pub fn init() -> Self {
        let temp_dir = tempfile::tempdir().expect("creating temp dir");
        let git2_repo =
            git2::Repository::init(temp_dir.path()).expect("initializing test repository");
        {
            let mut config = git2_repo.config().expect("opening repo config");
            config.set_str("user.name", DUMMY_NAME).unwrap();
            config.set_str("user.email", DUMMY_EMAIL).unwrap();
        }

        let repo = Repo::open(temp_dir.path()).expect("opening test repository");
        let test_repo = Self {
            repo,
            _temp_dir: temp_dir,
        };
        test_repo.commit_file("initial", "initial");
        test_repo
            .repo
            .inner
            .set_head("refs/heads/master")
            .expect("setting initial HEAD");
        test_repo
    }

    /// Path to the repository's working directory.
    pub fn path(&self) -> &std::path::Path {
        self.repo.workdir().expect("test repo has a workdir")
    }

    /// Write a file named `name` with contents `contents`, stage it, and
    /// commit it onto the currently-checked-out branch (or onto an unborn
    /// `master` for the very first commit) with message `name`.
    ///
    /// This matches the fixture convention used by the specification's
    /// end-to-end scenarios: "name" means create branch at HEAD, commit a
    /// file named `name` with contents `name` and message `name`.
    pub fn commit_file(&self, name: &str, contents: &str) -> Oid {
        let git2_repo = &self.repo.inner;
        let workdir = git2_repo.workdir().expect("test repo has a workdir");
        fs::write(workdir.join(name), contents).expect("writing fixture file");

        let mut index = git2_repo.index().expect("opening index");
        index.add_path(std::path::Path::new(name)).unwrap();
        index.write().unwrap();
        let tree_oid = index.write_tree().unwrap();
        let tree = git2_repo.find_tree(tree_oid).unwrap();

        let signature = git2::Signature::now(DUMMY_NAME, DUMMY_EMAIL).unwrap();
        let parents = match git2_repo.head() {
            Ok(head) => vec![head.peel_to_commit().unwrap()],
            Err(_) => vec![],
        };
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();

        let oid = git2_repo
            .commit(
                Some("HEAD"),
                &signature,
                &signature,
                name,
                &tree,
                &parent_refs,
            )
            .expect("creating commit");
        Oid::from(oid)
    }

    /// Create a new branch at HEAD and check it out, as if the user ran
    /// `git checkout -b <name>`.
    pub fn checkout_new_branch(&self, name: &str) {
        let git2_repo = &self.repo.inner;
        let head_commit = git2_repo.head().unwrap().peel_to_commit().unwrap();
        git2_repo.branch(name, &head_commit, false).unwrap();
        git2_repo
            .set_head(&format!("refs/heads/{name}"))
            .expect("checking out new branch");
    }

    /// Detach HEAD at `oid`, as if the user ran `git checkout <oid>`. Used
    /// to simulate the mid-amend state Git itself passes through.
    pub fn checkout_detached(&self, oid: Oid) {
        self.repo
            .inner
            .set_head_detached(oid.inner())
            .expect("detaching HEAD");
    }
}
