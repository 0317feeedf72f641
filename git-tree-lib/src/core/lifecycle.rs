//! `init` / `drop` / `branch` (§6): the thin operations that bring a
//! [`BranchMap`] into and out of existence and grow it by one leaf. Not a
//! numbered component in §2, but owned by the core since each is a direct
//! manipulation of C2/C3 state rather than CLI-level behavior.

use tracing::instrument;

use crate::core::branch_map::BranchMap;
use crate::core::config::TreeConfig;
use crate::core::store::{Store, StoreFile};
use crate::error::{Error, Result};
use crate::git::Repo;

fn require_initialized(store: &Store) -> Result<()> {
    if !store.is_initialized() {
        return Err(Error::NotInitialized);
    }
    Ok(())
}

/// Start tracking `branches` (or, if empty, just the configured main
/// branch) under a fresh synthetic root pointing at their merge-base.
#[instrument(skip(repo, store))]
pub fn init(repo: &Repo, store: &Store, branches: &[String]) -> Result<()> {
    if store.is_initialized() {
        return Err(Error::AlreadyInitialized);
    }

    let tracked: Vec<String> = if branches.is_empty() {
        vec![TreeConfig::main_branch_name(repo)?]
    } else {
        branches.to_vec()
    };

    let mut oids = Vec::with_capacity(tracked.len());
    for name in &tracked {
        oids.push(repo.find_local_branch_or_fail(name)?.oid);
    }
    let root_oid = repo
        .merge_base_octopus(&oids)?
        .ok_or_else(|| Error::invalid_argument("tracked branches share no common ancestor"))?;

    let root_name = TreeConfig::root_branch_name();
    repo.create_branch(root_name, root_oid, false)?;

    let map = BranchMap::from_repo(repo, root_name, &tracked)?;
    store.write(StoreFile::Branches, &map.emit())?;
    Ok(())
}

/// Stop tracking: delete the metadata store, then the synthetic root
/// branch (in that order, per SPEC_FULL §C — the root ref outlives the
/// metadata that names it until the very last step).
#[instrument(skip(repo, store))]
pub fn drop_tracking(repo: &Repo, store: &Store) -> Result<()> {
    require_initialized(store)?;
    let map = BranchMap::parse(&store.read(StoreFile::Branches)?)?;
    store.remove_all()?;
    repo.delete_branch(map.root())?;
    Ok(())
}

/// Create a new branch at `HEAD` and attach it as a child of whichever
/// tracked branch currently points at the same commit as `HEAD` (SPEC_FULL
/// §C: "attaches under the current branch, found by matching HEAD's oid").
#[instrument(skip(repo, store))]
pub fn create_branch(repo: &Repo, store: &Store, name: &str) -> Result<()> {
    require_initialized(store)?;
    let map_contents = store.read(StoreFile::Branches)?;
    let mut map = BranchMap::parse(&map_contents)?;

    let head_oid = repo
        .head_oid()?
        .ok_or_else(|| Error::invalid_argument("HEAD does not point at a commit"))?;

    let mut parent_name = None;
    for candidate in map.list_branch_names() {
        if let Some(branch) = repo.find_local_branch(&candidate)? {
            if branch.oid == head_oid {
                parent_name = Some(candidate);
                break;
            }
        }
    }
    let parent_name = parent_name.ok_or_else(|| {
        Error::invalid_argument("HEAD is not at the tip of any tracked branch")
    })?;

    repo.create_branch(name, head_oid, false)?;
    map.add_child(repo, &parent_name, name)?;
    store.write(StoreFile::Branches, &map.emit())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestRepo;

    #[test]
    fn init_tracks_main_branch_under_synthetic_root() {
        let test_repo = TestRepo::init();
        let store = Store::new(&test_repo.repo);

        init(&test_repo.repo, &store, &["master".to_string()]).unwrap();

        assert!(store.is_initialized());
        let map = BranchMap::parse(&store.read(StoreFile::Branches).unwrap()).unwrap();
        assert_eq!(map.root(), TreeConfig::root_branch_name());
        assert_eq!(map.children_of(map.root()), &["master".to_string()]);
        assert!(test_repo
            .repo
            .find_local_branch(TreeConfig::root_branch_name())
            .unwrap()
            .is_some());
    }

    #[test]
    fn init_twice_fails() {
        let test_repo = TestRepo::init();
        let store = Store::new(&test_repo.repo);
        init(&test_repo.repo, &store, &["master".to_string()]).unwrap();
        let err = init(&test_repo.repo, &store, &["master".to_string()]).unwrap_err();
        assert!(matches!(err, Error::AlreadyInitialized));
    }

    #[test]
    fn drop_removes_store_and_root_branch() {
        let test_repo = TestRepo::init();
        let store = Store::new(&test_repo.repo);
        init(&test_repo.repo, &store, &["master".to_string()]).unwrap();

        drop_tracking(&test_repo.repo, &store).unwrap();

        assert!(!store.is_initialized());
        assert!(test_repo
            .repo
            .find_local_branch(TreeConfig::root_branch_name())
            .unwrap()
            .is_none());
    }

    #[test]
    fn create_branch_attaches_under_current_branch() {
        let test_repo = TestRepo::init();
        let store = Store::new(&test_repo.repo);
        init(&test_repo.repo, &store, &["master".to_string()]).unwrap();

        create_branch(&test_repo.repo, &store, "treecko").unwrap();

        let map = BranchMap::parse(&store.read(StoreFile::Branches).unwrap()).unwrap();
        assert_eq!(map.children_of("master"), &["treecko".to_string()]);
    }
}
