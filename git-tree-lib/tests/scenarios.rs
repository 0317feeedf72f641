//! End-to-end scenarios reproduced from the specification's worked examples:
//! branch-map persistence format, a clean rebase-tree, and the
//! commit/amend discrimination in the obsolescence log.

use tree_core::core::{
    create_branch, init, post_commit, post_rewrite_amend, pre_commit, rebase_tree, ActionKind,
    BranchMap, ObsolescenceLog, RewritePair, Store, StoreFile,
};
use tree_core::testing::TestRepo;

/// S1 — branch-map persisted format.
#[test]
fn branch_map_persisted_format_matches_dfs_preorder() {
    let test_repo = TestRepo::init();
    let store = Store::new(&test_repo.repo);

    init(&test_repo.repo, &store, &["master".to_string()]).unwrap();

    test_repo.checkout_new_branch("mew");
    test_repo.commit_file("mew", "mew");
    create_branch(&test_repo.repo, &store, "mew").unwrap();

    test_repo.checkout_new_branch("burmy");
    test_repo.commit_file("burmy", "burmy");
    create_branch(&test_repo.repo, &store, "burmy").unwrap();
    test_repo.commit_file("wormadam", "wormadam");
    create_branch(&test_repo.repo, &store, "wormadam").unwrap();
    test_repo.repo.set_head_branch("burmy").unwrap();
    test_repo.commit_file("mothim", "mothim");
    create_branch(&test_repo.repo, &store, "mothim").unwrap();

    test_repo.repo.set_head_branch("mew").unwrap();
    test_repo.checkout_new_branch("wurmple");
    test_repo.commit_file("wurmple", "wurmple");
    create_branch(&test_repo.repo, &store, "wurmple").unwrap();
    test_repo.checkout_new_branch("cascoon");
    test_repo.commit_file("cascoon", "cascoon");
    create_branch(&test_repo.repo, &store, "cascoon").unwrap();
    test_repo.commit_file("dustox", "dustox");
    create_branch(&test_repo.repo, &store, "dustox").unwrap();
    test_repo.repo.set_head_branch("wurmple").unwrap();
    test_repo.checkout_new_branch("silcoon");
    test_repo.commit_file("silcoon", "silcoon");
    create_branch(&test_repo.repo, &store, "silcoon").unwrap();
    test_repo.commit_file("beautifly", "beautifly");
    create_branch(&test_repo.repo, &store, "beautifly").unwrap();

    let map = BranchMap::parse(&store.read(StoreFile::Branches).unwrap()).unwrap();
    assert_eq!(map.children_of("git-tree-root"), &["master".to_string()]);
    assert_eq!(map.children_of("master"), &["mew".to_string()]);
    assert_eq!(
        map.children_of("mew"),
        &["burmy".to_string(), "wurmple".to_string()]
    );
    assert_eq!(
        map.children_of("burmy"),
        &["wormadam".to_string(), "mothim".to_string()]
    );
    assert_eq!(
        map.children_of("wurmple"),
        &["cascoon".to_string(), "silcoon".to_string()]
    );
    assert_eq!(map.children_of("cascoon"), &["dustox".to_string()]);
    assert_eq!(map.children_of("silcoon"), &["beautifly".to_string()]);
}

/// S2 — single-child rebase.
#[test]
fn single_child_rebase_reparents_and_reapplies() {
    let test_repo = TestRepo::init();
    let store = Store::new(&test_repo.repo);
    init(&test_repo.repo, &store, &["master".to_string()]).unwrap();

    test_repo.checkout_new_branch("mew");
    test_repo.commit_file("mew", "mew");
    create_branch(&test_repo.repo, &store, "mew").unwrap();

    test_repo.checkout_new_branch("treecko");
    test_repo.commit_file("treecko", "treecko");
    create_branch(&test_repo.repo, &store, "treecko").unwrap();

    test_repo.repo.set_head_branch("mew").unwrap();
    test_repo.checkout_new_branch("mudkip");
    test_repo.commit_file("mudkip", "mudkip");
    create_branch(&test_repo.repo, &store, "mudkip").unwrap();

    let pre_rebase_oid = test_repo
        .repo
        .find_local_branch("treecko")
        .unwrap()
        .unwrap()
        .oid;

    rebase_tree(&test_repo.repo, &store, "treecko", "mudkip").unwrap();

    let map = BranchMap::parse(&store.read(StoreFile::Branches).unwrap()).unwrap();
    assert!(map.is_parent("mudkip", "treecko"));
    assert!(!map.is_parent("mew", "treecko"));

    let post_rebase = test_repo
        .repo
        .find_local_branch("treecko")
        .unwrap()
        .unwrap();
    assert_ne!(post_rebase.oid, pre_rebase_oid, "commit should be re-applied with a new id");

    let mudkip_oid = test_repo
        .repo
        .find_local_branch("mudkip")
        .unwrap()
        .unwrap()
        .oid;
    assert!(test_repo
        .repo
        .is_ancestor(mudkip_oid, post_rebase.oid)
        .unwrap());
}

/// S5 — obsolete-amend sequence.
#[test]
fn obsolete_amend_sequence_relabels_commit_to_amend() {
    let test_repo = TestRepo::init();
    let store = Store::new(&test_repo.repo);
    test_repo.checkout_new_branch("treecko");
    test_repo.commit_file("treecko", "treecko");
    let old_oid = test_repo.repo.head_oid().unwrap().unwrap();

    pre_commit(&test_repo.repo, &store).unwrap();

    // Simulate `--amend` producing a new commit id at the same position.
    let grandparent = test_repo
        .repo
        .find_commit(old_oid)
        .unwrap()
        .only_parent()
        .unwrap();
    test_repo.checkout_detached(grandparent);
    test_repo.commit_file("treecko", "treecko-amended");
    let new_oid = test_repo.repo.head_oid().unwrap().unwrap();
    test_repo
        .repo
        .set_branch_target("treecko", new_oid, "amend")
        .unwrap();
    test_repo.repo.set_head_branch("treecko").unwrap();

    post_rewrite_amend(
        &test_repo.repo,
        &store,
        &[RewritePair {
            old: old_oid,
            new: new_oid,
        }],
    )
    .unwrap();

    let log = ObsolescenceLog::load(&store).unwrap();
    assert_eq!(log.actions.len(), 1);
    assert_eq!(log.actions[0].kind, ActionKind::Amend);
    assert_eq!(log.actions[0].entries.len(), 1);
    assert_eq!(log.actions[0].entries[0].obsolete, old_oid);
    assert_eq!(log.actions[0].entries[0].obsoleter, new_oid);
}

/// S6 — obsolete-commit vs amend discrimination: a real new commit is
/// recorded, but an amend (no net parent change) is not.
#[test]
fn obsolete_commit_records_only_real_new_commits() {
    let test_repo = TestRepo::init();
    let store = Store::new(&test_repo.repo);
    test_repo.checkout_new_branch("treecko");
    test_repo.commit_file("treecko", "treecko");
    let parent_oid = test_repo.repo.head_oid().unwrap().unwrap();

    pre_commit(&test_repo.repo, &store).unwrap();
    test_repo.commit_file("grovyle", "grovyle");
    let new_head = test_repo.repo.head_oid().unwrap().unwrap();
    post_commit(&test_repo.repo, &store).unwrap();

    let log = ObsolescenceLog::load(&store).unwrap();
    assert_eq!(log.actions.len(), 1);
    assert_eq!(log.actions[0].entries.len(), 1);
    assert_eq!(log.actions[0].entries[0].obsolete, parent_oid);
    assert_eq!(log.actions[0].entries[0].obsoleter, new_head);
}
