//! Obsolescence log (§4.6, C6): an append-only journal of commit-rewrite
//! events, partitioned into actions, fed by five host hook entry points.

use tracing::instrument;

use crate::error::{Error, Result};
use crate::git::{parse_optional_oid, render_optional_oid, Oid, Repo};

use super::store::{Store, StoreFile};

/// The kind of host operation that produced an [`Action`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Commit,
    Amend,
    Rebase,
    Unknown,
}

impl ActionKind {
    fn as_str(self) -> &'static str {
        match self {
            ActionKind::Commit => "commit",
            ActionKind::Amend => "amend",
            ActionKind::Rebase => "rebase",
            ActionKind::Unknown => "unknown",
        }
    }

    fn parse(value: &str) -> Result<Self> {
        match value {
            "commit" => Ok(ActionKind::Commit),
            "amend" => Ok(ActionKind::Amend),
            "rebase" => Ok(ActionKind::Rebase),
            "unknown" => Ok(ActionKind::Unknown),
            other => Err(Error::malformed(
                "obsmap",
                format!("unrecognized action kind: {other}"),
            )),
        }
    }
}

/// Which hook produced an [`Entry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookSource {
    PostRewriteAmend,
    PostRewriteRebase,
    PostCommit,
    Unknown,
}

impl HookSource {
    fn as_str(self) -> &'static str {
        match self {
            HookSource::PostRewriteAmend => "post-rewrite.amend",
            HookSource::PostRewriteRebase => "post-rewrite.rebase",
            HookSource::PostCommit => "post-commit",
            HookSource::Unknown => "unknown",
        }
    }

    fn parse(value: &str) -> Result<Self> {
        match value {
            "post-rewrite.amend" => Ok(HookSource::PostRewriteAmend),
            "post-rewrite.rebase" => Ok(HookSource::PostRewriteRebase),
            "post-commit" => Ok(HookSource::PostCommit),
            "unknown" => Ok(HookSource::Unknown),
            other => Err(Error::malformed(
                "obsmap",
                format!("unrecognized hook source: {other}"),
            )),
        }
    }
}

/// `(obsolete-oid, obsoleter-oid, hook-source)` (§3 "Obsolescence log").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Entry {
    pub obsolete: Oid,
    pub obsoleter: Oid,
    pub source: HookSource,
}

/// One host operation's worth of rewrites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub kind: ActionKind,
    pub entries: Vec<Entry>,
}

impl Action {
    fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            entries: Vec::new(),
        }
    }
}

/// A raw `(old, new)` oid pair as passed by a `post-rewrite.*` hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewritePair {
    pub old: Oid,
    pub new: Oid,
}

/// The full ordered sequence of actions (§3, §4.6).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObsolescenceLog {
    pub actions: Vec<Action>,
}

impl ObsolescenceLog {
    /// Load the log from the store, or an empty log if `obsmap` is absent.
    #[instrument(skip(store))]
    pub fn load(store: &Store) -> Result<Self> {
        match store.read_optional(StoreFile::ObsMap)? {
            Some(contents) => Self::parse(&contents),
            None => Ok(Self::default()),
        }
    }

    #[instrument(skip(self, store))]
    pub fn save(&self, store: &Store) -> Result<()> {
        store.write(StoreFile::ObsMap, &self.emit())
    }

    pub fn emit(&self) -> String {
        let mut lines = Vec::new();
        for action in &self.actions {
            lines.push(format!("action {}", action.kind.as_str()));
            for entry in &action.entries {
                lines.push(format!(
                    "{} {} {}",
                    entry.obsolete,
                    entry.obsoleter,
                    entry.source.as_str()
                ));
            }
        }
        lines.join("\n")
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let mut actions: Vec<Action> = Vec::new();
        for line in contents.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(kind_str) = line.strip_prefix("action ") {
                actions.push(Action::new(ActionKind::parse(kind_str.trim())?));
                continue;
            }
            let mut parts = line.split_whitespace();
            let obsolete: Oid = parts
                .next()
                .ok_or_else(|| Error::malformed("obsmap", "entry line missing obsolete oid"))?
                .parse()?;
            let obsoleter: Oid = parts
                .next()
                .ok_or_else(|| Error::malformed("obsmap", "entry line missing obsoleter oid"))?
                .parse()?;
            let source = HookSource::parse(
                parts
                    .next()
                    .ok_or_else(|| Error::malformed("obsmap", "entry line missing hook source"))?,
            )?;
            let action = actions.last_mut().ok_or_else(|| {
                Error::malformed("obsmap", "entry line appears before any action header")
            })?;
            action.entries.push(Entry {
                obsolete,
                obsoleter,
                source,
            });
        }
        Ok(Self { actions })
    }

    fn last_action_or_push(&mut self, fallback: ActionKind) -> &mut Action {
        if self.actions.is_empty() {
            self.actions.push(Action::new(fallback));
        }
        self.actions.last_mut().expect("just ensured non-empty")
    }
}

// -- Hook entry points (§4.6) --------------------------------------------

/// `pre-rebase` hook: append a new REBASE action with no entries yet.
#[instrument(skip(store))]
pub fn pre_rebase(store: &Store) -> Result<()> {
    let mut log = ObsolescenceLog::load(store)?;
    log.actions.push(Action::new(ActionKind::Rebase));
    log.save(store)
}

/// `pre-commit` hook: snapshot the commit that HEAD's current tip descends
/// from, so `post_commit` can tell a plain commit from an amend.
#[instrument(skip(repo, store))]
pub fn pre_commit(repo: &Repo, store: &Store) -> Result<()> {
    let parent = match repo.head_oid()? {
        Some(head_oid) => repo.find_commit(head_oid)?.parent_oids.first().copied(),
        None => None,
    };
    store.write(StoreFile::PreCommitParent, &render_optional_oid(parent))?;

    if !repo.is_rebase_in_progress() {
        let mut log = ObsolescenceLog::load(store)?;
        log.actions.push(Action::new(ActionKind::Commit));
        log.save(store)?;
    }
    Ok(())
}

/// `post-rewrite.amend` hook: validate `pairs`, re-label the last action to
/// AMEND if it is currently a plain COMMIT, and append entries to it.
#[instrument(skip(repo, store, pairs))]
pub fn post_rewrite_amend(repo: &Repo, store: &Store, pairs: &[RewritePair]) -> Result<()> {
    validate_pairs(repo, pairs)?;

    let mut log = ObsolescenceLog::load(store)?;
    {
        let action = log.last_action_or_push(ActionKind::Amend);
        if action.kind == ActionKind::Commit {
            action.kind = ActionKind::Amend;
        }
        for pair in pairs {
            action.entries.push(Entry {
                obsolete: pair.old,
                obsoleter: pair.new,
                source: HookSource::PostRewriteAmend,
            });
        }
    }
    log.save(store)
}

/// `post-rewrite.rebase` hook: validate `pairs` and append entries to the
/// last action (always REBASE, created by `pre_rebase`).
#[instrument(skip(repo, store, pairs))]
pub fn post_rewrite_rebase(repo: &Repo, store: &Store, pairs: &[RewritePair]) -> Result<()> {
    validate_pairs(repo, pairs)?;

    let mut log = ObsolescenceLog::load(store)?;
    {
        let action = log.last_action_or_push(ActionKind::Rebase);
        for pair in pairs {
            action.entries.push(Entry {
                obsolete: pair.old,
                obsoleter: pair.new,
                source: HookSource::PostRewriteRebase,
            });
        }
    }
    log.save(store)
}

/// `post-commit` hook: if HEAD's current first-parent differs from the
/// value `pre_commit` recorded, a new commit (not an amend) was made;
/// append `(new-head's-parent, new-head)` to the last action — the parent is
/// the commit the new HEAD actually superseded as the branch tip. Either
/// way, delete `pre-commit-parent`.
#[instrument(skip(repo, store))]
pub fn post_commit(repo: &Repo, store: &Store) -> Result<()> {
    let recorded = store
        .read_optional(StoreFile::PreCommitParent)?
        .map(|value| parse_optional_oid(&value))
        .transpose()?
        .flatten();
    store.delete(StoreFile::PreCommitParent)?;

    let new_head = match repo.head_oid()? {
        Some(oid) => oid,
        None => return Ok(()),
    };
    let current_parent = repo.find_commit(new_head)?.parent_oids.first().copied();

    if current_parent == recorded {
        // Same parent before and after: this was an amend, not a new commit.
        return Ok(());
    }
    let Some(obsoleted) = current_parent else {
        // The new commit has no parent; nothing was superseded.
        return Ok(());
    };

    let mut log = ObsolescenceLog::load(store)?;
    {
        let action = log.last_action_or_push(ActionKind::Commit);
        action.entries.push(Entry {
            obsolete: obsoleted,
            obsoleter: new_head,
            source: HookSource::PostCommit,
        });
    }
    log.save(store)
}

fn validate_pairs(repo: &Repo, pairs: &[RewritePair]) -> Result<()> {
    for pair in pairs {
        if !repo.commit_exists(pair.old) {
            return Err(Error::invalid_argument(format!(
                "no such commit: {}",
                pair.old
            )));
        }
        if !repo.commit_exists(pair.new) {
            return Err(Error::invalid_argument(format!(
                "no such commit: {}",
                pair.new
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestRepo;

    #[test]
    fn emit_parse_round_trip() {
        let test_repo = TestRepo::init();
        let head = test_repo.repo.head_oid().unwrap().unwrap();
        let mut log = ObsolescenceLog::default();
        log.actions.push(Action::new(ActionKind::Rebase));
        log.actions.push(Action {
            kind: ActionKind::Amend,
            entries: vec![Entry {
                obsolete: head,
                obsoleter: head,
                source: HookSource::PostRewriteAmend,
            }],
        });
        let parsed = ObsolescenceLog::parse(&log.emit()).unwrap();
        assert_eq!(parsed, log);
    }

    #[test]
    fn post_commit_detects_amend_vs_new_commit() {
        let test_repo = TestRepo::init();
        let store = Store::new(&test_repo.repo);

        pre_commit(&test_repo.repo, &store).unwrap();
        test_repo.commit_file("treecko", "treecko");
        post_commit(&test_repo.repo, &store).unwrap();

        let log = ObsolescenceLog::load(&store).unwrap();
        assert_eq!(log.actions.len(), 1);
        assert_eq!(log.actions[0].kind, ActionKind::Commit);
        assert_eq!(log.actions[0].entries.len(), 1);
        assert_eq!(log.actions[0].entries[0].source, HookSource::PostCommit);
        assert!(!store.exists(StoreFile::PreCommitParent));
    }

    #[test]
    fn post_commit_suppressed_for_amend() {
        let test_repo = TestRepo::init();
        let store = Store::new(&test_repo.repo);
        test_repo.checkout_new_branch("treecko");
        test_repo.commit_file("treecko", "treecko");

        pre_commit(&test_repo.repo, &store).unwrap();
        // Simulate `git commit --amend`: new commit, same parent as before.
        let head = test_repo.repo.head_oid().unwrap().unwrap();
        let parent = test_repo.repo.find_commit(head).unwrap().only_parent().unwrap();
        test_repo
            .repo
            .inner
            .set_head_detached(parent.inner())
            .unwrap();
        test_repo.commit_file("treecko", "treecko-amended");
        test_repo.repo.set_branch_target(
            "treecko",
            test_repo.repo.head_oid().unwrap().unwrap(),
            "amend",
        ).unwrap();
        test_repo.repo.set_head_branch("treecko").unwrap();
        post_commit(&test_repo.repo, &store).unwrap();

        let log = ObsolescenceLog::load(&store).unwrap();
        assert!(log.actions.is_empty() || log.actions[0].entries.is_empty());
    }
}
