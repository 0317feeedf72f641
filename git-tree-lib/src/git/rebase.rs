//! The tri-state rebase primitive described in §4.1: the VCS Adapter
//! normalizes libgit2's signal-via-error rebase API into
//! `Success | MergeConflict | UnstagedChanges | Error`.

use tracing::instrument;

use crate::error::{Error, Result};
use crate::git::oid::Oid;
use crate::git::repo::Repo;

/// Outcome of driving a rebase (or part of one) to completion.
#[derive(Debug)]
pub enum RebaseOutcome {
    /// Every operation applied cleanly and the rebase finished.
    Success,
    /// Applying a pick produced conflicting index entries. The rebase is
    /// left in progress; the caller is expected to checkpoint.
    MergeConflict {
        /// The original (pre-rebase) oid of the commit being applied.
        commit: Oid,
    },
    /// `continue` was invoked before conflict resolutions were staged.
    UnstagedChanges,
}

/// Initialize a rebase of `branch_to_move` (by name) with upstream
/// `upstream` onto `onto`, and drive it to completion or the first conflict.
///
/// On success the named branch is updated in place by libgit2's
/// `rebase.finish()` (it was registered as the rebase's `branch` via
/// `reference_to_annotated_commit`, which makes libgit2 remember and update
/// the ref). Callers must still re-read the branch by name afterwards: see
/// "Design Notes" in the spec about not trusting stale handles.
#[instrument(skip(repo))]
pub fn init_and_run_rebase(
    repo: &Repo,
    branch_to_move: &str,
    upstream: Option<Oid>,
    onto: Oid,
) -> Result<RebaseOutcome> {
    let branch_ref = repo
        .inner
        .find_branch(branch_to_move, git2::BranchType::Local)?
        .into_reference();
    let branch_annotated = repo.inner.reference_to_annotated_commit(&branch_ref)?;
    let upstream_annotated = upstream
        .map(|oid| repo.inner.find_annotated_commit(oid.into()))
        .transpose()?;
    let onto_annotated = repo.inner.find_annotated_commit(onto.into())?;

    let mut rebase = repo.inner.rebase(
        Some(&branch_annotated),
        upstream_annotated.as_ref(),
        Some(&onto_annotated),
        None,
    )?;

    drive_rebase_to_completion(repo, &mut rebase)
}

/// Resume a rebase that libgit2 already has open on disk (after the caller
/// has committed the currently in-progress pick's resolution).
#[instrument(skip(repo))]
pub fn continue_rebase(repo: &Repo) -> Result<RebaseOutcome> {
    let mut rebase = repo.inner.open_rebase(None)?;

    match commit_current_operation(repo, &mut rebase) {
        Ok(CommitOutcome::Committed) => {}
        Ok(CommitOutcome::UnstagedChanges) => return Ok(RebaseOutcome::UnstagedChanges),
        Ok(CommitOutcome::NoCurrentOperation) => {}
        Err(err) => return Err(err),
    }

    drive_rebase_to_completion(repo, &mut rebase)
}

/// Abort a rebase that libgit2 has open on disk, restoring the pre-rebase
/// `HEAD` and working tree.
#[instrument(skip(repo))]
pub fn abort_rebase(repo: &Repo) -> Result<()> {
    let mut rebase = repo.inner.open_rebase(None)?;
    rebase.abort()?;
    Ok(())
}

enum CommitOutcome {
    Committed,
    UnstagedChanges,
    NoCurrentOperation,
}

/// Commit the resolution of whichever pick libgit2 considers "current"
/// (the one that produced the most recent conflict), re-using that
/// original commit's author/committer/message as §4.5 "Continue" requires.
fn commit_current_operation(repo: &Repo, rebase: &mut git2::Rebase<'_>) -> Result<CommitOutcome> {
    let current_index = match rebase.operation_current() {
        Some(index) => index,
        None => return Ok(CommitOutcome::NoCurrentOperation),
    };
    let op_oid = rebase.operation_at(current_index).id();
    let original_commit = repo.inner.find_commit(op_oid)?;
    let author = original_commit.author();
    let committer = original_commit.committer();
    let message = original_commit.message_raw().map(|s| s.to_owned());

    match rebase.commit(Some(&author), &committer, message.as_deref()) {
        Ok(_new_oid) => Ok(CommitOutcome::Committed),
        Err(source) if is_unstaged_changes(&source) => Ok(CommitOutcome::UnstagedChanges),
        Err(source) => Err(source.into()),
    }
}

fn is_unstaged_changes(err: &git2::Error) -> bool {
    matches!(
        err.code(),
        git2::ErrorCode::Unmerged | git2::ErrorCode::Conflict
    )
}

fn drive_rebase_to_completion(repo: &Repo, rebase: &mut git2::Rebase<'_>) -> Result<RebaseOutcome> {
    loop {
        let operation = match rebase.next() {
            None => break,
            Some(Ok(operation)) => operation,
            Some(Err(source)) => return Err(source.into()),
        };
        let op_oid = Oid::from_git2(operation.id());

        if repo.inner.index()?.has_conflicts() {
            return Ok(RebaseOutcome::MergeConflict { commit: op_oid });
        }

        let original_commit = repo.inner.find_commit(operation.id())?;
        let author = original_commit.author();
        let committer = original_commit.committer();
        let message = original_commit.message_raw().map(|s| s.to_owned());

        match rebase.commit(Some(&author), &committer, message.as_deref()) {
            Ok(_new_oid) => continue,
            Err(source) if is_unstaged_changes(&source) => {
                return Ok(RebaseOutcome::MergeConflict { commit: op_oid })
            }
            Err(source) => return Err(Error::from(source)),
        }
    }

    rebase.finish(None)?;
    Ok(RebaseOutcome::Success)
}
