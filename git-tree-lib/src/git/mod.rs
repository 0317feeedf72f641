//! The VCS Adapter (§4.1): everything the core needs from the underlying
//! Git repository, and nothing else.

mod oid;
mod rebase;
mod repo;

pub use oid::{parse_optional_oid, render_optional_oid, Oid};
pub use rebase::{abort_rebase, continue_rebase, init_and_run_rebase, RebaseOutcome};
pub use repo::{BranchRef, CommitInfo, Repo};
