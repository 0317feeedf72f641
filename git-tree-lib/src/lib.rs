//! Support library for `git-tree`: stacked-branch tracking, a recursive
//! resumable subtree rebase, an obsolescence log fed by host hooks, and an
//! evolve engine that repairs descendant branches after history rewrites.
//!
//! This crate owns correctness (§1-§9 of the design); the `git-tree` and
//! `git-tree-hook` crates are thin wiring around it.

#![warn(missing_docs)]
#![warn(
    clippy::all,
    clippy::as_conversions,
    clippy::clone_on_ref_ptr,
    clippy::dbg_macro
)]
#![allow(clippy::too_many_arguments)]

pub mod core;
pub mod error;
pub mod git;
pub mod testing;
