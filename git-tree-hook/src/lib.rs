//! Callbacks for Git hooks, and the glue that installs/uninstalls the hook
//! scripts that invoke them.
//!
//! `git-tree` tracks rewrites (commit, amend, rebase) by having Git itself
//! call back into `git tree obsolete <hook-name>` at the relevant points.
//! This crate holds both the hook scripts' contents and the functions that
//! interpret the arguments/stdin Git hands those hooks and forward them into
//! [`tree_core::core`].

#![warn(missing_docs)]
#![warn(
    clippy::all,
    clippy::as_conversions,
    clippy::clone_on_ref_ptr,
    clippy::dbg_macro
)]

use std::io::BufRead;
use std::path::{Path, PathBuf};

use eyre::Context;
use tracing::{instrument, warn};

use tree_core::core::{
    post_commit, post_rewrite_amend, post_rewrite_rebase, pre_commit, pre_rebase, RewritePair,
    Store,
};
use tree_core::git::Repo;

/// The contents of every Git hook this crate installs, keyed by hook name.
/// Each script forwards to the hidden `obsolete` subcommand with the hook
/// name and `"$@"`; `post-rewrite` additionally forwards its rewrite-type
/// argument, which Git always supplies as `$1`.
pub const ALL_HOOKS: &[(&str, &str)] = &[
    (
        "pre-rebase",
        r#"
git tree obsolete pre-rebase "$@"
"#,
    ),
    (
        "pre-commit",
        r#"
git tree obsolete pre-commit "$@"
"#,
    ),
    (
        "post-commit",
        r#"
git tree obsolete post-commit "$@"
"#,
    ),
    (
        "post-rewrite",
        r#"
git tree obsolete post-rewrite "$@"
"#,
    ),
];

const SHEBANG: &str = "#!/bin/sh";
const UPDATE_MARKER_START: &str = "## START GIT-TREE CONFIG";
const UPDATE_MARKER_END: &str = "## END GIT-TREE CONFIG";

fn append_hook(new_lines: &mut String, hook_contents: &str) {
    new_lines.push_str(UPDATE_MARKER_START);
    new_lines.push('\n');
    new_lines.push_str(hook_contents);
    new_lines.push_str(UPDATE_MARKER_END);
    new_lines.push('\n');
}

/// Rewrite `lines` so the region between this crate's markers reads
/// `updated_lines`, leaving everything outside the markers untouched. A hook
/// script shared with another tool survives reinstalling/uninstalling ours.
fn update_between_lines(lines: &str, updated_lines: &str) -> String {
    let mut new_lines = String::new();
    let mut found_marker = false;
    let mut is_ignoring_lines = false;
    for line in lines.lines() {
        if line == UPDATE_MARKER_START {
            found_marker = true;
            is_ignoring_lines = true;
            if !updated_lines.is_empty() {
                append_hook(&mut new_lines, updated_lines);
            }
        } else if line == UPDATE_MARKER_END {
            is_ignoring_lines = false;
        } else if !is_ignoring_lines {
            new_lines.push_str(line);
            new_lines.push('\n');
        }
    }
    if is_ignoring_lines {
        warn!("unterminated git-tree config marker in hook script");
    } else if !found_marker && !updated_lines.is_empty() {
        append_hook(&mut new_lines, updated_lines);
    }
    new_lines
}

#[instrument]
fn write_script(path: &Path, contents: &str) -> eyre::Result<()> {
    let script_dir = path
        .parent()
        .ok_or_else(|| eyre::eyre!("no parent directory for {path:?}"))?;
    std::fs::create_dir_all(script_dir).wrap_err("creating hooks directory")?;
    std::fs::write(path, contents).wrap_err("writing hook script contents")?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let metadata = std::fs::metadata(path).wrap_err("reading hook script permissions")?;
        let mut permissions = metadata.permissions();
        let mode = permissions.mode() | 0o111;
        permissions.set_mode(mode);
        std::fs::set_permissions(path, permissions)
            .wrap_err_with(|| format!("marking {path:?} as executable"))?;
    }
    Ok(())
}

#[instrument]
fn update_hook_contents(path: &Path, hook_contents: &str) -> eyre::Result<()> {
    let contents = match std::fs::read_to_string(path) {
        Ok(lines) => update_between_lines(&lines, hook_contents),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            format!("{SHEBANG}\n{UPDATE_MARKER_START}\n{hook_contents}{UPDATE_MARKER_END}\n")
        }
        Err(err) => return Err(err.into()),
    };
    write_script(path, &contents)
}

fn hooks_dir(repo: &Repo) -> PathBuf {
    repo.git_dir().join("hooks")
}

/// Install (or update in place) every hook script in [`ALL_HOOKS`].
#[instrument(skip(repo))]
pub fn install_hooks(repo: &Repo) -> eyre::Result<()> {
    let dir = hooks_dir(repo);
    for (hook_name, hook_script) in ALL_HOOKS {
        update_hook_contents(&dir.join(hook_name), hook_script)?;
    }
    Ok(())
}

/// Remove this crate's marked region from every installed hook script,
/// leaving any other tool's hooks (and empty shebang-only files) in place.
#[instrument(skip(repo))]
pub fn uninstall_hooks(repo: &Repo) -> eyre::Result<()> {
    let dir = hooks_dir(repo);
    for (hook_name, _) in ALL_HOOKS {
        let path = dir.join(hook_name);
        match std::fs::read_to_string(&path) {
            Ok(lines) => write_script(&path, &update_between_lines(&lines, ""))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}

/// Parse the `old-oid SP new-oid` lines Git's `post-rewrite` hook supplies
/// on stdin (a third, space-separated "extra info" field, used only for
/// `git rebase --rebase-merges`, is ignored).
fn parse_rewrite_pairs(input: impl BufRead) -> eyre::Result<Vec<RewritePair>> {
    let mut pairs = Vec::new();
    for line in input.lines() {
        let line = line.wrap_err("reading post-rewrite stdin")?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.split_whitespace();
        let old = parts
            .next()
            .ok_or_else(|| eyre::eyre!("post-rewrite line missing old oid: {line:?}"))?
            .parse()
            .map_err(|err| eyre::eyre!("{err}"))?;
        let new = parts
            .next()
            .ok_or_else(|| eyre::eyre!("post-rewrite line missing new oid: {line:?}"))?
            .parse()
            .map_err(|err| eyre::eyre!("{err}"))?;
        pairs.push(RewritePair { old, new });
    }
    Ok(pairs)
}

/// Handle Git's `pre-rebase` hook.
#[instrument(skip(store))]
pub fn run_pre_rebase(store: &Store) -> eyre::Result<()> {
    pre_rebase(store).wrap_err("pre-rebase hook")
}

/// Handle Git's `pre-commit` hook.
#[instrument(skip(repo, store))]
pub fn run_pre_commit(repo: &Repo, store: &Store) -> eyre::Result<()> {
    pre_commit(repo, store).wrap_err("pre-commit hook")
}

/// Handle Git's `post-commit` hook.
#[instrument(skip(repo, store))]
pub fn run_post_commit(repo: &Repo, store: &Store) -> eyre::Result<()> {
    post_commit(repo, store).wrap_err("post-commit hook")
}

/// Handle Git's `post-rewrite` hook: `rewrite_type` is Git's `$1` (`"amend"`
/// or `"rebase"`); `input` is its stdin, one `old new` pair per line.
#[instrument(skip(repo, store, input))]
pub fn run_post_rewrite(
    repo: &Repo,
    store: &Store,
    rewrite_type: &str,
    input: impl BufRead,
) -> eyre::Result<()> {
    let pairs = parse_rewrite_pairs(input)?;
    match rewrite_type {
        "amend" => post_rewrite_amend(repo, store, &pairs).wrap_err("post-rewrite.amend hook"),
        "rebase" => post_rewrite_rebase(repo, store, &pairs).wrap_err("post-rewrite.rebase hook"),
        other => Err(eyre::eyre!("unrecognized post-rewrite type: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_between_lines_inserts_once_and_is_idempotent() {
        let empty = "";
        let installed = update_between_lines(empty, "git tree obsolete pre-commit \"$@\"\n");
        assert!(installed.contains(UPDATE_MARKER_START));
        assert!(installed.contains("git tree obsolete pre-commit"));

        let reinstalled = update_between_lines(&installed, "git tree obsolete pre-commit \"$@\"\n");
        assert_eq!(installed, reinstalled);
    }

    #[test]
    fn update_between_lines_preserves_foreign_content() {
        let existing = "#!/bin/sh\necho from another tool\n";
        let installed = update_between_lines(existing, "git tree obsolete pre-commit \"$@\"\n");
        assert!(installed.contains("echo from another tool"));
        assert!(installed.contains("git tree obsolete pre-commit"));

        let uninstalled = update_between_lines(&installed, "");
        assert_eq!(uninstalled, "#!/bin/sh\necho from another tool\n");
    }

    #[test]
    fn parse_rewrite_pairs_reads_two_columns() {
        let input = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb\n";
        let pairs = parse_rewrite_pairs(input.as_bytes()).unwrap();
        assert_eq!(pairs.len(), 1);
    }
}
