//! Metadata Store (§4.2, C2): atomic, overwrite-with-create text I/O for the
//! files under `<git_dir>/tree/`.

use std::fs;
use std::path::PathBuf;

use tracing::instrument;

use crate::error::{Error, Result};
use crate::git::Repo;

/// One of the fixed files this crate persists under `<git_dir>/tree/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreFile {
    /// The serialized `BranchMap` (§4.3 "Persistence format").
    Branches,
    /// The serialized obsolescence log (§4.6).
    ObsMap,
    /// HEAD's first-parent oid as of the last `pre-commit` hook, or `null`.
    PreCommitParent,
    /// Empty marker file: its existence is the sole persistent indicator of
    /// the `CONFLICTED` rebase-tree state (§4.5 "State machine").
    Rebasing,
    /// The source branch name of the in-progress rebase-tree.
    RebasingSource,
    /// The destination branch name of the in-progress rebase-tree.
    RebasingDest,
    /// The `temp-name original-name` mapping of the in-progress rebase-tree.
    RebasingTemps,
}

impl StoreFile {
    fn file_name(self) -> &'static str {
        match self {
            StoreFile::Branches => "branches",
            StoreFile::ObsMap => "obsmap",
            StoreFile::PreCommitParent => "pre-commit-parent",
            StoreFile::Rebasing => "rebasing",
            StoreFile::RebasingSource => "rebasing-source",
            StoreFile::RebasingDest => "rebasing-dest",
            StoreFile::RebasingTemps => "rebasing-temps",
        }
    }
}

/// Handle onto the `<git_dir>/tree/` directory of a repository.
#[derive(Debug, Clone)]
pub struct Store {
    dir: PathBuf,
}

impl Store {
    pub fn new(repo: &Repo) -> Self {
        Self {
            dir: repo.tree_dir(),
        }
    }

    pub fn path(&self, file: StoreFile) -> PathBuf {
        self.dir.join(file.file_name())
    }

    /// Whether the store directory exists at all, i.e. whether `init` has
    /// run.
    pub fn is_initialized(&self) -> bool {
        self.dir.join(StoreFile::Branches.file_name()).exists()
    }

    pub fn exists(&self, file: StoreFile) -> bool {
        self.path(file).exists()
    }

    /// Overwrite-with-create: write `contents` to `file`, creating the
    /// `tree/` directory if it does not exist. A single trailing newline is
    /// appended regardless of whether `contents` has one.
    #[instrument(skip(self, contents))]
    pub fn write(&self, file: StoreFile, contents: &str) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|source| Error::io(source, self.dir.clone()))?;
        let path = self.path(file);
        let normalized = format!("{}\n", contents.trim_end_matches('\n'));
        fs::write(&path, normalized).map_err(|source| Error::io(source, path))
    }

    /// Read `file`, stripping exactly the trailing newline(s) left by
    /// [`Store::write`]. Returns an error if the file does not exist;
    /// callers that expect the file to be optional should check
    /// [`Store::exists`] first.
    #[instrument(skip(self))]
    pub fn read(&self, file: StoreFile) -> Result<String> {
        let path = self.path(file);
        let contents = fs::read_to_string(&path).map_err(|source| Error::io(source, path))?;
        Ok(contents.trim_end_matches('\n').to_string())
    }

    /// Read `file` if present, returning `None` if it does not exist.
    #[instrument(skip(self))]
    pub fn read_optional(&self, file: StoreFile) -> Result<Option<String>> {
        if self.exists(file) {
            Ok(Some(self.read(file)?))
        } else {
            Ok(None)
        }
    }

    /// Delete `file`; a no-op if it is already absent.
    #[instrument(skip(self))]
    pub fn delete(&self, file: StoreFile) -> Result<()> {
        let path = self.path(file);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(Error::io(source, path)),
        }
    }

    /// Remove the entire `tree/` directory (used by `drop`).
    #[instrument(skip(self))]
    pub fn remove_all(&self) -> Result<()> {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => Ok(()),
            Err(source) if source.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(Error::io(source, self.dir.clone())),
        }
    }
}
