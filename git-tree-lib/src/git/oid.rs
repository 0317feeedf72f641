//! The commit identifier type used throughout the core.

use std::fmt::{self, Debug, Display};
use std::str::FromStr;

/// A Git object id: an opaque, fixed-size, content-addressed identifier.
///
/// Totally ordered by byte comparison (matching the Git convention of
/// ordering OIDs lexicographically by hex digit), so that `RepoTree` and
/// `BranchMap` can produce deterministic, sorted output.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Oid(pub(crate) git2::Oid);

impl Oid {
    /// The literal string used to represent "no commit" in the
    /// `pre-commit-parent` file (see §3 of the spec).
    pub const NULL_LITERAL: &'static str = "null";

    /// The raw 20-byte representation of this OID.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub(crate) fn inner(&self) -> git2::Oid {
        self.0
    }

    pub(crate) fn from_git2(oid: git2::Oid) -> Self {
        Self(oid)
    }
}

impl Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", self.0)
    }
}

impl Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Oid {
    type Err = crate::error::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        git2::Oid::from_str(value)
            .map(Oid)
            .map_err(|source| crate::error::Error::VcsError { source })
    }
}

impl From<git2::Oid> for Oid {
    fn from(oid: git2::Oid) -> Self {
        Self(oid)
    }
}

impl From<Oid> for git2::Oid {
    fn from(oid: Oid) -> Self {
        oid.0
    }
}

/// Parse the on-disk representation of `pre-commit-parent`: either a 40-hex
/// OID, or the literal string `null`.
pub fn parse_optional_oid(value: &str) -> Result<Option<Oid>, crate::error::Error> {
    let value = value.trim();
    if value == Oid::NULL_LITERAL || value.is_empty() {
        Ok(None)
    } else {
        Ok(Some(value.parse()?))
    }
}

/// Render an optional OID using the `pre-commit-parent` convention.
pub fn render_optional_oid(oid: Option<Oid>) -> String {
    match oid {
        Some(oid) => oid.to_string(),
        None => Oid::NULL_LITERAL.to_string(),
    }
}
