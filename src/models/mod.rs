//! Shared types used across all modules.
//!
//! Object ids, commits, tree entries, diffs, and the estimate produced at
//! the end of a run. Other modules import from here rather than reaching
//! into each other's internals.

pub mod commit;
pub mod estimate;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

pub use commit::{BranchRef, ChangeKind, CommitInfo, CommitRef, FileChange, TreeEntry};
pub use estimate::{CommitScore, DeploymentEstimate};

/// Unique file paths of interest, accumulated across all branches.
pub type CandidatePathSet = BTreeSet<String>;

/// Path → blob id computed from the live response body.
///
/// Paths that failed to fetch are absent, never present as a placeholder.
pub type ProbeResult = BTreeMap<String, ObjectId>;

/// Path → commit that first introduced the probed blob at that path.
pub type ResolvedMap = BTreeMap<String, ObjectId>;

/// Hash function a repository uses to address its objects.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ObjectFormat {
    #[default]
    Sha1,
    Sha256,
}

impl ObjectFormat {
    /// Length of a full object id in hex characters.
    pub fn hex_len(self) -> usize {
        match self {
            ObjectFormat::Sha1 => 40,
            ObjectFormat::Sha256 => 64,
        }
    }
}

/// Full hex object id (commit, tree, or blob).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectId(String);

/// Returned when a string is not a full hex object id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid object id: '{0}'")]
pub struct InvalidObjectId(pub String);

impl ObjectId {
    /// The hex form, always lowercase.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The conventional 7-character abbreviation.
    pub fn short(&self) -> &str {
        &self.0[..7]
    }

    /// The all-zero id git uses for "no object" in raw diffs.
    pub fn is_null(&self) -> bool {
        self.0.bytes().all(|b| b == b'0')
    }

    /// Object format implied by the id length.
    pub fn format(&self) -> ObjectFormat {
        if self.0.len() == ObjectFormat::Sha256.hex_len() {
            ObjectFormat::Sha256
        } else {
            ObjectFormat::Sha1
        }
    }

    /// Build an id from a raw 20- or 32-byte digest.
    pub(crate) fn from_digest(bytes: &[u8]) -> Self {
        Self(hex::encode(bytes))
    }
}

impl FromStr for ObjectId {
    type Err = InvalidObjectId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let len_ok =
            s.len() == ObjectFormat::Sha1.hex_len() || s.len() == ObjectFormat::Sha256.hex_len();
        if len_ok && s.bytes().all(|b| b.is_ascii_hexdigit()) {
            Ok(Self(s.to_ascii_lowercase()))
        } else {
            Err(InvalidObjectId(s.to_string()))
        }
    }
}

impl TryFrom<String> for ObjectId {
    type Error = InvalidObjectId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ObjectId> for String {
    fn from(id: ObjectId) -> Self {
        id.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
