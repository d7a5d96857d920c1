//! Resolution of an ambiguous revision string to a commit.
//!
//! A revision may be a (possibly abbreviated) commit id, a branch name, a tag
//! name, or empty. Candidates are tried in a fixed order and the first one
//! that checks out wins.

use std::fmt;
use std::path::Path;

use log::{debug, info};

use crate::error::{Error, Result};
use crate::repository::{log_auth_hint, GitOperations};

/// Shortest string still tried as an object id.
pub const MIN_COMMIT_ID_LEN: usize = 7;

/// Length of a full SHA-1 object id.
pub const MAX_COMMIT_ID_LEN: usize = 40;

/// One way of interpreting a revision string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevisionCandidate {
    CommitId(String),
    Branch(String),
    Tag(String),
    DefaultHead,
}

impl RevisionCandidate {
    /// The ref to fetch for this candidate.
    pub fn refspec(&self) -> String {
        match self {
            RevisionCandidate::CommitId(id) => id.clone(),
            RevisionCandidate::Branch(name) => format!("refs/heads/{}", name),
            RevisionCandidate::Tag(name) => format!("refs/tags/{}", name),
            RevisionCandidate::DefaultHead => "HEAD".to_string(),
        }
    }
}

impl fmt::Display for RevisionCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RevisionCandidate::CommitId(id) => write!(f, "commit {}", id),
            RevisionCandidate::Branch(name) => write!(f, "branch {}", name),
            RevisionCandidate::Tag(name) => write!(f, "tag {}", name),
            RevisionCandidate::DefaultHead => write!(f, "default branch"),
        }
    }
}

/// The ordered candidates for `revision`.
pub fn candidates(revision: &str) -> Vec<RevisionCandidate> {
    if revision.is_empty() {
        return vec![RevisionCandidate::DefaultHead];
    }

    let mut result = Vec::with_capacity(3);
    if (MIN_COMMIT_ID_LEN..=MAX_COMMIT_ID_LEN).contains(&revision.len()) {
        result.push(RevisionCandidate::CommitId(revision.to_string()));
    }
    result.push(RevisionCandidate::Branch(revision.to_string()));
    result.push(RevisionCandidate::Tag(revision.to_string()));
    result
}

/// Checks out the first candidate of a revision that exists on the remote.
pub struct RevisionResolver<'a> {
    git: &'a dyn GitOperations,
    depth: u32,
}

impl<'a> RevisionResolver<'a> {
    pub fn new(git: &'a dyn GitOperations, depth: u32) -> Self {
        Self { git, depth }
    }

    /// Checks out `revision` in `target_dir` and returns the resulting commit id.
    ///
    /// Fails with `Error::Resolution` carrying `revision` verbatim when no
    /// candidate can be checked out. Cancellation aborts immediately.
    pub fn resolve(&self, target_dir: &Path, revision: &str) -> Result<String> {
        for candidate in candidates(revision) {
            debug!("Trying {}", candidate);
            match self.git.checkout(target_dir, &candidate.refspec(), self.depth) {
                Ok(()) => {
                    let sha = self.git.head_commit(target_dir)?;
                    info!("Checked out {} at {}", candidate, sha);
                    return Ok(sha);
                }
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    log_auth_hint(&e);
                    debug!("{} not found: {}", candidate, e);
                }
            }
        }

        Err(Error::Resolution {
            revision: revision.to_string(),
        })
    }
}
