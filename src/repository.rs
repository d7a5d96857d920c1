//! # Source Checkout
//!
//! This module materialises the source repository a build runs against. It is
//! built around the `GitOperations` trait, which separates the checkout logic
//! (destination preparation, optional refspec, revision resolution,
//! submodules) from the concrete `git` invocations.
//!
//! In the main application `DefaultGitOperations` is used, which drives the
//! system `git` through a `CommandRunner`. In tests it can be replaced with a
//! mock to simulate resolvable and unresolvable references without a network.

use std::fs;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::error::{Error, Result};
use crate::exec::CommandRunner;
use crate::git;
use crate::revision::RevisionResolver;

/// Trait for git operations - allows mocking in tests
pub trait GitOperations: Send + Sync {
    /// Initialises an empty repository at `target_dir` with `url` as its remote.
    fn init(&self, url: &str, target_dir: &Path) -> Result<()>;

    /// Fetches `refspec` without checking it out.
    fn fetch(&self, target_dir: &Path, refspec: &str, depth: u32) -> Result<()>;

    /// Fetches `refspec` and checks out the fetched commit (detached).
    fn checkout(&self, target_dir: &Path, refspec: &str, depth: u32) -> Result<()>;

    /// Returns the commit id currently checked out.
    fn head_commit(&self, target_dir: &Path) -> Result<String>;

    /// Initialises and updates submodules recursively.
    fn update_submodules(&self, target_dir: &Path, depth: u32) -> Result<()>;
}

/// The default implementation of `GitOperations`, which runs the system `git`
/// through the given command runner.
pub struct DefaultGitOperations<'a> {
    runner: &'a dyn CommandRunner,
}

impl<'a> DefaultGitOperations<'a> {
    pub fn new(runner: &'a dyn CommandRunner) -> Self {
        Self { runner }
    }
}

impl GitOperations for DefaultGitOperations<'_> {
    fn init(&self, url: &str, target_dir: &Path) -> Result<()> {
        git::init(self.runner, url, target_dir)
    }

    fn fetch(&self, target_dir: &Path, refspec: &str, depth: u32) -> Result<()> {
        git::fetch(self.runner, target_dir, refspec, depth)
    }

    fn checkout(&self, target_dir: &Path, refspec: &str, depth: u32) -> Result<()> {
        git::fetch_and_checkout(self.runner, target_dir, refspec, depth)
    }

    fn head_commit(&self, target_dir: &Path) -> Result<String> {
        git::head_commit(self.runner, target_dir)
    }

    fn update_submodules(&self, target_dir: &Path, depth: u32) -> Result<()> {
        git::update_submodules(self.runner, target_dir, depth)
    }
}

/// What to check out, and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneConfig {
    pub url: String,
    /// Commit id, branch or tag. Empty means the remote default branch.
    pub revision: String,
    /// Extra refspec fetched before the revision is resolved. Empty to skip.
    pub refspec: String,
    /// Fetch depth; 0 fetches full history.
    pub depth: u32,
    pub submodules: bool,
    pub destination: PathBuf,
}

/// The outcome of a successful checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloneResult {
    pub url: String,
    pub commit_sha: String,
}

/// Checks out `config.revision` of `config.url` into `config.destination`.
///
/// Any leftover checkout at the destination is removed first. A failing
/// refspec fetch or an unresolvable revision is fatal, a failing submodule
/// update is only logged.
pub fn clone_source(git: &dyn GitOperations, config: &CloneConfig) -> Result<CloneResult> {
    let dest = config.destination.as_path();
    prepare_destination(dest)?;

    info!("Cloning {} into {}", config.url, dest.display());
    git.init(&config.url, dest)?;

    if !config.refspec.is_empty() {
        info!("Fetching refspec {}", config.refspec);
        git.fetch(dest, &config.refspec, config.depth)
            .inspect_err(log_auth_hint)?;
    }

    let commit_sha = RevisionResolver::new(git, config.depth).resolve(dest, &config.revision)?;

    if config.submodules {
        match git.update_submodules(dest, config.depth) {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => warn!("Failed to update submodules: {}", e),
        }
    }

    Ok(CloneResult {
        url: config.url.clone(),
        commit_sha,
    })
}

/// Logs a hint when a git failure looks like missing credentials.
pub(crate) fn log_auth_hint(err: &Error) {
    if let Error::ExternalTool { stderr, .. } = err {
        if let Some(hint) = git::auth_hint(stderr) {
            warn!("{}", hint);
        }
    }
}

fn prepare_destination(dest: &Path) -> Result<()> {
    if dest.exists() {
        fs::remove_dir_all(dest)?;
    }
    fs::create_dir_all(dest)?;
    Ok(())
}
