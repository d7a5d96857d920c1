//! # Build-Container Pipeline
//!
//! `BuildOrchestrator` drives one build-container run as an explicit state
//! machine:
//!
//! ```text
//! Init -> CheckExistence -> CloneSource -+-> SkipPath ---------------------------------+-> WriteResults -> Done
//!                                        +-> [PrefetchDeps] -> BuildImage -> PushImage -> ResolveDigest -+
//! ```
//!
//! Each state is handled by [`BuildOrchestrator::step`], which performs the
//! state's work and returns the next state. `run` checks for cancellation
//! before every transition.
//!
//! ## Failure policy
//!
//! - Clone, prefetch, build and push failures abort the run and are wrapped
//!   in `Error::Step` with the tool error as source.
//! - A failing existence check means "build required".
//! - A failing digest lookup yields an empty digest.
//! - Credential setup and submodule failures are only logged.
//!
//! Results are collected while the run progresses and only written in
//! `WriteResults`, so an aborted run leaves the results directory untouched.

use std::fmt;

use log::{info, warn};

use crate::args::{self, ROOTLESS_WRAPPER};
use crate::cancel::CancellationToken;
use crate::clock::Clock;
use crate::config::BuildContainerConfig;
use crate::error::Result;
use crate::exec::CommandRunner;
use crate::prefetch;
use crate::registry;
use crate::repository::{clone_source, CloneResult, GitOperations};
use crate::results::{self, ResultSet, ResultsDir};

/// States of a build-container run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Init,
    CheckExistence,
    CloneSource,
    SkipPath,
    PrefetchDeps,
    BuildImage,
    PushImage,
    ResolveDigest,
    WriteResults,
    Done,
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildState::Init => "init",
            BuildState::CheckExistence => "check-existence",
            BuildState::CloneSource => "clone-source",
            BuildState::SkipPath => "skip",
            BuildState::PrefetchDeps => "prefetch-deps",
            BuildState::BuildImage => "build-image",
            BuildState::PushImage => "push-image",
            BuildState::ResolveDigest => "resolve-digest",
            BuildState::WriteResults => "write-results",
            BuildState::Done => "done",
        };
        f.write_str(name)
    }
}

/// What a finished run reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutcome {
    /// False when an existing image was reused.
    pub built: bool,
    pub commit_sha: String,
    pub url: String,
    pub image_url: String,
    /// Empty when the digest could not be resolved.
    pub image_digest: String,
}

impl BuildOutcome {
    /// The named results, in the order they are written.
    pub fn results(&self) -> ResultSet {
        let mut set = ResultSet::new();
        set.set(results::BUILD, self.built.to_string());
        set.set(results::COMMIT, self.commit_sha.as_str());
        set.set(results::URL, self.url.as_str());
        set.set(results::IMAGE_URL, self.image_url.as_str());
        set.set(results::IMAGE_DIGEST, self.image_digest.as_str());
        set
    }
}

/// Runs the build-container pipeline with injected capabilities.
pub struct BuildOrchestrator<'a> {
    config: &'a BuildContainerConfig,
    runner: &'a dyn CommandRunner,
    git: &'a dyn GitOperations,
    clock: &'a dyn Clock,
    cancel: &'a CancellationToken,

    should_build: bool,
    source: Option<CloneResult>,
    image_digest: String,
}

impl<'a> BuildOrchestrator<'a> {
    pub fn new(
        config: &'a BuildContainerConfig,
        runner: &'a dyn CommandRunner,
        git: &'a dyn GitOperations,
        clock: &'a dyn Clock,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            config,
            runner,
            git,
            clock,
            cancel,
            should_build: true,
            source: None,
            image_digest: String::new(),
        }
    }

    /// Runs every state from `Init` to `Done`.
    pub fn run(&mut self) -> Result<BuildOutcome> {
        self.config.validate()?;

        let mut state = BuildState::Init;
        while state != BuildState::Done {
            self.cancel.check()?;
            state = self.step(state)?;
        }

        info!(
            "Build-container run completed: {} ({})",
            self.config.image_url,
            display_digest(&self.image_digest)
        );
        Ok(self.outcome())
    }

    /// Performs the work of `state` and returns the state to move to.
    pub fn step(&mut self, state: BuildState) -> Result<BuildState> {
        match state {
            BuildState::Init => {
                info!(
                    "Starting build-container run for {} from {} (revision {:?})",
                    self.config.image_url, self.config.git_url, self.config.git_revision
                );
                Ok(BuildState::CheckExistence)
            }
            BuildState::CheckExistence => {
                self.should_build = self.build_required()?;
                Ok(BuildState::CloneSource)
            }
            BuildState::CloneSource => {
                self.clone_source()?;
                Ok(self.after_clone())
            }
            BuildState::SkipPath => {
                info!(
                    "Skipping build: {} already exists and no rebuild was requested",
                    self.config.image_url
                );
                self.image_digest = self.resolve_digest()?;
                Ok(BuildState::WriteResults)
            }
            BuildState::PrefetchDeps => {
                info!("Prefetching dependencies");
                prefetch::fetch_dependencies(self.runner, &self.config.prefetch_config())
                    .map_err(|e| e.in_step("dependency prefetch"))?;
                Ok(BuildState::BuildImage)
            }
            BuildState::BuildImage => {
                self.build_image()?;
                Ok(BuildState::PushImage)
            }
            BuildState::PushImage => {
                self.push_image()?;
                Ok(BuildState::ResolveDigest)
            }
            BuildState::ResolveDigest => {
                self.image_digest = self.resolve_digest()?;
                Ok(BuildState::WriteResults)
            }
            BuildState::WriteResults => {
                let results = self.outcome().results();
                ResultsDir::new(&self.config.results_path).write_all(&results)?;
                info!(
                    "Wrote {} results to {}",
                    results.len(),
                    self.config.results_path.display()
                );
                Ok(BuildState::Done)
            }
            BuildState::Done => Ok(BuildState::Done),
        }
    }

    fn after_clone(&self) -> BuildState {
        if !self.should_build {
            BuildState::SkipPath
        } else if self.config.prefetch_input.is_empty() {
            BuildState::BuildImage
        } else {
            BuildState::PrefetchDeps
        }
    }

    fn build_required(&self) -> Result<bool> {
        if self.config.force_build() {
            info!(
                "Build forced (rebuild={}, skip_checks={})",
                self.config.rebuild, self.config.skip_checks
            );
            return Ok(true);
        }

        info!("Checking whether {} already exists", self.config.image_url);
        match registry::image_exists(self.runner, &self.config.image_url, self.config.tls_verify) {
            Ok(exists) => {
                info!(
                    "Image {} {}",
                    self.config.image_url,
                    if exists { "exists" } else { "does not exist" }
                );
                Ok(!exists)
            }
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => {
                warn!("Failed to check image existence, proceeding with build: {}", e);
                Ok(true)
            }
        }
    }

    fn clone_source(&mut self) -> Result<()> {
        if let Err(e) = self
            .config
            .auth_paths()
            .install(self.config.home_dir.as_deref(), &self.config.git_url)
        {
            warn!("Failed to set up authentication: {}", e);
        }

        let result =
            clone_source(self.git, &self.config.clone_config()).map_err(|e| e.in_step("git clone"))?;
        info!("Source at commit {}", result.commit_sha);
        self.source = Some(result);
        Ok(())
    }

    fn build_image(&self) -> Result<()> {
        let build_config = self.config.build_config(self.commit_sha());
        let build_args = args::build_command(&build_config, self.clock.now());
        info!("Building {}: buildah {}", self.config.image_url, build_args.join(" "));

        let wrapped = args::unshare_command(&build_args, &build_config.context);
        self.runner
            .run(ROOTLESS_WRAPPER, &wrapped)
            .map_err(|e| e.in_step("container build"))
    }

    fn push_image(&self) -> Result<()> {
        let push_args = args::push_command(&self.config.image_url, self.config.tls_verify);
        info!("Pushing {}: buildah {}", self.config.image_url, push_args.join(" "));
        self.runner
            .run(args::BUILD_TOOL, &push_args)
            .map_err(|e| e.in_step("container push"))
    }

    /// Digest of the configured image, or empty if it cannot be resolved.
    fn resolve_digest(&self) -> Result<String> {
        match registry::image_digest(self.runner, &self.config.image_url, self.config.tls_verify) {
            Ok(digest) => {
                info!("Image digest: {}", digest);
                Ok(digest)
            }
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => {
                warn!("Failed to get image digest, using empty value: {}", e);
                Ok(String::new())
            }
        }
    }

    fn commit_sha(&self) -> &str {
        self.source.as_ref().map_or("", |s| s.commit_sha.as_str())
    }

    fn outcome(&self) -> BuildOutcome {
        BuildOutcome {
            built: self.should_build,
            commit_sha: self.commit_sha().to_string(),
            url: self
                .source
                .as_ref()
                .map_or_else(|| self.config.git_url.clone(), |s| s.url.clone()),
            image_url: self.config.image_url.clone(),
            image_digest: self.image_digest.clone(),
        }
    }
}

fn display_digest(digest: &str) -> &str {
    if digest.is_empty() {
        "digest unknown"
    } else {
        digest
    }
}
