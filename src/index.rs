//! # Build-Image-Index Pipeline
//!
//! `ImageIndexOrchestrator` publishes a multi-architecture image index from
//! already-pushed member images, or passes a single image through.
//!
//! ```text
//! Init -+-> SingleImage -------------------------------------------------------------------+-> Expiration -> WriteResults -> Done
//!       +-> CreateManifest -> AddImages -> PushManifest -> ResolveDigest -> RemoveManifest -+
//! ```
//!
//! An index is assembled when `always_build_index` is set or more than one
//! member is given. The local manifest list is removed exactly once, and only
//! after a successful push; create, add and push failures leave it in place
//! and abort the run.

use std::fmt;

use log::{debug, info, warn};

use crate::args::{self, BUILD_TOOL};
use crate::cancel::CancellationToken;
use crate::config::ImageIndexConfig;
use crate::error::{Error, Result};
use crate::exec::CommandRunner;
use crate::registry;
use crate::results::{self, ResultSet, ResultsDir};

/// States of a build-image-index run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Init,
    SingleImage,
    CreateManifest,
    AddImages,
    PushManifest,
    ResolveDigest,
    RemoveManifest,
    Expiration,
    WriteResults,
    Done,
}

impl fmt::Display for IndexState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IndexState::Init => "init",
            IndexState::SingleImage => "single-image",
            IndexState::CreateManifest => "create-manifest",
            IndexState::AddImages => "add-images",
            IndexState::PushManifest => "push-manifest",
            IndexState::ResolveDigest => "resolve-digest",
            IndexState::RemoveManifest => "remove-manifest",
            IndexState::Expiration => "expiration",
            IndexState::WriteResults => "write-results",
            IndexState::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexOutcome {
    pub image_url: String,
    /// Empty when the digest could not be resolved.
    pub image_digest: String,
}

impl IndexOutcome {
    pub fn results(&self) -> ResultSet {
        let mut set = ResultSet::new();
        set.set(results::IMAGE_URL, self.image_url.as_str());
        set.set(results::IMAGE_DIGEST, self.image_digest.as_str());
        set
    }
}

pub struct ImageIndexOrchestrator<'a> {
    config: &'a ImageIndexConfig,
    runner: &'a dyn CommandRunner,
    cancel: &'a CancellationToken,

    images: Vec<String>,
    handle: String,
    image_url: String,
    image_digest: String,
}

impl<'a> ImageIndexOrchestrator<'a> {
    pub fn new(
        config: &'a ImageIndexConfig,
        runner: &'a dyn CommandRunner,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            config,
            runner,
            cancel,
            images: Vec::new(),
            handle: args::manifest_handle(&config.image_url),
            image_url: String::new(),
            image_digest: String::new(),
        }
    }

    /// Runs every state from `Init` to `Done`.
    pub fn run(&mut self) -> Result<IndexOutcome> {
        let mut state = IndexState::Init;
        while state != IndexState::Done {
            self.cancel.check()?;
            state = self.step(state)?;
        }

        info!(
            "Build-image-index run completed: {} ({})",
            self.image_url,
            if self.image_digest.is_empty() {
                "digest unknown"
            } else {
                self.image_digest.as_str()
            }
        );
        Ok(self.outcome())
    }

    /// Performs the work of `state` and returns the state to move to.
    pub fn step(&mut self, state: IndexState) -> Result<IndexState> {
        match state {
            IndexState::Init => self.init(),
            IndexState::SingleImage => {
                self.single_image()?;
                Ok(IndexState::Expiration)
            }
            IndexState::CreateManifest => {
                info!("Creating manifest list {}", self.handle);
                self.runner
                    .run(BUILD_TOOL, &args::manifest_create_command(&self.handle))
                    .map_err(|e| e.in_step("manifest create"))?;
                Ok(IndexState::AddImages)
            }
            IndexState::AddImages => {
                for image in &self.images {
                    self.cancel.check()?;
                    info!("Adding {} to {}", image, self.handle);
                    let cmd = args::manifest_add_command(&self.handle, image, self.config.tls_verify);
                    self.runner
                        .run(BUILD_TOOL, &cmd)
                        .map_err(|e| e.in_step(format!("manifest add {}", image)))?;
                }
                Ok(IndexState::PushManifest)
            }
            IndexState::PushManifest => {
                info!("Pushing image index to {}", self.config.image_url);
                let cmd = args::manifest_push_command(
                    &self.handle,
                    &self.config.image_url,
                    self.config.tls_verify,
                );
                self.runner
                    .run(BUILD_TOOL, &cmd)
                    .map_err(|e| e.in_step("manifest push"))?;
                Ok(IndexState::ResolveDigest)
            }
            IndexState::ResolveDigest => {
                self.image_url = self.config.image_url.clone();
                self.image_digest = self.lookup_digest(&self.config.image_url)?;
                Ok(IndexState::RemoveManifest)
            }
            IndexState::RemoveManifest => {
                self.remove_manifest();
                Ok(IndexState::Expiration)
            }
            IndexState::Expiration => {
                if !self.config.image_expires_after.is_empty() {
                    info!(
                        "Expiration {:?} requested for {}; image indexes are not labelled, \
                         members keep their own expiration",
                        self.config.image_expires_after, self.image_url
                    );
                }
                Ok(IndexState::WriteResults)
            }
            IndexState::WriteResults => {
                let results = self.outcome().results();
                ResultsDir::new(&self.config.results_path).write_all(&results)?;
                info!(
                    "Wrote {} results to {}",
                    results.len(),
                    self.config.results_path.display()
                );
                Ok(IndexState::Done)
            }
            IndexState::Done => Ok(IndexState::Done),
        }
    }

    fn init(&mut self) -> Result<IndexState> {
        self.images = self.config.image_refs();
        info!(
            "Starting build-image-index run for {} with {} image(s) (always_build_index={})",
            self.config.image_url,
            self.images.len(),
            self.config.always_build_index
        );

        if self.images.is_empty() {
            return Err(Error::Configuration {
                message: "no images provided for index creation".to_string(),
            });
        }

        if self.config.always_build_index || self.images.len() > 1 {
            self.config.validate()?;
            Ok(IndexState::CreateManifest)
        } else {
            Ok(IndexState::SingleImage)
        }
    }

    fn single_image(&mut self) -> Result<()> {
        let Some(image) = self.images.first().cloned() else {
            return Err(Error::Configuration {
                message: "no image to pass through".to_string(),
            });
        };
        info!("Single image provided, passing {} through", image);

        if let Some((repo, digest)) = registry::split_digest_reference(&image) {
            self.image_url = repo.to_string();
            self.image_digest = digest.to_string();
            return Ok(());
        }

        self.image_digest = self.lookup_digest(&image)?;
        self.image_url = image;
        Ok(())
    }

    fn lookup_digest(&self, image: &str) -> Result<String> {
        match registry::image_digest(self.runner, image, self.config.tls_verify) {
            Ok(digest) => Ok(digest),
            Err(e) if e.is_cancelled() => Err(e),
            Err(e) => {
                warn!("Failed to get digest of {}, using empty value: {}", image, e);
                Ok(String::new())
            }
        }
    }

    fn remove_manifest(&self) {
        let cmd = args::manifest_remove_command(&self.handle);
        match self.runner.invoke(BUILD_TOOL, &cmd) {
            Ok(output) if output.success() => debug!("Removed manifest list {}", self.handle),
            Ok(output) => debug!(
                "Ignoring failure to remove manifest list {}: {}",
                self.handle,
                output.stderr.trim()
            ),
            Err(e) => debug!("Ignoring failure to remove manifest list {}: {}", self.handle, e),
        }
    }

    fn outcome(&self) -> IndexOutcome {
        IndexOutcome {
            image_url: self.image_url.clone(),
            image_digest: self.image_digest.clone(),
        }
    }
}
