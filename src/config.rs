//! # Run Configuration
//!
//! Plain configuration structs for the two pipelines, with the defaults the
//! pipeline tasks rely on. The CLI fills them from flags and environment
//! variables; tests construct them directly.
//!
//! ## Key Components
//!
//! - **`BuildContainerConfig`**: Inputs of a build-container run: source
//!   repository, image, build options, prefetch options, workspace layout and
//!   credentials. It derives the narrower per-step configs (`CloneConfig`,
//!   `PrefetchConfig`, `BuildConfig`) so every step sees one consistent view
//!   of the workspace.
//!
//! - **`ImageIndexConfig`**: Inputs of a build-image-index run.
//!
//! Both offer `validate()`, which reports missing required values as
//! `Error::Configuration` before any tool is started.

use std::path::{Path, PathBuf};

use crate::args::BuildConfig;
use crate::auth::AuthPaths;
use crate::defaults;
use crate::error::{Error, Result};
use crate::prefetch::PrefetchConfig;
use crate::repository::CloneConfig;

/// Configuration of a build-container run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContainerConfig {
    // Source
    pub git_url: String,
    pub git_revision: String,
    pub git_refspec: String,
    pub git_depth: u32,
    pub git_submodules: bool,

    // Image
    pub image_url: String,
    /// Relative to the source checkout.
    pub dockerfile: PathBuf,
    /// Relative to the source checkout.
    pub context: PathBuf,
    pub rebuild: bool,
    pub skip_checks: bool,
    pub hermetic: bool,
    pub tls_verify: bool,
    pub image_expires_after: String,

    // Prefetch
    pub prefetch_input: String,
    pub dev_package_managers: bool,
    pub prefetch_log_level: String,
    pub prefetch_config_content: String,

    // Build arguments
    pub build_args: Vec<String>,
    pub build_args_file: String,

    // Workspace
    pub workspace_path: PathBuf,
    pub results_path: PathBuf,

    // Credentials
    pub git_auth_path: String,
    pub netrc_path: String,
    pub home_dir: Option<PathBuf>,
}

impl Default for BuildContainerConfig {
    fn default() -> Self {
        Self {
            git_url: String::new(),
            git_revision: String::new(),
            git_refspec: String::new(),
            git_depth: defaults::GIT_DEPTH,
            git_submodules: true,
            image_url: String::new(),
            dockerfile: PathBuf::from(defaults::DOCKERFILE),
            context: PathBuf::from(defaults::CONTEXT),
            rebuild: false,
            skip_checks: false,
            hermetic: false,
            tls_verify: true,
            image_expires_after: String::new(),
            prefetch_input: String::new(),
            dev_package_managers: false,
            prefetch_log_level: defaults::PREFETCH_LOG_LEVEL.to_string(),
            prefetch_config_content: String::new(),
            build_args: Vec::new(),
            build_args_file: String::new(),
            workspace_path: PathBuf::from(defaults::WORKSPACE_PATH),
            results_path: PathBuf::from(defaults::RESULTS_PATH),
            git_auth_path: String::new(),
            netrc_path: String::new(),
            home_dir: None,
        }
    }
}

impl BuildContainerConfig {
    /// Checks that the required values are present.
    pub fn validate(&self) -> Result<()> {
        if self.git_url.trim().is_empty() {
            return Err(missing("GIT_URL"));
        }
        if self.image_url.trim().is_empty() {
            return Err(missing("IMAGE_URL"));
        }
        Ok(())
    }

    /// Whether the registry check is bypassed and a build always happens.
    pub fn force_build(&self) -> bool {
        self.rebuild || self.skip_checks
    }

    /// `<workspace>/source`
    pub fn source_dir(&self) -> PathBuf {
        self.workspace_path.join(defaults::SOURCE_DIR)
    }

    /// `<workspace>/cachi2`
    pub fn prefetch_dir(&self) -> PathBuf {
        self.workspace_path.join(defaults::PREFETCH_DIR)
    }

    /// `<workspace>/cachi2/output`
    pub fn prefetch_output_dir(&self) -> PathBuf {
        self.prefetch_dir().join(defaults::PREFETCH_OUTPUT_DIR)
    }

    /// The dockerfile, resolved against the source checkout.
    pub fn dockerfile_path(&self) -> PathBuf {
        resolve_in(&self.source_dir(), &self.dockerfile)
    }

    /// The build context, resolved against the source checkout.
    pub fn context_path(&self) -> PathBuf {
        resolve_in(&self.source_dir(), &self.context)
    }

    pub fn clone_config(&self) -> CloneConfig {
        CloneConfig {
            url: self.git_url.clone(),
            revision: self.git_revision.clone(),
            refspec: self.git_refspec.clone(),
            depth: self.git_depth,
            submodules: self.git_submodules,
            destination: self.source_dir(),
        }
    }

    pub fn prefetch_config(&self) -> PrefetchConfig {
        PrefetchConfig {
            input: self.prefetch_input.clone(),
            source_path: self.source_dir(),
            output_path: self.prefetch_output_dir(),
            dev_package_managers: self.dev_package_managers,
            log_level: self.prefetch_log_level.clone(),
            config_file_content: self.prefetch_config_content.clone(),
        }
    }

    /// Build-tool configuration for the checked-out `commit_sha`.
    pub fn build_config(&self, commit_sha: &str) -> BuildConfig {
        BuildConfig {
            image_url: self.image_url.clone(),
            dockerfile: self.dockerfile_path(),
            context: self.context_path(),
            hermetic: self.hermetic,
            prefetch_input: self.prefetch_input.clone(),
            prefetch_path: self.prefetch_dir(),
            image_expires_after: self.image_expires_after.clone(),
            commit_sha: commit_sha.to_string(),
            build_args: self.build_args.clone(),
            build_args_file: self.build_args_file.clone(),
            tls_verify: self.tls_verify,
        }
    }

    pub fn auth_paths(&self) -> AuthPaths {
        AuthPaths::from_strings(&self.git_auth_path, &self.netrc_path)
    }
}

/// Configuration of a build-image-index run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageIndexConfig {
    /// Destination reference of the index.
    pub image_url: String,
    /// Accepted for compatibility with the pipeline task; the index run never reads it.
    pub commit_sha: String,
    /// Accepted for compatibility; not applied to the index.
    pub image_expires_after: String,
    pub always_build_index: bool,
    /// Member image references, in order.
    pub images: Vec<String>,
    pub results_path: PathBuf,
    pub tls_verify: bool,
}

impl Default for ImageIndexConfig {
    fn default() -> Self {
        Self {
            image_url: String::new(),
            commit_sha: String::new(),
            image_expires_after: String::new(),
            always_build_index: false,
            images: Vec::new(),
            results_path: PathBuf::from(defaults::RESULTS_PATH),
            tls_verify: true,
        }
    }
}

impl ImageIndexConfig {
    /// Checks that the destination reference is present.
    ///
    /// An empty member list is reported by the orchestrator, which owns the
    /// "at least one reference" rule.
    pub fn validate(&self) -> Result<()> {
        if self.image_url.trim().is_empty() {
            return Err(missing("IMAGE"));
        }
        Ok(())
    }

    /// Member references with surrounding whitespace trimmed and blanks dropped.
    pub fn image_refs(&self) -> Vec<String> {
        self.images
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Joins `relative` onto `base`, dropping a leading `./`. Absolute paths are
/// kept as they are.
fn resolve_in(base: &Path, relative: &Path) -> PathBuf {
    if relative.is_absolute() {
        return relative.to_path_buf();
    }
    let relative = relative.strip_prefix(".").unwrap_or(relative);
    if relative.as_os_str().is_empty() {
        base.to_path_buf()
    } else {
        base.join(relative)
    }
}

fn missing(name: &str) -> Error {
    Error::Configuration {
        message: format!("{} is required", name),
    }
}
