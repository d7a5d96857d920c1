//! Build-container command implementation
//!
//! Runs the full build-container pipeline: registry check, clone, optional
//! prefetch, rootless build, push, and result files.

use std::path::PathBuf;

use anyhow::Result;
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args};
use monolithic_builder::build::BuildOrchestrator;
use monolithic_builder::cancel::CancellationToken;
use monolithic_builder::clock::SystemClock;
use monolithic_builder::config::BuildContainerConfig;
use monolithic_builder::defaults;
use monolithic_builder::exec::SystemCommandRunner;
use monolithic_builder::repository::DefaultGitOperations;

/// Arguments for the build-container command
#[derive(Args, Debug)]
pub struct BuildContainerArgs {
    /// Build arguments passed to buildah as `--build-arg` (KEY=value)
    #[arg(value_name = "KEY=VALUE")]
    pub build_args: Vec<String>,

    /// Build arguments from the environment, used when none are given
    /// positionally (JSON array, comma or whitespace separated)
    #[arg(long, value_name = "LIST", env = "BUILD_ARGS", hide = true)]
    pub build_args_env: Option<String>,

    /// Repository to clone
    #[arg(long, value_name = "URL", env = "GIT_URL")]
    pub git_url: Option<String>,

    /// Commit id, branch or tag to check out (default branch if empty)
    #[arg(long, value_name = "REV", env = "GIT_REVISION", default_value = "")]
    pub git_revision: String,

    /// Additional refspec to fetch before checkout
    #[arg(long, value_name = "REFSPEC", env = "GIT_REFSPEC", default_value = "")]
    pub git_refspec: String,

    /// Clone depth (0 for full history)
    #[arg(long, value_name = "N", env = "GIT_DEPTH", default_value_t = defaults::GIT_DEPTH)]
    pub git_depth: u32,

    /// Initialize and update submodules
    #[arg(long, value_name = "BOOL", env = "GIT_SUBMODULES", action = ArgAction::Set,
          num_args = 0..=1, default_missing_value = "true", default_value = "true",
          value_parser = BoolishValueParser::new())]
    pub git_submodules: bool,

    /// Image reference to build and push
    #[arg(long, value_name = "IMAGE", env = "IMAGE_URL")]
    pub image_url: Option<String>,

    /// Dockerfile, relative to the source checkout
    #[arg(long, value_name = "PATH", env = "DOCKERFILE", default_value = defaults::DOCKERFILE)]
    pub dockerfile: PathBuf,

    /// Build context, relative to the source checkout
    #[arg(long, value_name = "PATH", env = "CONTEXT", default_value = defaults::CONTEXT)]
    pub context: PathBuf,

    /// Build even if the image already exists
    #[arg(long, value_name = "BOOL", env = "REBUILD", action = ArgAction::Set,
          num_args = 0..=1, default_missing_value = "true", default_value = "false",
          value_parser = BoolishValueParser::new())]
    pub rebuild: bool,

    /// Skip the registry existence check
    #[arg(long, value_name = "BOOL", env = "SKIP_CHECKS", action = ArgAction::Set,
          num_args = 0..=1, default_missing_value = "true", default_value = "false",
          value_parser = BoolishValueParser::new())]
    pub skip_checks: bool,

    /// Build without network access, using prefetched dependencies
    #[arg(long, value_name = "BOOL", env = "HERMETIC", action = ArgAction::Set,
          num_args = 0..=1, default_missing_value = "true", default_value = "false",
          value_parser = BoolishValueParser::new())]
    pub hermetic: bool,

    /// Verify TLS certificates of the registry
    #[arg(long, value_name = "BOOL", env = "TLSVERIFY", action = ArgAction::Set,
          num_args = 0..=1, default_missing_value = "true", default_value = "true",
          value_parser = BoolishValueParser::new())]
    pub tls_verify: bool,

    /// Expiration of the image, e.g. 24h, 2d, 1w
    #[arg(long, value_name = "DURATION", env = "IMAGE_EXPIRES_AFTER", default_value = "")]
    pub image_expires_after: String,

    /// Dependency prefetch input (empty disables prefetch)
    #[arg(long, value_name = "INPUT", env = "PREFETCH_INPUT", default_value = "")]
    pub prefetch_input: String,

    /// Let the prefetch tool include development dependencies
    #[arg(long, value_name = "BOOL", env = "DEV_PACKAGE_MANAGERS", action = ArgAction::Set,
          num_args = 0..=1, default_missing_value = "true", default_value = "false",
          value_parser = BoolishValueParser::new())]
    pub dev_package_managers: bool,

    /// Log level of the prefetch tool
    #[arg(long, value_name = "LEVEL", env = "LOG_LEVEL", default_value = defaults::PREFETCH_LOG_LEVEL)]
    pub prefetch_log_level: String,

    /// Content of the prefetch tool configuration file
    #[arg(long, value_name = "YAML", env = "CONFIG_FILE_CONTENT", default_value = "")]
    pub config_file_content: String,

    /// File of build arguments passed as `--build-arg-file`
    #[arg(long, value_name = "PATH", env = "BUILD_ARGS_FILE", default_value = "")]
    pub build_args_file: String,

    /// Workspace holding the source checkout and prefetch output
    #[arg(long, value_name = "PATH", env = "WORKSPACE_PATH", default_value = defaults::WORKSPACE_PATH)]
    pub workspace_path: PathBuf,

    /// Directory result files are written to
    #[arg(long, value_name = "PATH", env = "RESULTS_PATH", default_value = defaults::RESULTS_PATH)]
    pub results_path: PathBuf,

    /// Directory with git credentials
    #[arg(long, value_name = "PATH", env = "GIT_AUTH_PATH", default_value = "")]
    pub git_auth_path: String,

    /// Directory with a .netrc file
    #[arg(long, value_name = "PATH", env = "NETRC_PATH", default_value = "")]
    pub netrc_path: String,
}

impl BuildContainerArgs {
    /// Converts parsed arguments into the library configuration.
    pub fn into_config(self) -> BuildContainerConfig {
        let build_args = if self.build_args.is_empty() {
            self.build_args_env
                .as_deref()
                .map(parse_list)
                .unwrap_or_default()
        } else {
            self.build_args
        };

        BuildContainerConfig {
            git_url: self.git_url.unwrap_or_default(),
            git_revision: self.git_revision,
            git_refspec: self.git_refspec,
            git_depth: self.git_depth,
            git_submodules: self.git_submodules,
            image_url: self.image_url.unwrap_or_default(),
            dockerfile: self.dockerfile,
            context: self.context,
            rebuild: self.rebuild,
            skip_checks: self.skip_checks,
            hermetic: self.hermetic,
            tls_verify: self.tls_verify,
            image_expires_after: self.image_expires_after,
            prefetch_input: self.prefetch_input,
            dev_package_managers: self.dev_package_managers,
            prefetch_log_level: self.prefetch_log_level,
            prefetch_config_content: self.config_file_content,
            build_args,
            build_args_file: self.build_args_file,
            workspace_path: self.workspace_path,
            results_path: self.results_path,
            git_auth_path: self.git_auth_path,
            netrc_path: self.netrc_path,
            home_dir: defaults::home_dir(),
        }
    }
}

/// Execute the build-container command
pub fn execute(args: BuildContainerArgs, cancel: &CancellationToken) -> Result<()> {
    let config = args.into_config();
    config.validate()?;

    let runner = SystemCommandRunner::new(cancel.clone()).with_echo(true);
    let git = DefaultGitOperations::new(&runner);
    let clock = SystemClock;

    let outcome = BuildOrchestrator::new(&config, &runner, &git, &clock, cancel).run()?;

    log::info!(
        "{} {} at commit {}",
        if outcome.built { "Built" } else { "Reused" },
        outcome.image_url,
        outcome.commit_sha
    );
    Ok(())
}

/// Splits a list parameter: a JSON array of strings, or comma separated
/// values, or whitespace separated values.
fn parse_list(value: &str) -> Vec<String> {
    let value = value.trim();
    if value.starts_with('[') && value.ends_with(']') {
        if let Ok(items) = serde_json::from_str::<Vec<String>>(value) {
            return items;
        }
    }

    if value.contains(',') {
        value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    } else {
        value.split_whitespace().map(str::to_string).collect()
    }
}
