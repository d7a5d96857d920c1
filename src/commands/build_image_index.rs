//! Build-image-index command implementation
//!
//! Publishes an image index from already pushed images, or passes a single
//! image reference through unchanged.

use std::path::PathBuf;

use anyhow::Result;
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args};
use monolithic_builder::cancel::CancellationToken;
use monolithic_builder::config::ImageIndexConfig;
use monolithic_builder::defaults;
use monolithic_builder::exec::SystemCommandRunner;
use monolithic_builder::index::ImageIndexOrchestrator;

/// Arguments for the build-image-index command
#[derive(Args, Debug)]
pub struct BuildImageIndexArgs {
    /// Destination reference of the image index
    #[arg(long, value_name = "IMAGE", env = "IMAGE", default_value = "")]
    pub image: String,

    /// Member images, comma separated
    #[arg(long, value_name = "IMAGES", env = "IMAGES", value_delimiter = ',')]
    pub images: Vec<String>,

    /// Commit the images were built from
    #[arg(long, value_name = "SHA", env = "COMMIT_SHA", default_value = "")]
    pub commit_sha: String,

    /// Accepted for compatibility; indexes are not labelled
    #[arg(long, value_name = "DURATION", env = "IMAGE_EXPIRES_AFTER", default_value = "")]
    pub image_expires_after: String,

    /// Assemble an index even for a single image
    #[arg(long, value_name = "BOOL", env = "ALWAYS_BUILD_INDEX", action = ArgAction::Set,
          num_args = 0..=1, default_missing_value = "true", default_value = "false",
          value_parser = BoolishValueParser::new())]
    pub always_build_index: bool,

    /// Directory result files are written to
    #[arg(long, value_name = "PATH", env = "RESULTS_PATH", default_value = defaults::RESULTS_PATH)]
    pub results_path: PathBuf,

    /// Verify TLS certificates of the registry
    #[arg(long, value_name = "BOOL", env = "TLSVERIFY", action = ArgAction::Set,
          num_args = 0..=1, default_missing_value = "true", default_value = "true",
          value_parser = BoolishValueParser::new())]
    pub tls_verify: bool,
}

impl BuildImageIndexArgs {
    pub fn into_config(self) -> ImageIndexConfig {
        ImageIndexConfig {
            image_url: self.image,
            commit_sha: self.commit_sha,
            image_expires_after: self.image_expires_after,
            always_build_index: self.always_build_index,
            images: self.images,
            results_path: self.results_path,
            tls_verify: self.tls_verify,
        }
    }
}

/// Execute the build-image-index command
pub fn execute(args: BuildImageIndexArgs, cancel: &CancellationToken) -> Result<()> {
    let config = args.into_config();
    let runner = SystemCommandRunner::new(cancel.clone()).with_echo(true);

    let outcome = ImageIndexOrchestrator::new(&config, &runner, cancel).run()?;
    log::info!("Published {} {}", outcome.image_url, outcome.image_digest);
    Ok(())
}
