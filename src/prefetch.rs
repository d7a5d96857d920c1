//! Dependency prefetching with `cachi2`, for hermetic builds.
//!
//! Three tool invocations in order: `fetch-deps` downloads dependencies into
//! the output directory, `generate-env` writes the environment file the build
//! sources, and `inject-files` rewrites package-manager configuration so it
//! points at the mounted output directory.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::args::PREFETCH_MOUNT;
use crate::error::Result;
use crate::exec::CommandRunner;

/// Program name of the prefetch tool.
pub const PREFETCH_TOOL: &str = "cachi2";

/// Name of the optional tool config written into the output directory.
pub const CONFIG_FILE_NAME: &str = "cachi2.yaml";

/// Name of the generated environment file, next to the output directory.
pub const ENV_FILE_NAME: &str = "cachi2.env";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefetchConfig {
    /// Prefetch input (package manager selector or JSON). Empty skips prefetch.
    pub input: String,
    pub source_path: PathBuf,
    pub output_path: PathBuf,
    pub dev_package_managers: bool,
    pub log_level: String,
    /// Written verbatim to `<output>/cachi2.yaml` when non-empty.
    pub config_file_content: String,
}

impl PrefetchConfig {
    /// `<output>/cachi2.yaml`
    pub fn config_file_path(&self) -> PathBuf {
        self.output_path.join(CONFIG_FILE_NAME)
    }

    /// `<output>/../cachi2.env`
    pub fn env_file_path(&self) -> PathBuf {
        self.output_path
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(ENV_FILE_NAME)
    }
}

/// Output directory as seen from inside the build.
fn mounted_output_dir() -> String {
    format!("{}/output", PREFETCH_MOUNT)
}

pub fn fetch_deps_args(config: &PrefetchConfig) -> Vec<String> {
    let mut args = vec![
        "fetch-deps".to_string(),
        format!("--source={}", config.source_path.display()),
        format!("--output={}", config.output_path.display()),
    ];
    if config.dev_package_managers {
        args.push("--dev-package-managers".to_string());
    }
    if !config.log_level.is_empty() {
        args.push(format!("--log-level={}", config.log_level));
    }
    if !config.config_file_content.is_empty() {
        args.push(format!("--config-file={}", config.config_file_path().display()));
    }
    args.push(config.input.clone());
    args
}

pub fn generate_env_args(config: &PrefetchConfig) -> Vec<String> {
    vec![
        "generate-env".to_string(),
        config.output_path.display().to_string(),
        "--format".to_string(),
        "env".to_string(),
        "--for-output-dir".to_string(),
        mounted_output_dir(),
        "--output".to_string(),
        config.env_file_path().display().to_string(),
    ]
}

pub fn inject_files_args(config: &PrefetchConfig) -> Vec<String> {
    vec![
        "inject-files".to_string(),
        config.output_path.display().to_string(),
        "--for-output-dir".to_string(),
        mounted_output_dir(),
    ]
}

/// Prefetches dependencies described by `config.input`.
///
/// Does nothing when the input is empty. Any tool failure is returned.
pub fn fetch_dependencies(runner: &dyn CommandRunner, config: &PrefetchConfig) -> Result<()> {
    if config.input.is_empty() {
        info!("No prefetch input provided, skipping dependency prefetch");
        return Ok(());
    }

    info!(
        "Prefetching dependencies for {} into {}",
        config.source_path.display(),
        config.output_path.display()
    );
    fs::create_dir_all(&config.output_path)?;

    if !config.config_file_content.is_empty() {
        fs::write(config.config_file_path(), &config.config_file_content)?;
    }

    let fetch = fetch_deps_args(config);
    info!("Executing {} {}", PREFETCH_TOOL, fetch.join(" "));
    runner.run(PREFETCH_TOOL, &fetch)?;

    let generate = generate_env_args(config);
    info!("Executing {} {}", PREFETCH_TOOL, generate.join(" "));
    runner.run(PREFETCH_TOOL, &generate)?;

    let inject = inject_files_args(config);
    info!("Executing {} {}", PREFETCH_TOOL, inject.join(" "));
    runner.run(PREFETCH_TOOL, &inject)?;

    info!("Dependency prefetch completed");
    Ok(())
}
