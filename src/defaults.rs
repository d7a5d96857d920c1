//! Default values for monolithic-builder configuration.
//!
//! This module provides centralized default values used by the library
//! config structs and the CLI, ensuring both agree.

use std::path::PathBuf;

/// Workspace the pipeline mounts for the source and prefetch output.
pub const WORKSPACE_PATH: &str = "/workspace";

/// Directory the pipeline runner reads result files from.
pub const RESULTS_PATH: &str = "/tekton/results";

pub const DOCKERFILE: &str = "./Dockerfile";
pub const CONTEXT: &str = ".";

/// Shallow clone by default.
pub const GIT_DEPTH: u32 = 1;

/// Log level handed to the prefetch tool.
pub const PREFETCH_LOG_LEVEL: &str = "info";

/// Source checkout, relative to the workspace.
pub const SOURCE_DIR: &str = "source";

/// Prefetch directory, relative to the workspace. Mounted into hermetic builds.
pub const PREFETCH_DIR: &str = "cachi2";

/// Prefetch output, relative to the prefetch directory.
pub const PREFETCH_OUTPUT_DIR: &str = "output";

/// Returns the home directory credentials are installed into.
///
/// Uses the platform home directory (`$HOME` on Linux). Returns `None` when
/// it cannot be determined; credential setup is then skipped with a warning.
pub fn home_dir() -> Option<PathBuf> {
    dirs::home_dir()
}
