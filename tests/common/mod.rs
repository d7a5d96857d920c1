//! Shared test utilities for CLI end-to-end tests.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new();
//!     fixture.command().arg("--help").assert().success();
//! }
//! ```

use assert_cmd::Command;
use assert_fs::prelude::*;
use std::path::{Path, PathBuf};

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    #[allow(unused_imports)]
    pub use assert_cmd::cargo::cargo_bin_cmd;
    #[allow(unused_imports)]
    pub use assert_fs::prelude::*;
    pub use predicates::prelude::*;

    pub use super::TestFixture;
}

/// A temporary workspace and results directory for one CLI invocation.
///
/// Commands created by the fixture start from an empty environment, so
/// variables of the machine running the tests cannot leak into the run.
/// `PATH` names an empty directory, so external tools are never found.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

impl TestFixture {
    /// Create a new test fixture with an empty temporary directory.
    pub fn new() -> Self {
        let temp_dir = assert_fs::TempDir::new().expect("Failed to create temp directory");
        temp_dir
            .child("bin")
            .create_dir_all()
            .expect("Failed to create empty bin directory");
        Self { temp_dir }
    }

    /// Get the path to the temporary directory.
    #[allow(dead_code)]
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Directory the command writes results to.
    pub fn results_path(&self) -> PathBuf {
        self.temp_dir.path().join("results")
    }

    /// Workspace the command clones into.
    pub fn workspace_path(&self) -> PathBuf {
        self.temp_dir.path().join("workspace")
    }

    /// Content of result `name`, if it was written.
    pub fn result(&self, name: &str) -> Option<String> {
        std::fs::read_to_string(self.results_path().join(name)).ok()
    }

    /// True if no result file was written at all.
    pub fn no_results(&self) -> bool {
        !self.results_path().exists()
    }

    /// Create a child path in the temp directory.
    #[allow(dead_code)]
    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    /// The `monolithic-builder` binary with a clean environment pointing at
    /// this fixture's directories.
    pub fn command(&self) -> Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("monolithic-builder");
        cmd.env_clear()
            .env("PATH", self.temp_dir.path().join("bin"))
            .env("HOME", self.temp_dir.path().join("home"))
            .env("RESULTS_PATH", self.results_path())
            .env("WORKSPACE_PATH", self.workspace_path())
            .current_dir(self.temp_dir.path());
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
