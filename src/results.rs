//! Named run outputs, persisted as one file per name.
//!
//! The pipeline runner reads each result file verbatim, so values are written
//! without a trailing newline. Writing a name again replaces the previous
//! value.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::Result;

/// `true` when the image was built, `false` when the build was skipped.
pub const BUILD: &str = "build";
/// Commit id the image was built from.
pub const COMMIT: &str = "commit";
/// Source repository URL.
pub const URL: &str = "url";
/// Image reference the run produced.
pub const IMAGE_URL: &str = "IMAGE_URL";
/// Content digest of `IMAGE_URL`, possibly empty.
pub const IMAGE_DIGEST: &str = "IMAGE_DIGEST";

/// Ordered name/value pairs collected during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    entries: Vec<(String, String)>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `value` under `name`, replacing an earlier value in place.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name.to_string(), value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The directory result files are written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultsDir {
    path: PathBuf,
}

impl ResultsDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `value` to `<dir>/<name>`, creating the directory if needed.
    pub fn write(&self, name: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.path)?;
        let target = self.path.join(name);
        fs::write(&target, value)?;
        debug!("Wrote result {} = {:?}", name, value);
        Ok(())
    }

    /// Writes every entry of `results` in order.
    pub fn write_all(&self, results: &ResultSet) -> Result<()> {
        for (name, value) in results.iter() {
            self.write(name, value)?;
        }
        Ok(())
    }
}
