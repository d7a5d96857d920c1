//! # Error Handling
//!
//! This module defines the error taxonomy shared by both pipelines. It uses
//! the `thiserror` library to build a single `Error` enum whose variants map
//! onto the failure classes the orchestrators reason about.
//!
//! ## Key Components
//!
//! - **`Error`**: Every failure the library can report. Variants carry enough
//!   context (tool name, argument vector, exit status, captured stderr) to
//!   diagnose the failure from the log line alone.
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`.
//!
//! ## Fatal vs. downgraded failures
//!
//! Whether an error aborts a run is decided by the orchestrators, not here:
//!
//! - `Configuration`, and any `Step` failure (clone, prefetch, build, push,
//!   manifest create/add/push) abort the run.
//! - Existence checks and digest lookups are downgraded to warnings.
//! - `AuthSetup` is always downgraded to a warning.
//! - `Cancelled` aborts the run and maps to its own exit code in the CLI.

use thiserror::Error;

/// Main error type for monolithic-builder operations
#[derive(Error, Debug)]
pub enum Error {
    /// A required input is missing or inconsistent.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// An external tool ran and exited unsuccessfully.
    ///
    /// `status` is `None` when the process was terminated by a signal.
    #[error("{tool} {} exited with {}: {}", .args.join(" "), describe_status(.status), .stderr.trim())]
    ExternalTool {
        tool: String,
        args: Vec<String>,
        status: Option<i32>,
        stderr: String,
    },

    /// An external tool could not be started at all.
    #[error("Failed to start {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    /// Credential files could not be materialized. Never fatal.
    #[error("Authentication setup error: {message}")]
    AuthSetup { message: String },

    /// An external tool produced output that could not be understood.
    #[error("Could not parse {tool} output: {message}")]
    Parse { tool: String, message: String },

    /// No interpretation of a revision string could be checked out.
    #[error("failed to checkout revision: {revision}")]
    Resolution { revision: String },

    /// The run was interrupted by an external signal.
    #[error("Operation cancelled")]
    Cancelled,

    /// A fatal pipeline step failed; the originating error is kept as source.
    #[error("{step} failed")]
    Step {
        step: String,
        #[source]
        source: Box<Error>,
    },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Wraps `self` as the cause of a failed pipeline step.
    ///
    /// Cancellation is passed through untouched so callers can still match
    /// on it after it crossed a step boundary.
    pub fn in_step(self, step: impl Into<String>) -> Error {
        match self {
            Error::Cancelled => Error::Cancelled,
            other => Error::Step {
                step: step.into(),
                source: Box::new(other),
            },
        }
    }

    /// Returns true if this error, or any error it wraps, is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Error::Cancelled => true,
            Error::Step { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

fn describe_status(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("status {}", code),
        None => "a signal".to_string(),
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    #[test]
    fn test_error_display_configuration() {
        let error = Error::Configuration {
            message: "no images provided for index creation".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("Configuration error"));
        assert!(display.contains("no images provided"));
    }

    #[test]
    fn test_error_display_external_tool() {
        let error = Error::ExternalTool {
            tool: "buildah".to_string(),
            args: vec!["push".to_string(), "quay.io/test/image:tag".to_string()],
            status: Some(125),
            stderr: "unauthorized: access denied\n".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("buildah push quay.io/test/image:tag"));
        assert!(display.contains("status 125"));
        assert!(display.ends_with("unauthorized: access denied"));
    }

    #[test]
    fn test_error_display_external_tool_killed_by_signal() {
        let error = Error::ExternalTool {
            tool: "skopeo".to_string(),
            args: vec!["inspect".to_string()],
            status: None,
            stderr: String::new(),
        };
        assert!(format!("{}", error).contains("exited with a signal"));
    }

    #[test]
    fn test_error_display_resolution_names_revision_verbatim() {
        let error = Error::Resolution {
            revision: "feature/does-not-exist".to_string(),
        };
        assert_eq!(
            format!("{}", error),
            "failed to checkout revision: feature/does-not-exist"
        );
    }

    #[test]
    fn test_error_display_parse() {
        let error = Error::Parse {
            tool: "skopeo".to_string(),
            message: "digest not found".to_string(),
        };
        let display = format!("{}", error);
        assert!(display.contains("skopeo"));
        assert!(display.contains("digest not found"));
    }

    #[test]
    fn test_in_step_keeps_cause() {
        let cause = Error::ExternalTool {
            tool: "buildah".to_string(),
            args: vec!["push".to_string()],
            status: Some(1),
            stderr: "push failed".to_string(),
        };
        let error = cause.in_step("container push");

        assert_eq!(format!("{}", error), "container push failed");
        let source = error.source().expect("step error should have a source");
        assert!(source.to_string().contains("push failed"));
    }

    #[test]
    fn test_in_step_passes_cancellation_through() {
        let error = Error::Cancelled.in_step("git clone");
        assert!(matches!(error, Error::Cancelled));
    }

    #[test]
    fn test_is_cancelled_through_nested_steps() {
        let nested = Error::Step {
            step: "outer".to_string(),
            source: Box::new(Error::Step {
                step: "inner".to_string(),
                source: Box::new(Error::Cancelled),
            }),
        };
        assert!(nested.is_cancelled());
        assert!(!Error::Configuration {
            message: "x".to_string()
        }
        .is_cancelled());
    }

    #[test]
    fn test_error_from_io() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: Error = io_error.into();
        assert!(format!("{}", error).contains("I/O error"));
    }

    #[test]
    fn test_error_from_json() {
        let json_error = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let error: Error = json_error.into();
        assert!(format!("{}", error).contains("JSON error"));
    }
}
