//! # Monolithic Builder Library
//!
//! This library drives container-image builds inside a CI pipeline task. It
//! backs the `monolithic-builder` command-line tool, which replaces a chain of
//! separate pipeline tasks (init, clone, prefetch, build, index) with a single
//! process that shells out to `git`, `cachi2`, `buildah` and `skopeo`.
//!
//! ## Quick Example
//!
//! ```
//! use chrono::{TimeZone, Utc};
//! use monolithic_builder::args::{build_command, BuildConfig};
//! use monolithic_builder::duration::parse_duration;
//! use std::time::Duration;
//!
//! let config = BuildConfig {
//!     image_url: "quay.io/example/app:abc123".to_string(),
//!     commit_sha: "abc123".to_string(),
//!     image_expires_after: "1d".to_string(),
//!     ..Default::default()
//! };
//! let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
//! let args = build_command(&config, now);
//!
//! assert_eq!(args[0], "build");
//! assert!(args.contains(&"quay.expires-after=2026-01-02T00:00:00Z".to_string()));
//! assert_eq!(args.last().unwrap(), ".");
//! assert_eq!(parse_duration("2d"), Duration::from_secs(48 * 3600));
//! ```
//!
//! ## Core Concepts
//!
//! - **Process invocation (`exec`)**: every external tool is reached through the
//!   `CommandRunner` trait, with a real and a scripted implementation.
//! - **Argument construction (`args`, `duration`)**: pure functions that turn
//!   configuration into argument vectors.
//! - **Source checkout (`repository`, `revision`, `git`, `auth`)**: clones the
//!   source and resolves a revision by trying commit id, branch and tag in turn.
//! - **Pipelines (`build`, `index`)**: explicit state machines for the
//!   build-container and build-image-index runs.
//! - **Results (`results`)**: named outputs handed back to the pipeline runner.
//!
//! ## Execution Flow
//!
//! A build-container run:
//!
//! 1.  **Check**: ask the registry whether the image already exists.
//! 2.  **Clone**: check out the source revision (always, for the `commit`
//!     and `url` results).
//! 3.  **Prefetch**: download dependencies for hermetic builds, if requested.
//! 4.  **Build and push**: run `buildah` inside a user namespace and push.
//! 5.  **Results**: write `build`, `commit`, `url`, `IMAGE_URL`,
//!     `IMAGE_DIGEST`.

pub mod args;
pub mod auth;
pub mod build;
pub mod cancel;
pub mod clock;
pub mod config;
pub mod defaults;
pub mod duration;
pub mod error;
pub mod exec;
pub mod git;
pub mod index;
pub mod prefetch;
pub mod registry;
pub mod repository;
pub mod results;
pub mod revision;
