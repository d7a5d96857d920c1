//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the
//! `monolithic-builder` command-line tool. Each subcommand is defined in its
//! own file.
//!
//! ## Structure
//!
//! Each command module contains:
//! - An `Args` struct that defines the command-specific arguments, derived
//!   using `clap`. Every option can also be given through the environment
//!   variable the pipeline task sets.
//! - An `execute` function that turns the parsed `Args` into a library config
//!   and runs the matching orchestrator from the `monolithic_builder` library.

pub mod build_container;
pub mod build_image_index;
