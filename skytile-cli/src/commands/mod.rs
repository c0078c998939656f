//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`config`] - Print the effective configuration
//! - [`fetch`] - Fetch tiles through an activated engine
//! - [`neighbors`] - List the prefetch neighbors of a tile

pub mod common;
pub mod config;
pub mod fetch;
pub mod neighbors;
