//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`plan`] - Print the tiles a view would request
//! - [`fetch`] - Load a view through the layer and write the aggregate
//! - [`dissolve`] - Merge features of a local GeoJSON file

pub mod common;
pub mod dissolve;
pub mod fetch;
pub mod plan;
