//! # comadmin
//!
//! Command-line front end for `comadmin-core`.
//!
//! - `cli`: argument parsing, command execution and report rendering
//! - `config`: layered settings from flags, environment and a TOML file

pub mod cli;
pub mod config;
