//! # comadmin CLI Module
//!
//! This module implements the CLI interface for comadmin.
//!
//! ## Available Commands
//!
//! - `examine` - Identify whether a module is a native DLL or a .NET assembly
//! - `get-server-info` - Show how a CLSID is registered

mod commands;

use crate::config::Settings;
use clap::{Parser, Subcommand};
use comadmin_core::{ComAdminError, PeMetadata, RegistryView};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// COM Admin CLI
///
/// Inspects COM servers: classifies modules on disk and registrations in the
/// registry as native, .NET Framework or .NET Core.
#[derive(Parser, Debug)]
#[command(name = "comadmin")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress the title line
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Registry view to read: 32 or 64
    #[arg(long, global = true)]
    pub view: Option<RegistryView>,

    /// Read registrations from a snapshot file instead of the system registry
    #[arg(short, long, global = true)]
    pub snapshot: Option<PathBuf>,

    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Examine a file to identify whether it hosts COM servers
    Examine {
        /// Path of the file to examine
        path: PathBuf,
    },

    /// Get info on a server from the registry
    GetServerInfo {
        /// The server Class ID (CLSID)
        clsid: String,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute a parsed command and return the report to print.
pub fn execute(command: &Commands, settings: &Settings) -> Result<String, ComAdminError> {
    match command {
        Commands::Examine { path } => {
            if !path.exists() {
                return Err(ComAdminError::Io(format!(
                    "File '{}' does not exist",
                    path.display()
                )));
            }
            cmd_examine(&PeMetadata::new(), path, settings.json_mode)
        }
        Commands::GetServerInfo { clsid } => cmd_get_server_info(settings, clsid),
    }
}

/// The title line printed before a text report.
#[must_use]
pub fn title() -> String {
    format!("COM Admin CLI v{}", env!("CARGO_PKG_VERSION"))
}
