//! # comadmin - COM Admin CLI
//!
//! Inspect COM servers from the command line.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │               apps/comadmin (THE BINARY)             │
//! │                                                      │
//! │  ┌─────────────┐   ┌──────────────┐   ┌───────────┐  │
//! │  │    CLI      │   │    Config    │   │  Renderer │  │
//! │  │   (clap)    │   │ (flags/env/  │   │(text/JSON)│  │
//! │  │             │   │    toml)     │   │           │  │
//! │  └──────┬──────┘   └──────┬───────┘   └─────┬─────┘  │
//! │         └─────────────────┼─────────────────┘        │
//! │                           ▼                          │
//! │                  ┌────────────────┐                  │
//! │                  │ comadmin-core  │                  │
//! │                  │  (THE LOGIC)   │                  │
//! │                  └────────────────┘                  │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Classify a module
//! comadmin examine Server.dll
//!
//! # Classify a registration in the 32-bit view
//! comadmin --view 32 get-server-info {93CB110F-9189-4349-BD9F-392D9A4D0096}
//!
//! # Read registrations from a snapshot file, report as JSON
//! comadmin --snapshot fixture.txt --json-mode get-server-info 93cb110f-9189-4349-bd9f-392d9a4d0096
//! ```

use clap::Parser;
use comadmin::cli;
use comadmin::config::{Environment, LogFormat, Settings};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    let cli = cli::Cli::parse();

    let settings = match Settings::resolve(&cli, &Environment::from_process()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&settings);

    if !settings.quiet && !settings.json_mode {
        println!("{}", cli::title());
        println!();
    }

    match cli::execute(&cli.command, &settings) {
        Ok(report) => print!("{}", report),
        Err(e) => {
            tracing::debug!(error = ?e, "command failed");
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Install the tracing subscriber. Logs go to stderr; stdout carries reports.
fn init_tracing(settings: &Settings) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| settings.default_log_filter().into());

    match settings.log_format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
