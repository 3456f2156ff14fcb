// SPDX-FileCopyrightText: 2026 Wavecast Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wavecast - bulk WhatsApp campaign dispatch and status reconciliation.
//!
//! Binary entry point.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod http;
mod serve;

/// Wavecast - bulk WhatsApp campaign dispatch service.
#[derive(Parser, Debug)]
#[command(name = "wavecast", version, about, long_about = None)]
struct Cli {
    /// Config file to use instead of the XDG hierarchy.
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the dispatch service and HTTP API.
    Serve,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => wavecast_config::load_and_validate_path(path),
        None => wavecast_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            wavecast_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("wavecast serve failed: {e}");
                std::process::exit(1);
            }
        }
        None => {
            println!("wavecast: use --help for available commands");
        }
    }
}
