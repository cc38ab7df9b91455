// SPDX-FileCopyrightText: 2026 Bridgedesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bridgedesk - a messaging desk for WhatsApp, Messenger and Instagram.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use bridgedesk::serve::{run_replay, run_serve};

/// Bridgedesk - a messaging desk for WhatsApp, Messenger and Instagram.
#[derive(Parser, Debug)]
#[command(name = "bridgedesk", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run connections, the webhook gateway and automation.
    Serve,
    /// Re-process webhook log entries that failed earlier.
    Replay {
        /// Maximum number of entries to re-process.
        #[arg(long, default_value_t = 100)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => bridgedesk_config::load_and_validate_path(path),
        None => bridgedesk_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            bridgedesk_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => run_serve(config).await,
        Some(Commands::Replay { limit }) => run_replay(config, limit).await,
        None => {
            println!("bridgedesk: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("bridgedesk: {e}");
        std::process::exit(1);
    }
}
