// SPDX-FileCopyrightText: 2026 Campsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Campsync - client-side data sync for a campus networking app.
//!
//! This is the binary entry point. `check` validates configuration; `demo`
//! runs the screens against a seeded in-memory platform.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod demo;

use std::path::PathBuf;

use campsync_config::model::SyncConfig;
use clap::{Parser, Subcommand};
use campsync_memory::fixtures::{DEMO_EMAIL, DEMO_PASSWORD};

/// Campsync - client-side data sync for a campus networking app.
#[derive(Parser, Debug)]
#[command(name = "campsync", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the XDG hierarchy.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Load and validate configuration, then exit.
    Check,
    /// Sign in to a seeded in-memory platform and print every screen.
    Demo {
        #[arg(long, default_value = DEMO_EMAIL)]
        email: String,
        #[arg(long, default_value = DEMO_PASSWORD)]
        password: String,
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
}

fn load(path: Option<&PathBuf>) -> SyncConfig {
    let loaded = match path {
        Some(path) => campsync_config::load_and_validate_path(path),
        None => campsync_config::load_and_validate(),
    };
    match loaded {
        Ok(config) => config,
        Err(errors) => {
            campsync_config::render_errors(&errors);
            std::process::exit(1);
        }
    }
}

/// Initialize the tracing subscriber. `RUST_LOG` wins over the configured
/// level.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("campsync={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = load(cli.config.as_ref());
    init_tracing(&config.client.log_level);

    match cli.command {
        Some(Commands::Check) => {
            println!(
                "campsync: config ok (client.name={}, log_level={})",
                config.client.name, config.client.log_level
            );
        }
        Some(Commands::Demo {
            email,
            password,
            plain,
        }) => {
            if let Err(e) = demo::run(config, &email, &password, plain).await {
                eprintln!("campsync demo: {e}");
                std::process::exit(1);
            }
        }
        None => {
            println!("campsync: use --help for available commands");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn demo_defaults_to_the_demo_account() {
        let cli = Cli::try_parse_from(["campsync", "demo"]).unwrap();
        match cli.command {
            Some(Commands::Demo { email, password, plain }) => {
                assert_eq!(email, DEMO_EMAIL);
                assert_eq!(password, DEMO_PASSWORD);
                assert!(!plain);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn default_config_is_valid() {
        let config = campsync_config::load_and_validate_str("").unwrap();
        assert_eq!(config.client.name, "campsync");
    }
}
