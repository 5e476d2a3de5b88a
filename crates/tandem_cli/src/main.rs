//! Tandem CLI
//!
//! Runs a relay or watches a shared todo list.
//!
//! # Commands
//!
//! - `serve` - Run the relay with the todo domain
//! - `watch` - Connect as a client and print the list whenever it changes

mod commands;

use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

/// Tandem shared-state relay and client tools.
#[derive(Parser)]
#[command(name = "tandem")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay
    Serve {
        /// Address to listen on
        #[arg(short, long, default_value = "127.0.0.1:8080")]
        bind: SocketAddr,

        /// Maximum concurrent connections
        #[arg(short, long, default_value = "1000")]
        max_connections: usize,

        /// Reject actions whose clientId is not the sender's own
        #[arg(long)]
        strict: bool,
    },

    /// Watch a shared list
    Watch {
        /// Relay URL
        #[arg(short, long, default_value = "ws://127.0.0.1:8080")]
        url: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbosity flag.
    let default = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Serve {
            bind,
            max_connections,
            strict,
        } => {
            commands::serve::run(bind, max_connections, strict).await?;
        }
        Commands::Watch { url, format } => {
            let format = commands::watch::Format::parse(&format)?;
            commands::watch::run(url, format).await?;
        }
    }

    Ok(())
}
