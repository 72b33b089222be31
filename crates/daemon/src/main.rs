//! LAN Chat Daemon - Headless driver for the chat session engine.
//!
//! This binary:
//! - Replays scripted conversations through a live session
//! - Converts envelopes between JSON and wire form
//! - Shows and edits session configuration

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

mod commands;

/// LAN Chat Daemon - Headless chat session driver
#[derive(Parser)]
#[command(name = "lanchat-daemon")]
#[command(about = "Headless driver for LAN chat sessions", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a conversation script through a session
    Replay {
        /// Script file, one `sender<TAB>wire` line or `!directive` per line
        file: String,

        /// Peers as `id=name`; the first is the primary peer
        #[arg(short, long = "peer")]
        peers: Vec<String>,

        /// Run as a group conversation with this thread id
        #[arg(short, long)]
        group: Option<String>,

        /// Start disconnected
        #[arg(long)]
        offline: bool,
    },

    /// Encode a JSON envelope into wire form
    Encode {
        /// JSON envelope; read from stdin if omitted
        json: Option<String>,
    },

    /// Decode wire text into a JSON envelope
    Decode {
        /// Wire text
        wire: String,
    },

    /// Show or modify configuration
    Config {
        /// Key to get or set
        key: Option<String>,
        /// Value to set
        value: Option<String>,
    },

    /// Compare two dotted versions
    Compare {
        left: String,
        right: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Replay {
            file,
            peers,
            group,
            offline,
        } => {
            debug!("Replaying script: {}", file);
            commands::replay::execute(&file, &peers, group, !offline).await
        }
        Commands::Encode { json } => commands::codec::encode(json),
        Commands::Decode { wire } => commands::codec::decode(&wire),
        Commands::Config { key, value } => commands::config::execute(key, value).await,
        Commands::Compare { left, right } => {
            commands::compare::execute(&left, &right);
            Ok(())
        }
    }
}
