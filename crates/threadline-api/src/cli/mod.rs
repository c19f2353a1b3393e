//! CLI command definitions for the `tline` binary.
//!
//! Uses clap derive macros for argument parsing.

pub mod chat;
pub mod history;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Chat against a shared, live-synchronized message history.
#[derive(Parser)]
#[command(name = "tline", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Also export trace spans through OpenTelemetry (stdout exporter).
    #[arg(long, global = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive chat session.
    Chat {
        /// Model id sent with each generation request.
        #[arg(long, short)]
        model: Option<String>,

        /// Credential forwarded to the generation backend.
        #[arg(long, env = "THREADLINE_API_KEY", hide_env_values = true)]
        api_key: String,

        /// Also serve the HTTP/WebSocket API on this address while chatting.
        #[arg(long)]
        listen: Option<String>,
    },

    /// Print the stored message history.
    #[command(alias = "log")]
    History,

    /// Delete every stored message.
    Clear,

    /// Serve the HTTP/WebSocket API.
    Serve {
        /// Address to bind.
        #[arg(long, default_value = "127.0.0.1:3000")]
        listen: String,
    },

    /// Generate shell completions.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}
