//! Command-line interface for the `sesrelay` binary

use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Relay messages through Amazon SES after applying address policies.
#[derive(Parser, Debug)]
#[command(name = "sesrelay", version, propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file (TOML).
    ///
    /// When omitted, `./sesrelay.toml` and `/etc/sesrelay/config.toml` are tried.
    #[arg(long, short = 'c', global = true, env = "SESRELAY_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Relay one message read from a file or stdin.
    Send(SendArgs),
    /// Run the address filter only and print the decision.
    Check(EnvelopeArgs),
}

/// Envelope sender and recipients
#[derive(Args, Debug)]
pub struct EnvelopeArgs {
    /// Envelope sender (MAIL FROM).
    #[arg(long, short = 'f')]
    pub from: String,

    /// Envelope recipient (RCPT TO); repeat for several.
    #[arg(long, short = 't', required = true)]
    pub to: Vec<String>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub envelope: EnvelopeArgs,

    /// File holding the raw RFC 5322 message; stdin when omitted.
    #[arg(long, short = 'm')]
    pub message: Option<PathBuf>,

    /// Peer address recorded in relay logs.
    #[arg(long)]
    pub origin: Option<SocketAddr>,
}
