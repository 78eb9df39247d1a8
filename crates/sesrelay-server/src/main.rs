//! sesrelay - SMTP-to-SES relay entry point

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, EnvelopeArgs, SendArgs};
use sesrelay_common::config::{Config, LoggingConfig};
use sesrelay_common::{Error, Transaction};
use sesrelay_core::{Policy, RelaySender, SesClient};
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config.as_deref())?;

    // Initialize logging
    init_logging(&config.logging);

    match cli.command {
        Commands::Send(args) => send(&config, args).await,
        Commands::Check(args) => check(&config, args),
    }
}

async fn send(config: &Config, args: SendArgs) -> Result<()> {
    let data = read_message(args.message.as_deref())
        .await
        .context("Failed to read message")?;

    let transport = Arc::new(SesClient::new(&config.ses)?);
    let relay = RelaySender::from_config(&config.relay, transport)?;

    let transaction = Transaction::new(
        args.origin,
        args.envelope.from,
        args.envelope.to,
        data,
    );
    info!(
        id = %transaction.id,
        from = %transaction.from,
        recipients = transaction.to.len(),
        size = transaction.size(),
        "Relaying message"
    );

    if let Err(e) = relay.relay(&transaction).await {
        let policy_denial = e.is_policy_denial();
        let err = Error::from(e);
        warn!(
            id = %transaction.id,
            error = %err,
            code = err.code(),
            policy_denial,
            "Relay failed"
        );
        return Err(err).context(format!("relay of {} failed", transaction.id));
    }

    Ok(())
}

fn check(config: &Config, args: EnvelopeArgs) -> Result<()> {
    let policy = Policy::from_config(&config.relay)?;
    let result = policy.filter(&args.from, &args.to);

    let report = serde_json::json!({
        "from": args.from,
        "allowed": result.allowed,
        "denied": result.denied,
        "error": result.error.as_ref().map(ToString::to_string),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

/// Read the raw message from `path`, or from stdin when no path is given
async fn read_message(path: Option<&Path>) -> sesrelay_common::Result<Vec<u8>> {
    match path {
        Some(path) => Ok(tokio::fs::read(path).await?),
        None => {
            let mut data = Vec::new();
            tokio::io::stdin().read_to_end(&mut data).await?;
            Ok(data)
        }
    }
}

fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.format == "json" {
        registry
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}
