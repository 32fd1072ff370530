//! Vault auto-unsealer
//! Reads the RSA-encrypted unseal key bundle from Consul and feeds the shares to
//! Vault until it unseals. Meant to be re-run by a supervisor: every failure ends
//! the process with a non-zero exit code and nothing is retried in-process.

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use unseal_core::{ConsulKv, KeyFile, ShareSource, UnsealError, UnsealOutcome, Unsealer, VaultClient};

use crate::cli::Args;

mod cli;
mod telemetry;

/// Main entry point for the unsealer.
/// - Loads a `.env` file, then parses flags (with `VAULT_ADDR`, `CONSUL_HTTP_ADDR` fallbacks).
/// - Initializes the tracing subscriber.
/// - Runs a single unseal pass and maps its outcome to the exit code.
#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let args = Args::parse();

    if let Err(err) = telemetry::init(args.log_format) {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    match run(&args).await {
        Ok(outcome) if outcome.is_success() => {
            info!("{outcome}");
            ExitCode::SUCCESS
        }
        Ok(outcome) => {
            error!("{outcome}");
            ExitCode::FAILURE
        }
        Err(err) => {
            let class = err
                .downcast_ref::<UnsealError>()
                .map_or("startup", |e| e.class().as_str());
            error!(class, error = %format!("{err:#}"), "Unseal run failed");
            ExitCode::FAILURE
        }
    }
}

/// Build the clients once and run the unseal sequence.
async fn run(args: &Args) -> Result<UnsealOutcome> {
    let http = reqwest::Client::builder()
        .timeout(args.timeout())
        .build()
        .context("Failed to build HTTP client")?;

    let vault = VaultClient::new(http.clone(), &args.vault_addr);
    let mut consul = ConsulKv::new(http, &args.consul_scheme, &args.consul_addr);
    if let Some(token) = &args.consul_token {
        consul = consul.with_token(token.as_str());
    }
    tracing::debug!(vault = vault.addr(), consul = consul.base_url(), "Clients configured");

    let unsealer = Unsealer::new(
        vault,
        ShareSource::new(consul),
        KeyFile::new(&args.key_path),
        args.kv_path.as_str(),
    );
    Ok(unsealer.run().await?)
}
