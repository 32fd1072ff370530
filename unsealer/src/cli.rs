//! Command-line flags. Service addresses fall back to the usual Vault/Consul
//! environment variables (a `.env` file is loaded before parsing).

use std::{path::PathBuf, time::Duration};

use clap::{Parser, ValueEnum};
use unseal_core::{ConsulKv, VaultClient};

pub const DEFAULT_KEY_PATH: &str = "./key.pem";
pub const DEFAULT_KV_PATH: &str = "vaultinit/keys";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Unseal Vault with RSA-encrypted key shares stored in Consul
#[derive(Debug, Parser)]
#[command(name = "unsealer", version)]
pub struct Args {
    /// Path to the PEM-encoded PKCS#1 RSA private key
    #[arg(long = "rsa", value_name = "PATH", default_value = DEFAULT_KEY_PATH)]
    pub key_path: PathBuf,

    /// Vault address
    #[arg(long, env = "VAULT_ADDR", default_value = VaultClient::DEFAULT_ADDR)]
    pub vault_addr: String,

    /// Consul address (host:port)
    #[arg(long, env = "CONSUL_HTTP_ADDR", default_value = ConsulKv::DEFAULT_ADDR)]
    pub consul_addr: String,

    /// Consul address scheme
    #[arg(long, default_value = ConsulKv::DEFAULT_SCHEME, value_parser = ["http", "https"])]
    pub consul_scheme: String,

    /// Consul KV path holding the encrypted unseal keys
    #[arg(long, default_value = DEFAULT_KV_PATH)]
    pub kv_path: String,

    /// Consul ACL token
    #[arg(long, env = "CONSUL_HTTP_TOKEN", hide_env_values = true)]
    pub consul_token: Option<String>,

    /// Timeout applied to every HTTP request, in seconds
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout_secs: u64,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Args {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
