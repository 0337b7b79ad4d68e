//! # CLI Interface
//!
//! Defines the command-line argument structure for `accord-node` using
//! `clap` derive. Supports three subcommands: `init`, `simulate` and
//! `version`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use accord_protocol::config::{
    FlowConfig, DEFAULT_NOTARY_MAX_ATTEMPTS, DEFAULT_NOTARY_RETRY_BACKOFF,
};

use crate::logging::LogFormat;

/// Accord commit protocol node.
///
/// Generates node identities and runs multi-party issuance over an
/// in-process network with a reference notary.
#[derive(Parser, Debug)]
#[command(
    name = "accord-node",
    about = "Accord commit protocol node",
    version,
    propagate_version = true
)]
pub struct AccordNodeCli {
    /// Log output format.
    #[arg(long, global = true, env = "ACCORD_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the Accord node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a data directory holding a fresh identity key.
    Init(InitArgs),
    /// Issue IOUs from one lender to a set of borrowers, all concurrently,
    /// on an in-process network.
    Simulate(SimulateArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `init` subcommand.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Path to the data directory to initialize.
    #[arg(long, short = 'd', env = "ACCORD_DATA_DIR", default_value = ".accord")]
    pub data_dir: PathBuf,

    /// Overwrite an existing identity key.
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `simulate` subcommand.
#[derive(Parser, Debug)]
pub struct SimulateArgs {
    /// Number of parties including the lender. Every other party is a
    /// borrower.
    #[arg(long, short = 'n', default_value_t = 3, value_parser = clap::value_parser!(u16).range(2..))]
    pub parties: u16,

    /// Face value of each IOU, in minor units.
    #[arg(long, short = 'a', default_value_t = 100)]
    pub amount: u64,

    #[arg(long, default_value = "USD")]
    pub currency: String,

    /// Make the first borrower refuse to sign.
    #[arg(long)]
    pub reject: bool,

    /// Persist the lender's checkpoints under this directory. The lender
    /// reuses `identity.key` from here when present.
    #[arg(long, short = 'd', env = "ACCORD_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// How long to wait for a counterparty reply, in milliseconds.
    #[arg(long, env = "ACCORD_SESSION_TIMEOUT_MS", default_value_t = 30_000)]
    pub session_timeout_ms: u64,

    /// Notarisation attempts before giving up on an unavailable notary.
    #[arg(long, env = "ACCORD_NOTARY_ATTEMPTS", default_value_t = DEFAULT_NOTARY_MAX_ATTEMPTS)]
    pub notary_attempts: u32,

    /// Pause between notarisation attempts, in milliseconds.
    #[arg(long, default_value_t = DEFAULT_NOTARY_RETRY_BACKOFF.as_millis() as u64)]
    pub notary_backoff_ms: u64,

    /// Print the outcome as JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

impl SimulateArgs {
    pub fn flow_config(&self) -> FlowConfig {
        FlowConfig::default()
            .with_session_timeout(Duration::from_millis(self.session_timeout_ms))
            .with_notary_attempts(self.notary_attempts)
            .with_notary_backoff(Duration::from_millis(self.notary_backoff_ms))
    }
}
