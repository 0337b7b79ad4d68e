// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Accord Node
//!
//! Entry point for the `accord-node` binary. Parses CLI arguments,
//! initializes logging and dispatches to a subcommand:
//!
//! - `init`    : create a data directory and generate an identity key
//! - `simulate`: run concurrent IOU issuance on an in-process network
//! - `version` : print build version information

mod cli;
mod logging;

use anyhow::{bail, Context, Result};
use clap::Parser;
use futures::future::join_all;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;

use accord_contracts::{IouContract, IouIssueValidator, IouState, IOU_CONTRACT_ID};
use accord_protocol::contract::{ContractRegistry, ContractVerifier, Validator};
use accord_protocol::crypto::AccordKeypair;
use accord_protocol::flow::{
    ProposerFlow, ResponderDispatcher, ResponderOutcome, ResponderReport, ServiceHub,
};
use accord_protocol::identity::{InMemoryIdentityService, NetworkMap, Party};
use accord_protocol::network::InMemoryNetwork;
use accord_protocol::notary::{NotaryService, SimpleNotary};
use accord_protocol::storage::{CheckpointStore, InMemoryCheckpointStore, SledCheckpointStore};

use cli::{AccordNodeCli, Commands};

/// File inside the data directory holding the hex-encoded secret key.
const IDENTITY_KEY_FILE: &str = "identity.key";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = AccordNodeCli::parse();

    match cli.command {
        Commands::Init(args) => {
            logging::init_logging("accord_node=info", cli.log_format);
            init_node(args)
        }
        Commands::Simulate(args) => {
            logging::init_logging("accord_node=info,accord_protocol=info", cli.log_format);
            simulate(args).await
        }
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Initializes a node data directory and generates its identity key.
fn init_node(args: cli::InitArgs) -> Result<()> {
    let data_dir = &args.data_dir;
    tracing::info!(data_dir = %data_dir.display(), "initializing node");

    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

    let key_path = data_dir.join(IDENTITY_KEY_FILE);
    if key_path.exists() && !args.force {
        bail!(
            "{} already exists; pass --force to replace it",
            key_path.display()
        );
    }

    let keypair = AccordKeypair::generate();
    let pubkey_hex = keypair.public_key().to_hex();
    std::fs::write(&key_path, hex::encode(keypair.secret_key_bytes()))
        .with_context(|| format!("failed to write identity key to {}", key_path.display()))?;

    // Restrict permissions on Unix.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&key_path, std::fs::Permissions::from_mode(0o600))?;
    }

    tracing::info!(
        public_key = %pubkey_hex,
        key_path = %key_path.display(),
        "identity key generated"
    );

    println!("Node initialized successfully.");
    println!("  Data directory : {}", data_dir.display());
    println!("  Identity key   : {}", key_path.display());
    println!("  Public key     : {}", pubkey_hex);

    Ok(())
}

/// Reads the identity key written by `init`, if there is one.
fn load_identity(data_dir: &Path) -> Result<Option<AccordKeypair>> {
    let key_path = data_dir.join(IDENTITY_KEY_FILE);
    if !key_path.exists() {
        return Ok(None);
    }
    let hex_key = std::fs::read_to_string(&key_path)
        .with_context(|| format!("failed to read {}", key_path.display()))?;
    let keypair = AccordKeypair::from_hex(hex_key.trim())
        .with_context(|| format!("{} does not hold a valid key", key_path.display()))?;
    Ok(Some(keypair))
}

/// One simulated node: its collaborators plus its inbound session stream.
struct SimNode {
    hub: ServiceHub,
    inbox: tokio::sync::mpsc::Receiver<accord_protocol::network::InboundSession>,
}

/// Runs one issuance per borrower, all concurrently, and prints how each
/// of them ended on both sides.
async fn simulate(args: cli::SimulateArgs) -> Result<()> {
    let config = args.flow_config();
    let map = Arc::new(NetworkMap::new());
    let net = InMemoryNetwork::new();
    let notary = Arc::new(SimpleNotary::new("Notary", AccordKeypair::generate()));
    map.register_notary(notary.identity());
    let contracts: Arc<dyn ContractVerifier> =
        Arc::new(ContractRegistry::new().register(IOU_CONTRACT_ID, Arc::new(IouContract)));

    let node = |name: String,
                keypair: AccordKeypair,
                checkpoints: Arc<dyn CheckpointStore>|
     -> SimNode {
        let keypair = Arc::new(keypair);
        let me = Party::from_keypair(name, &keypair);
        let inbox = net.register(&me);
        SimNode {
            hub: ServiceHub {
                keypair,
                identity: Arc::new(InMemoryIdentityService::new(me.clone(), Arc::clone(&map))),
                messaging: Arc::new(net.messaging(me)),
                contracts: Arc::clone(&contracts),
                notary: notary.clone(),
                checkpoints,
                config: config.clone(),
            },
            inbox,
        }
    };

    // --- Lender ---
    let (lender_key, lender_checkpoints): (AccordKeypair, Arc<dyn CheckpointStore>) =
        match &args.data_dir {
            Some(dir) => {
                let path = dir.join("checkpoints");
                let store = SledCheckpointStore::open(&path).with_context(|| {
                    format!("failed to open checkpoint store at {}", path.display())
                })?;
                let pending = store.list()?.len();
                if pending > 0 {
                    tracing::warn!(pending, "checkpoint store holds unfinished flows");
                }
                let key = load_identity(dir)?.unwrap_or_else(AccordKeypair::generate);
                let store: Arc<dyn CheckpointStore> = Arc::new(store);
                (key, store)
            }
            None => {
                let store: Arc<dyn CheckpointStore> = Arc::new(InMemoryCheckpointStore::new());
                (AccordKeypair::generate(), store)
            }
        };
    let lender = node("Lender".to_string(), lender_key, lender_checkpoints);

    // --- Borrowers ---
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut borrowers = Vec::new();
    for i in 1..args.parties {
        let borrower = node(
            format!("Borrower{i}"),
            AccordKeypair::generate(),
            Arc::new(InMemoryCheckpointStore::new()),
        );
        let validator: Arc<dyn Validator> = if args.reject && i == 1 {
            Arc::new(IouIssueValidator::new().with_max_amount(0))
        } else {
            Arc::new(IouIssueValidator::new())
        };
        let party = borrower.hub.me();
        let (_handle, reports) = ResponderDispatcher::new(borrower.hub, validator)
            .spawn(borrower.inbox, shutdown_rx.clone());
        borrowers.push((party, reports));
    }

    tracing::info!(
        borrowers = borrowers.len(),
        amount = args.amount,
        currency = %args.currency,
        "starting issuance"
    );

    // --- Issue ---
    let mut flows = Vec::new();
    for (borrower, _) in &borrowers {
        let iou = IouState::new(lender.hub.me(), borrower.clone(), args.amount, &args.currency);
        let request = iou.issue_request()?;
        let flow = ProposerFlow::new(lender.hub.clone(), request);
        flows.push(tokio::spawn(flow.run()));
    }
    let lender_results = join_all(flows).await;

    let mut rows = Vec::new();
    for ((borrower, reports), joined) in borrowers.iter_mut().zip(lender_results) {
        let lender_outcome = match joined.context("proposer task panicked")? {
            Ok(result) => format!("committed {}", result.id()),
            Err(e) => format!("aborted: {e}"),
        };
        let borrower_outcome = match reports.recv().await {
            Some(report) => describe(&report),
            None => "no report".to_string(),
        };
        rows.push((borrower.name().to_string(), lender_outcome, borrower_outcome));
    }
    let _ = shutdown_tx.send(true);

    if args.json {
        let report: Vec<_> = rows
            .iter()
            .map(|(borrower, lender, responder)| {
                serde_json::json!({
                    "borrower": borrower,
                    "lender": lender,
                    "borrower_outcome": responder,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for (borrower, lender, responder) in &rows {
            println!("{borrower:<12} lender: {lender}");
            println!("{:<12} borrower: {responder}", "");
        }
        println!("notarised transactions: {}", notary.committed_count());
    }

    Ok(())
}

fn describe(report: &ResponderReport) -> String {
    match &report.outcome {
        Ok(ResponderOutcome::Committed(result)) => format!("committed {}", result.id()),
        Ok(ResponderOutcome::Rejected(reason)) => format!("rejected: {reason}"),
        Ok(ResponderOutcome::Aborted(reason)) => format!("aborted: {reason}"),
        Err(e) => format!("failed: {e}"),
    }
}

/// Prints version information to stdout.
fn print_version() {
    println!("accord-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol    {}", accord_protocol::config::PROTOCOL_VERSION);
}
