//! daoindex CLI — inspect configuration and replay a demo ingestion.
//!
//! Usage:
//! ```bash
//! daoindex info
//! DAOINDEX_START_BLOCK=19000000 daoindex config
//! daoindex demo
//! ```

mod logging;

use std::env;
use std::process;
use std::sync::Arc;

use alloy_primitives::U256;
use anyhow::Context;
use daoindex_core::indexer::{env as vars, IndexerConfig};
use daoindex_core::types::{GovernanceEvent, RawEvent};
use daoindex_evm::{IndexerBuilder, MemoryLogSource, PassOutcome};

use crate::logging::{init_tracing, LogConfig};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let result = match args[1].as_str() {
        "info" => {
            cmd_info();
            Ok(())
        }
        "config" => cmd_config(),
        "demo" => cmd_demo(),
        "version" | "--version" | "-V" => {
            println!("daoindex {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            print_usage();
            process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

fn print_usage() {
    println!("daoindex {}", env!("CARGO_PKG_VERSION"));
    println!("Checkpointed DAO governance event indexer\n");
    println!("USAGE:");
    println!("    daoindex <COMMAND>\n");
    println!("COMMANDS:");
    println!("    info     Show default configuration");
    println!("    config   Print the configuration resolved from the environment");
    println!("    demo     Run catch-up and one live tick against an in-memory chain");
    println!("    version  Print version");
    println!("    help     Print this help\n");
    println!("ENVIRONMENT:");
    for var in [
        vars::START_BLOCK,
        vars::BATCH_SIZE,
        vars::POLL_INTERVAL_MS,
        vars::MAX_CONCURRENT_FETCHES,
        vars::DAO_ADDRESS,
        "DAOINDEX_LOG_LEVEL",
        "DAOINDEX_LOG_JSON",
        "RUST_LOG",
    ] {
        println!("    {var}");
    }
}

fn cmd_info() {
    let defaults = IndexerConfig::default();
    println!("DaoIndex v{}", env!("CARGO_PKG_VERSION"));
    println!("  Default start block: {}", defaults.start_block);
    println!("  Default batch size: {} blocks/query", defaults.batch_size);
    println!("  Default poll interval: {} ms", defaults.poll_interval_ms);
    println!(
        "  Default concurrent fetches: {}",
        defaults.max_concurrent_fetches
    );
    println!("  Events: ProposalCreated, Voted, ProposalExecuted");
    println!("  Storage backends: memory");
}

fn cmd_config() -> anyhow::Result<()> {
    init_tracing(&LogConfig::from_env());
    let config = IndexerConfig::from_env().context("invalid configuration")?;
    tracing::info!(
        start_block = config.start_block,
        batch_size = config.batch_size,
        "Configuration resolved"
    );
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn cmd_demo() -> anyhow::Result<()> {
    init_tracing(&LogConfig::from_env());
    let runtime = tokio::runtime::Runtime::new().context("failed to start runtime")?;
    runtime.block_on(run_demo())
}

async fn run_demo() -> anyhow::Result<()> {
    let source = Arc::new(MemoryLogSource::new());
    source.set_head(100);
    source.push(RawEvent {
        block_number: 100,
        log_index: 0,
        transaction_hash: "0xc7".into(),
        event: GovernanceEvent::ProposalCreated {
            proposal_id: U256::from(7u64),
            creator: "0xabc".into(),
            description: "Test".into(),
            start_block: 100,
        },
    });

    let indexer = IndexerBuilder::new()
        .start_block(100)
        .build_in_memory(source.clone())?;
    report("catch-up", indexer.catch_up().await)?;

    source.push(RawEvent {
        block_number: 103,
        log_index: 0,
        transaction_hash: "0xv103".into(),
        event: GovernanceEvent::Voted {
            proposal_id: U256::from(7u64),
            voter: "0xdef".into(),
            support: true,
            weight: U256::from(1_000_000_000_000_000_000u64),
        },
    });
    source.push(RawEvent {
        block_number: 105,
        log_index: 0,
        transaction_hash: "0xe7".into(),
        event: GovernanceEvent::ProposalExecuted {
            proposal_id: U256::from(7u64),
        },
    });
    source.set_head(105);
    report("live tick", indexer.poll_once().await)?;

    let reader = indexer.reader();
    println!("{}", serde_json::to_string_pretty(&reader.list_proposals())?);
    println!("{}", serde_json::to_string_pretty(&indexer.status())?);
    Ok(())
}

fn report(label: &str, outcome: PassOutcome) -> anyhow::Result<()> {
    match outcome {
        PassOutcome::Applied { from, to, report } => {
            println!(
                "{label}: blocks {from}..={to}, {} events applied, {} anomalies",
                report.applied(),
                report.anomalies.len()
            );
            Ok(())
        }
        PassOutcome::UpToDate { checkpoint } => {
            println!("{label}: up to date at block {checkpoint}");
            Ok(())
        }
        PassOutcome::Skipped => {
            println!("{label}: skipped");
            Ok(())
        }
        PassOutcome::Failed(e) => Err(e).context(format!("{label} failed")),
    }
}
