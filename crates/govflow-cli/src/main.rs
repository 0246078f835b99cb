//! govflow - Governance Engine Operator CLI
//!
//! Operator tooling for the durable artifacts of the governance engine:
//! audit ledger verification, configuration validation, and evidence
//! content hashing.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::DateTime;
use clap::{Parser, Subcommand};
use govflow_core::config::GovernanceConfig;
use govflow_core::crypto::{ContentHasher, hex_encode};
use govflow_core::ledger::Ledger;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// govflow - Governance Engine Operator CLI
#[derive(Parser, Debug)]
#[command(name = "govflow")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    // === Configuration ===
    /// Validate a governance configuration file
    CheckConfig {
        /// Path to the configuration file
        #[arg(default_value = "govflow.toml")]
        config: PathBuf,
    },

    /// Print the default configuration as TOML
    DefaultConfig,

    // === Audit ledger ===
    /// Verify the audit ledger's hash chain from genesis
    VerifyLedger {
        /// Path to the ledger database
        db: PathBuf,
    },

    /// Print audit ledger statistics
    LedgerStats {
        /// Path to the ledger database
        db: PathBuf,
    },

    /// Print audit ledger events after a cursor
    LedgerTail {
        /// Path to the ledger database
        db: PathBuf,

        /// Sequence id to read after
        #[arg(long, default_value_t = 0)]
        cursor: u64,

        /// Maximum events to print
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },

    // === Evidence ===
    /// Compute the content hash of a file (the evidence object address)
    Hash {
        /// Path to the file
        file: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Commands::CheckConfig { config } => {
            let parsed = GovernanceConfig::from_file(&config)
                .with_context(|| format!("config {} failed validation", config.display()))?;
            println!(
                "ok: {} tenant(s), tick every {}s, binder format {}",
                parsed.tenants.len(),
                parsed.clock.tick_interval_secs,
                parsed.binder.format
            );
            Ok(())
        }

        Commands::DefaultConfig => {
            print!("{}", GovernanceConfig::default().to_toml()?);
            Ok(())
        }

        Commands::VerifyLedger { db } => {
            let ledger = open_ledger(&db)?;
            ledger
                .verify_chain()
                .context("audit ledger hash chain verification failed")?;
            let stats = ledger.stats()?;
            match ledger.head_hash_hex()? {
                Some(head) => println!("ok: {} event(s), head {head}", stats.event_count),
                None => println!("ok: ledger is empty"),
            }
            Ok(())
        }

        Commands::LedgerStats { db } => {
            let ledger = open_ledger(&db)?;
            let stats = ledger.stats()?;
            println!(
                "{}",
                serde_json::json!({
                    "event_count": stats.event_count,
                    "first_timestamp_ns": stats.first_timestamp_ns,
                    "last_timestamp_ns": stats.last_timestamp_ns,
                    "head_hash": ledger.head_hash_hex()?,
                })
            );
            Ok(())
        }

        Commands::LedgerTail { db, cursor, limit } => {
            let ledger = open_ledger(&db)?;
            for record in ledger.read_from(cursor, limit)? {
                let when = DateTime::from_timestamp_nanos(record.timestamp_ns as i64);
                println!(
                    "{:>6}  {}  {:<24} {:<12} {} -> {}",
                    record.seq_id,
                    when.format("%Y-%m-%dT%H:%M:%SZ"),
                    record.event_type,
                    record.tenant_id,
                    record.subject_id,
                    record.detail,
                );
            }
            Ok(())
        }

        Commands::Hash { file } => {
            let content = std::fs::read(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            if content.is_empty() {
                bail!("refusing to hash an empty file: empty evidence objects are rejected");
            }
            println!("{}", hex_encode(&ContentHasher::hash_content(&content)));
            Ok(())
        }
    }
}

fn open_ledger(db: &PathBuf) -> Result<Ledger> {
    if !db.exists() {
        bail!("ledger database not found: {}", db.display());
    }
    Ledger::open(db).with_context(|| format!("failed to open ledger {}", db.display()))
}
