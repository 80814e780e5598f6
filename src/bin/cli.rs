//! OffsetDB CLI
//!
//! Command-line interface over a local OffsetDB data directory.

use std::process;

use clap::{Parser, Subcommand};
use offsetdb::config::{LogSyncStrategy, SnapshotPolicy};
use offsetdb::{Config, Engine};
use serde_json::Value;
use tracing_subscriber::{fmt, EnvFilter};

/// OffsetDB CLI
#[derive(Parser, Debug)]
#[command(name = "offsetdb-cli")]
#[command(about = "CLI for the OffsetDB record store")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./offsetdb_data")]
    data_dir: String,

    /// Initial read chunk size in bytes
    #[arg(long, default_value = "4096")]
    chunk_size: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Insert a record given as a JSON object with an "id" field
    Insert {
        /// The record, e.g. '{"id":1,"name":"A"}'
        json: String,
    },

    /// Replace the fields of an existing record
    Update {
        /// The record id
        id: u64,

        /// The new fields as a JSON object
        json: String,
    },

    /// Get a record by id
    Get {
        /// The record id
        id: u64,
    },

    /// List records in ascending id order
    List {
        /// Page number (1-based)
        #[arg(short, long, default_value = "1")]
        page: usize,

        /// Records per page
        #[arg(short, long, default_value = "100")]
        limit: usize,
    },

    /// Bulk-load demo records with ids 1..=count
    Seed {
        /// Number of records
        count: u64,
    },

    /// Rebuild the index by scanning the whole log
    Rebuild,

    /// Show engine statistics
    Stats,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,offsetdb=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // One-shot process: snapshot and sync every write
    let config = Config::builder()
        .data_dir(&args.data_dir)
        .read_chunk_size(args.chunk_size)
        .sync_strategy(LogSyncStrategy::EveryWrite)
        .snapshot_policy(SnapshotPolicy::EveryWrite)
        .build();

    tracing::debug!("offsetdb-cli v{}", offsetdb::VERSION);

    let engine = match Engine::open(config) {
        Ok(e) => e,
        Err(e) => {
            tracing::error!("Failed to open engine: {}", e);
            process::exit(1);
        }
    };

    let code = match run(&engine, args.command) {
        Ok(Outcome::Done) => 0,
        Ok(Outcome::NotFound(id)) => {
            eprintln!("record {} not found", id);
            2
        }
        Err(e) => {
            tracing::error!("{}", e);
            1
        }
    };

    // Close on every path, including not-found and failed commands
    if let Err(e) = engine.close() {
        tracing::error!("Failed to close engine: {}", e);
        process::exit(1);
    }
    tracing::info!("engine closed");

    if code != 0 {
        process::exit(code);
    }
}

/// How a command finished when it did not fail outright
enum Outcome {
    Done,
    NotFound(u64),
}

fn run(engine: &Engine, command: Commands) -> offsetdb::Result<Outcome> {
    match command {
        Commands::Insert { json } => {
            let value: Value = serde_json::from_str(&json)?;
            let record = engine.insert(value)?;
            println!("{}", serde_json::to_string(&record)?);
        }
        Commands::Update { id, json } => {
            let value: Value = serde_json::from_str(&json)?;
            match engine.update(id, value)? {
                Some(record) => println!("{}", serde_json::to_string(&record)?),
                None => return Ok(Outcome::NotFound(id)),
            }
        }
        Commands::Get { id } => match engine.find(id)? {
            Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
            None => return Ok(Outcome::NotFound(id)),
        },
        Commands::List { page, limit } => {
            let page = engine.get_many(page, limit)?;
            println!("{}", serde_json::to_string_pretty(&page)?);
        }
        Commands::Seed { count } => {
            let written = engine.bulk_load(count)?;
            println!("seeded {} records", written);
        }
        Commands::Rebuild => {
            let result = engine.rebuild_index()?;
            println!(
                "indexed {} lines, skipped {}, scanned {} bytes",
                result.records_indexed, result.lines_skipped, result.bytes_scanned
            );
        }
        Commands::Stats => {
            let stats = engine.stats()?;
            println!("records:          {}", stats.records);
            println!("log bytes:        {}", stats.log_bytes);
            println!("index source:     {:?}", stats.source);
            println!("lines skipped:    {}", stats.recovery.lines_skipped);
            println!("unreadable reads: {}", stats.unreadable_reads);
        }
    }
    Ok(Outcome::Done)
}
