//! prismd entry point.
//!
//! Operator tooling for a deployed variant cache: signature generation and
//! verification, index maintenance, and shard-layout diagnostics. Logging
//! goes to stderr as JSON; command results go to stdout as JSON.

use std::collections::BTreeMap;

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use prism_core::config::{AppConfig, IndexConfig};
use prism_core::index::SqliteIndex;
use prism_core::{shard, signature};

/// Image variant cache maintenance and diagnostics.
#[derive(Parser, Debug)]
#[command(name = "prismd", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate or verify request signatures.
    Signature(SignatureArgs),

    /// Inspect or purge the cache index.
    Index(IndexArgs),

    /// Print the sharded destination path for a key.
    Shard(ShardArgs),
}

#[derive(Args, Debug)]
struct SignatureArgs {
    #[command(subcommand)]
    command: SignatureCommand,
}

#[derive(Subcommand, Debug)]
enum SignatureCommand {
    /// Derive the signature for a query string.
    Sign {
        /// The signing secret.
        #[arg(long)]
        secret: String,
        /// Url-encoded request parameters, e.g. "op=resize&path=a.jpg&w=100".
        query: String,
    },

    /// Check a query string carrying a sig parameter.
    Verify {
        /// The signing secret.
        #[arg(long)]
        secret: String,
        /// Url-encoded request parameters including sig.
        query: String,
    },
}

#[derive(Args, Debug)]
struct IndexArgs {
    #[command(subcommand)]
    command: IndexCommand,
}

#[derive(Subcommand, Debug)]
enum IndexCommand {
    /// Entry count for the configured index backend.
    Stats,

    /// Delete entries by age and/or key prefix.
    Purge {
        /// Purge entries older than this many days.
        #[arg(long)]
        older_than_days: Option<i64>,

        /// Purge entries whose prefixed key starts with this string.
        #[arg(long)]
        key_prefix: Option<String>,
    },
}

#[derive(Args, Debug)]
struct ShardArgs {
    /// The request key to shard.
    key: String,

    /// Output format extension; defaults to the configured default format.
    #[arg(long)]
    format: Option<String>,
}

fn parse_query(query: &str) -> BTreeMap<String, String> {
    url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect()
}

/// Open the configured index backend for maintenance commands.
async fn open_sqlite_index() -> Result<SqliteIndex> {
    let config = AppConfig::load()?;
    match config.index {
        IndexConfig::Sqlite { db_path } => Ok(SqliteIndex::open(db_path).await?),
        IndexConfig::Memory => bail!("index maintenance requires the sqlite backend"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Signature(args) => match args.command {
            SignatureCommand::Sign { secret, query } => {
                let params = parse_query(&query);
                let sig = signature::sign(&secret, &params);
                println!("{}", serde_json::json!({ "sig": sig }));
            }
            SignatureCommand::Verify { secret, query } => {
                let params = parse_query(&query);
                let valid = signature::verify(&secret, &params);
                println!("{}", serde_json::json!({ "valid": valid }));
                if !valid {
                    std::process::exit(1);
                }
            }
        },
        Commands::Index(args) => match args.command {
            IndexCommand::Stats => {
                let index = open_sqlite_index().await?;
                println!("{}", serde_json::json!({ "entries": index.count().await? }));
            }
            IndexCommand::Purge { older_than_days, key_prefix } => {
                if older_than_days.is_none() && key_prefix.is_none() {
                    bail!("at least one of --older-than-days or --key-prefix must be specified");
                }

                let index = open_sqlite_index().await?;
                let mut deleted = 0u64;
                if let Some(days) = older_than_days {
                    deleted += index.purge_older_than(days).await?;
                }
                if let Some(prefix) = key_prefix {
                    deleted += index.purge_key_prefix(&prefix).await?;
                }
                println!("{}", serde_json::json!({ "deleted": deleted }));
            }
        },
        Commands::Shard(args) => {
            let config = AppConfig::load()?;
            let format = args
                .format
                .unwrap_or_else(|| config.default_format.clone());
            let path = format!("{}.{}", shard::shard_path(&args.key, &config.shard), format);
            println!("{}", serde_json::json!({ "key": args.key, "path": path }));
        }
    }

    Ok(())
}
