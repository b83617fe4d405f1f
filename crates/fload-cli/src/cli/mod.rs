//! CLI for the fload transfer engine.

mod commands;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use fload_core::{config, logging};
use std::path::PathBuf;

use commands::{run_fetch, run_get, run_key};

/// Top-level CLI for fload.
#[derive(Debug, Parser)]
#[command(name = "fload")]
#[command(about = "fload: resumable single-object transfers", long_about = None)]
pub struct Cli {
    /// Cache directory (overrides `cache_dir` in config.toml).
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// More log detail; repeat for per-chunk traces.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Photo,
    Video,
    Audio,
    Document,
}

/// Identifies a remote object.
#[derive(Debug, Clone, Args)]
pub struct RemoteArgs {
    /// Node the object was issued for.
    #[arg(long)]
    pub node: i32,
    /// Object id.
    #[arg(long)]
    pub id: i64,
    #[arg(long, allow_hyphen_values = true)]
    pub access_hash: i64,
    #[arg(long, value_enum, default_value = "document")]
    pub kind: KindArg,
    /// Original file name; its extension names the cache files.
    #[arg(long)]
    pub file_name: Option<String>,
    /// AES-256 key, 64 hex digits. Requires --iv.
    #[arg(long, requires = "iv", value_name = "HEX")]
    pub key: Option<String>,
    /// Initial IGE IV, 64 hex digits. Requires --key.
    #[arg(long, requires = "key", value_name = "HEX")]
    pub iv: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download a plain HTTP/HTTPS URL into the cache.
    Get {
        url: String,
    },

    /// Fetch a remote object through the configured range gateways.
    Fetch {
        #[command(flatten)]
        remote: RemoteArgs,
        /// Expected size in bytes (0 or absent = unknown).
        #[arg(long, default_value = "0")]
        size: u64,
    },

    /// Print the cache file names for a remote object.
    Key {
        #[command(flatten)]
        remote: RemoteArgs,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        if let Err(err) = logging::init_logging(cli.verbose) {
            logging::init_logging_stderr(cli.verbose);
            tracing::warn!("file logging unavailable ({:#}), logging to stderr", err);
        }

        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);
        let cache_dir = match cli.cache_dir {
            Some(dir) => dir,
            None => cfg.resolved_cache_dir()?,
        };

        match cli.command {
            CliCommand::Get { url } => run_get(&cfg, &cache_dir, &url).await?,
            CliCommand::Fetch { remote, size } => run_fetch(&cfg, &cache_dir, &remote, size).await?,
            CliCommand::Key { remote } => run_key(&cache_dir, &remote)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
