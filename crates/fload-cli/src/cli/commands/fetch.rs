//! `fload fetch` – range-fetch a remote object through the `[nodes]` gateways.

use anyhow::{bail, Context, Result};
use fload_core::config::FloadConfig;
use fload_core::decode::DecodePacer;
use fload_core::transport::HttpRangeTransport;
use fload_core::{NodeId, SessionBuilder};
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Handle;

use super::location_from_args;
use super::report::{print_summary, ConsoleDelegate};
use crate::cli::RemoteArgs;

pub async fn run_fetch(cfg: &FloadConfig, cache_dir: &Path, remote: &RemoteArgs, size: u64) -> Result<()> {
    let location = location_from_args(remote)?;
    if !cfg.node_gateways().contains_key(&NodeId(remote.node)) {
        bail!(
            "no gateway for node {} (add it under [nodes] in config.toml)",
            remote.node
        );
    }

    let transport = Arc::new(HttpRangeTransport::from_config(cfg, Handle::current()));
    let handle = SessionBuilder::new(Some(location), cache_dir)
        .total_size(size)
        .transport(transport)
        .http_config(cfg.http.clone())
        .pacer(Arc::new(DecodePacer::from_millis(cfg.decode_pace_ms)))
        .delegate(Arc::new(ConsoleDelegate))
        .spawn(&Handle::current());
    handle.start();
    let summary = handle.join().await.context("session task failed")?;
    print_summary(&summary)
}
