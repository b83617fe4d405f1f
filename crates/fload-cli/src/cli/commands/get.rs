//! `fload get <url>` – stream a plain HTTP/HTTPS resource into the cache.

use anyhow::{bail, Context, Result};
use fload_core::config::FloadConfig;
use fload_core::{Location, SessionBuilder};
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Handle;

use super::report::{print_summary, ConsoleDelegate};

pub async fn run_get(cfg: &FloadConfig, cache_dir: &Path, url: &str) -> Result<()> {
    let location = Location::parse(url).with_context(|| format!("invalid URL: {}", url))?;
    if !matches!(location, Location::HttpUrl(_)) {
        bail!("not an http(s) URL: {}", url);
    }

    let handle = SessionBuilder::new(Some(location), cache_dir)
        .http_config(cfg.http.clone())
        .delegate(Arc::new(ConsoleDelegate))
        .spawn(&Handle::current());
    handle.start();
    let summary = handle.join().await.context("session task failed")?;
    print_summary(&summary)
}
