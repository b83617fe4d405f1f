//! `fload key` – show where a remote object lives in the cache.

use anyhow::Result;
use fload_core::storage::CacheLayout;
use std::path::Path;

use super::location_from_args;
use crate::cli::RemoteArgs;

pub fn run_key(cache_dir: &Path, remote: &RemoteArgs) -> Result<()> {
    let location = location_from_args(remote)?;
    let layout = CacheLayout::resolve(&location, cache_dir);
    println!("key:   {}", location.object_key());
    println!("final: {}", layout.final_path.display());
    if let Some(temp) = &layout.temp_path {
        println!("temp:  {}", temp.display());
    }
    if let Some(iv) = &layout.iv_path {
        println!("iv:    {}", iv.display());
    }
    Ok(())
}
