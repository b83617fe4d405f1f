//! Logging init: `fload.log` under the XDG state dir, or stderr.
//!
//! Session code logs per-chunk activity at `trace` and per-transfer events
//! at `debug`/`info`, so verbosity maps onto how much of a transfer is
//! visible. `RUST_LOG` always wins over the verbosity level.

use anyhow::{anyhow, Context, Result};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

pub const LOG_FILE_NAME: &str = "fload.log";

/// Filter directives for a verbosity count (`-v` repetitions).
pub fn filter_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info,fload=debug,fload_core=debug",
        1 => "info,fload=debug,fload_core=trace",
        _ => "debug,fload=trace,fload_core=trace",
    }
}

fn env_filter(verbosity: u8) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_for(verbosity)))
}

/// Create `dir` if needed and open the log file in it for appending.
pub fn open_log_file(dir: &Path) -> Result<(File, PathBuf)> {
    fs::create_dir_all(dir).with_context(|| format!("create log dir {}", dir.display()))?;
    let path = dir.join(LOG_FILE_NAME);
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open log file {}", path.display()))?;
    Ok((file, path))
}

/// Log to `~/.local/state/fload/fload.log`. Returns Err when the state dir
/// is unwritable or a subscriber is already installed; the caller falls back
/// to `init_logging_stderr`.
pub fn init_logging(verbosity: u8) -> Result<()> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("fload")?;
    let (file, path) = open_log_file(&xdg_dirs.get_state_home())?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbosity))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow!("install log subscriber: {}", e))?;

    tracing::info!(path = %path.display(), verbosity, "fload logging initialized");
    Ok(())
}

/// Stderr-only logging. A subscriber that is already installed is left in place.
pub fn init_logging_stderr(verbosity: u8) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbosity))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init();
}
