//! Cache files and their lifecycle.
//!
//! Each object owns three files under the cache directory: the partial
//! payload (`<key>_temp<ext>`), the cipher checkpoint (`<key>.iv`, encrypted
//! objects only) and the finalized payload (`<key><ext>`). The temp file is
//! only ever appended to in offset order, so its length is the resume point
//! (rounded down to the chunk size). Finalizing renames temp to final.

mod iv;
mod layout;
mod resume;
mod temp;

pub use iv::IvFile;
pub use layout::CacheLayout;
pub use resume::{open_for_transfer, OpenedStorage};
pub use temp::TempFile;

use anyhow::{Context, Result};
use std::path::Path;

/// Infix between object key and extension for the partial payload.
pub const TEMP_INFIX: &str = "_temp";

/// Extension of the cipher checkpoint side-file.
pub const IV_EXT: &str = ".iv";

/// Rename the temp file onto the final path. Handles must already be closed.
pub fn finalize(temp_path: &Path, final_path: &Path) -> Result<()> {
    std::fs::rename(temp_path, final_path).with_context(|| {
        format!(
            "failed to rename {} to {}",
            temp_path.display(),
            final_path.display()
        )
    })
}

/// Create the directory a cache file lives in.
pub(crate) fn ensure_parent(path: &Path) -> Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create cache dir {}", dir.display())),
        _ => Ok(()),
    }
}

/// Remove a file if it exists; a missing file is not an error.
pub fn remove_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("failed to remove {}", path.display())),
    }
}
