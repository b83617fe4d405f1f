//! Append-only writer for the partial payload file.

use anyhow::{Context, Result};
use std::fs::File;
use std::path::Path;
#[cfg(unix)]
use std::os::unix::fs::FileExt;

/// Exclusive handle on a session's temp file. Writes land at the current
/// position and are synced before `append` returns, so the file length on
/// disk never runs ahead of what the session has committed.
pub struct TempFile {
    file: File,
    position: u64,
}

impl TempFile {
    /// Open (or create) the temp file and cut it back to `resume_at`, dropping
    /// any partial chunk left behind by an interrupted run.
    pub fn open(path: &Path, resume_at: u64) -> Result<Self> {
        super::ensure_parent(path)?;
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("failed to open temp file: {}", path.display()))?;
        file.set_len(resume_at)
            .with_context(|| format!("failed to truncate temp file to {}", resume_at))?;
        Ok(TempFile {
            file,
            position: resume_at,
        })
    }

    /// Append `data` at the current position and sync it.
    #[cfg(unix)]
    pub fn append(&mut self, data: &[u8]) -> Result<()> {
        self.file
            .write_all_at(data, self.position)
            .context("temp file write failed")?;
        self.file.sync_data().context("temp file sync failed")?;
        self.position += data.len() as u64;
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn append(&mut self, data: &[u8]) -> Result<()> {
        use std::io::{Seek, SeekFrom, Write};
        self.file.seek(SeekFrom::Start(self.position))?;
        self.file.write_all(data).context("temp file write failed")?;
        self.file.sync_data().context("temp file sync failed")?;
        self.position += data.len() as u64;
        Ok(())
    }

    /// Bytes committed to the file so far.
    pub fn position(&self) -> u64 {
        self.position
    }
}
