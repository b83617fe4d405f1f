//! The 32-byte cipher checkpoint side-file.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::cipher::IV_LEN;

pub struct IvFile {
    file: File,
}

impl IvFile {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .with_context(|| format!("failed to open iv file: {}", path.display()))?;
        Ok(IvFile { file })
    }

    /// The stored IV, or `None` when the file is empty or not exactly 32 bytes.
    pub fn load(&mut self) -> Result<Option<[u8; IV_LEN]>> {
        let len = self.file.metadata().context("stat iv file")?.len();
        if len != IV_LEN as u64 {
            return Ok(None);
        }
        let mut iv = [0u8; IV_LEN];
        self.file.seek(SeekFrom::Start(0))?;
        self.file.read_exact(&mut iv).context("read iv file")?;
        Ok(Some(iv))
    }

    /// Overwrite the checkpoint and sync it.
    pub fn store(&mut self, iv: &[u8; IV_LEN]) -> Result<()> {
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(iv).context("write iv file")?;
        self.file.set_len(IV_LEN as u64)?;
        self.file.sync_data().context("iv file sync failed")?;
        Ok(())
    }
}
