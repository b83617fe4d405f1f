//! Resume detection: how much of a previous run can be kept.
//!
//! The temp file length is rounded down to the chunk size. For encrypted
//! objects the checkpoint IV must belong to a chunk boundary on disk. The
//! plaintext already written is encrypted again with the caller's key and
//! initial IV, which yields the exact IV at every boundary. Payload is synced
//! before the IV, so an interrupted commit leaves the checkpoint at most one
//! chunk behind: a checkpoint equal to the IV at the aligned length resumes
//! there, one equal to the IV a chunk earlier resumes a chunk earlier, and
//! anything else restarts from 0.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use super::iv::IvFile;
use super::layout::CacheLayout;
use super::temp::TempFile;
use crate::cipher::{IgeCipher, IV_LEN};
use crate::location::CipherMaterial;

/// Storage opened for a fetch, positioned at the resume point.
pub struct OpenedStorage {
    pub temp: TempFile,
    pub iv_file: Option<IvFile>,
    /// IV to continue decrypting with; `None` means use the caller's IV.
    pub resume_iv: Option<[u8; IV_LEN]>,
}

impl OpenedStorage {
    pub fn committed(&self) -> u64 {
        self.temp.position()
    }
}

/// Open the temp file (and IV file when `material` is given) and work out
/// where the previous run can be continued from.
pub fn open_for_transfer(
    layout: &CacheLayout,
    chunk_size: u64,
    material: Option<&CipherMaterial>,
) -> Result<OpenedStorage> {
    let temp_path = layout
        .temp_path
        .as_deref()
        .context("location has no temp file")?;
    super::ensure_parent(temp_path)?;
    let existing = match std::fs::metadata(temp_path) {
        Ok(m) => m.len(),
        Err(_) => 0,
    };
    let aligned = existing / chunk_size * chunk_size;

    let (iv_file, committed, resume_iv) = match (material, layout.iv_path.as_deref()) {
        (Some(material), Some(iv_path)) => {
            let mut iv_file = IvFile::open(iv_path)?;
            let resumed = match iv_file.load()? {
                Some(iv) if aligned > 0 => {
                    checkpoint_offset(temp_path, aligned, chunk_size, &iv, material)?
                        .map(|offset| (offset, iv))
                }
                _ => None,
            };
            match resumed {
                Some((offset, iv)) => {
                    if offset < aligned {
                        tracing::debug!(offset, aligned, "iv checkpoint lags payload by one chunk");
                    }
                    (Some(iv_file), offset, Some(iv))
                }
                None => {
                    if aligned > 0 {
                        tracing::info!(
                            path = %temp_path.display(),
                            aligned,
                            "iv checkpoint missing or inconsistent, restarting from 0"
                        );
                    }
                    (Some(iv_file), 0, None)
                }
            }
        }
        _ => (None, aligned, None),
    };

    let temp = TempFile::open(temp_path, committed)?;
    if committed > 0 {
        tracing::debug!(path = %temp_path.display(), committed, "resuming partial download");
    }
    Ok(OpenedStorage {
        temp,
        iv_file,
        resume_iv,
    })
}

/// The chunk boundary `iv` was checkpointed at: `aligned`, one chunk before
/// it, or `None` when it matches neither.
fn checkpoint_offset(
    temp_path: &Path,
    aligned: u64,
    chunk_size: u64,
    iv: &[u8; IV_LEN],
    material: &CipherMaterial,
) -> Result<Option<u64>> {
    let previous = aligned - chunk_size;
    let mut cipher = IgeCipher::from_material(material);
    let mut at_previous = material.iv;

    let file = File::open(temp_path)
        .with_context(|| format!("failed to open temp file: {}", temp_path.display()))?;
    let mut reader = BufReader::new(file);
    let mut buf = vec![0u8; chunk_size as usize];
    let mut offset = 0u64;
    while offset < aligned {
        reader
            .read_exact(&mut buf)
            .with_context(|| format!("short read at {} while checking iv", offset))?;
        cipher
            .encrypt_in_place(&mut buf)
            .context("chunk size is not a multiple of the cipher block")?;
        offset += chunk_size;
        if offset == previous {
            at_previous = *cipher.iv();
        }
    }

    if cipher.iv() == iv {
        Ok(Some(aligned))
    } else if &at_previous == iv {
        Ok(Some(previous))
    } else {
        Ok(None)
    }
}
