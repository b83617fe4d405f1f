//! AES-256 in IGE mode, applied in place with a running IV.
//!
//! The 32-byte IV is `[previous ciphertext block | previous plaintext block]`.
//! Each call advances it to the last blocks of the buffer it processed, so a
//! stream split into chunks decrypts identically to one contiguous call as
//! long as chunks are fed in offset order.

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, KeyInit};
use aes::{Aes256, Block};
use thiserror::Error;

use crate::location::CipherMaterial;

pub const BLOCK_LEN: usize = 16;
pub const IV_LEN: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    #[error("buffer length {0} is not a multiple of 16")]
    UnalignedLength(usize),
}

/// Running IGE cipher state for one session.
pub struct IgeCipher {
    aes: Aes256,
    iv: [u8; IV_LEN],
}

impl IgeCipher {
    pub fn new(key: &[u8; 32], iv: [u8; IV_LEN]) -> Self {
        Self {
            aes: Aes256::new(GenericArray::from_slice(key)),
            iv,
        }
    }

    pub fn from_material(material: &CipherMaterial) -> Self {
        Self::new(&material.key, material.iv)
    }

    /// Current IV; this is what gets persisted after each committed chunk.
    pub fn iv(&self) -> &[u8; IV_LEN] {
        &self.iv
    }

    /// Replace the running IV (resume from a persisted checkpoint).
    pub fn set_iv(&mut self, iv: [u8; IV_LEN]) {
        self.iv = iv;
    }

    pub fn decrypt_in_place(&mut self, buf: &mut [u8]) -> Result<(), CipherError> {
        if buf.len() % BLOCK_LEN != 0 {
            return Err(CipherError::UnalignedLength(buf.len()));
        }
        let (mut prev_cipher, mut prev_plain) = split_iv(&self.iv);
        for chunk in buf.chunks_exact_mut(BLOCK_LEN) {
            let mut cipher_block = [0u8; BLOCK_LEN];
            cipher_block.copy_from_slice(chunk);

            let mut block = Block::clone_from_slice(chunk);
            xor_in_place(&mut block, &prev_plain);
            self.aes.decrypt_block(&mut block);
            xor_in_place(&mut block, &prev_cipher);

            chunk.copy_from_slice(&block);
            prev_cipher = cipher_block;
            prev_plain.copy_from_slice(&block);
        }
        self.iv = join_iv(&prev_cipher, &prev_plain);
        Ok(())
    }

    pub fn encrypt_in_place(&mut self, buf: &mut [u8]) -> Result<(), CipherError> {
        if buf.len() % BLOCK_LEN != 0 {
            return Err(CipherError::UnalignedLength(buf.len()));
        }
        let (mut prev_cipher, mut prev_plain) = split_iv(&self.iv);
        for chunk in buf.chunks_exact_mut(BLOCK_LEN) {
            let mut plain_block = [0u8; BLOCK_LEN];
            plain_block.copy_from_slice(chunk);

            let mut block = Block::clone_from_slice(chunk);
            xor_in_place(&mut block, &prev_cipher);
            self.aes.encrypt_block(&mut block);
            xor_in_place(&mut block, &prev_plain);

            chunk.copy_from_slice(&block);
            prev_cipher.copy_from_slice(&block);
            prev_plain = plain_block;
        }
        self.iv = join_iv(&prev_cipher, &prev_plain);
        Ok(())
    }
}

fn split_iv(iv: &[u8; IV_LEN]) -> ([u8; BLOCK_LEN], [u8; BLOCK_LEN]) {
    let mut a = [0u8; BLOCK_LEN];
    let mut b = [0u8; BLOCK_LEN];
    a.copy_from_slice(&iv[..BLOCK_LEN]);
    b.copy_from_slice(&iv[BLOCK_LEN..]);
    (a, b)
}

fn join_iv(a: &[u8; BLOCK_LEN], b: &[u8; BLOCK_LEN]) -> [u8; IV_LEN] {
    let mut iv = [0u8; IV_LEN];
    iv[..BLOCK_LEN].copy_from_slice(a);
    iv[BLOCK_LEN..].copy_from_slice(b);
    iv
}

fn xor_in_place(block: &mut Block, other: &[u8; BLOCK_LEN]) {
    for (x, y) in block.iter_mut().zip(other.iter()) {
        *x ^= *y;
    }
}
