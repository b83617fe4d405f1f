#![allow(dead_code)]

pub mod range_server;
pub mod recorder;
pub mod scripted;

use fload_core::cipher::IgeCipher;
use fload_core::{CipherMaterial, Location, NodeId, ObjectKind, RemoteAddress, RemoteFile};

pub const CHUNK: u64 = 32 * 1024;

/// Deterministic, non-repeating-per-chunk test payload.
pub fn sample_body(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 7 + i / 251) % 256) as u8).collect()
}

pub fn document(node: i32, id: i64) -> RemoteFile {
    RemoteFile {
        node: NodeId(node),
        address: RemoteAddress::Object { id, access_hash: 0x5eed },
        kind: ObjectKind::Document {
            file_name: Some("payload.bin".to_string()),
        },
    }
}

pub fn photo(node: i32, volume_id: i64, local_id: i32) -> RemoteFile {
    RemoteFile {
        node: NodeId(node),
        address: RemoteAddress::Volume {
            volume_id,
            local_id,
            secret: 1,
        },
        kind: ObjectKind::Photo,
    }
}

pub fn material() -> CipherMaterial {
    let mut iv = [0u8; 32];
    for (i, b) in iv.iter_mut().enumerate() {
        *b = (i * 3) as u8;
    }
    CipherMaterial { key: [0x42; 32], iv }
}

pub fn encrypted_document(node: i32, id: i64) -> Location {
    Location::RemoteFileEncrypted {
        file: document(node, id),
        cipher: material(),
    }
}

/// Encrypt `plain` (length a multiple of 16) as the server would serve it.
pub fn encrypt(plain: &[u8], material: &CipherMaterial) -> Vec<u8> {
    let mut buf = plain.to_vec();
    IgeCipher::from_material(material)
        .encrypt_in_place(&mut buf)
        .unwrap();
    buf
}
