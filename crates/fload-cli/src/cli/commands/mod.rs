//! CLI command handlers, one file per command.

mod fetch;
mod get;
mod key;
mod report;

pub use fetch::run_fetch;
pub use get::run_get;
pub use key::run_key;

use anyhow::{bail, Context, Result};
use fload_core::{CipherMaterial, Location, NodeId, ObjectKind, RemoteAddress, RemoteFile};

use super::{KindArg, RemoteArgs};

/// Build the location described by the remote arguments.
pub(crate) fn location_from_args(args: &RemoteArgs) -> Result<Location> {
    let kind = match args.kind {
        KindArg::Photo => ObjectKind::Photo,
        KindArg::Video => ObjectKind::Video,
        KindArg::Audio => ObjectKind::Audio,
        KindArg::Document => ObjectKind::Document {
            file_name: args.file_name.clone(),
        },
    };
    let file = RemoteFile {
        node: NodeId(args.node),
        address: RemoteAddress::Object {
            id: args.id,
            access_hash: args.access_hash,
        },
        kind,
    };
    match (&args.key, &args.iv) {
        (Some(key), Some(iv)) => Ok(Location::RemoteFileEncrypted {
            file,
            cipher: CipherMaterial {
                key: parse_hex32(key).context("invalid --key")?,
                iv: parse_hex32(iv).context("invalid --iv")?,
            },
        }),
        (None, None) => Ok(Location::RemoteFile(file)),
        _ => bail!("--key and --iv must be given together"),
    }
}

fn parse_hex32(s: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(s.trim())?;
    let arr: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| anyhow::anyhow!("expected 32 bytes, got {}", bytes.len()))?;
    Ok(arr)
}
