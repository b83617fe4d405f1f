//! Location descriptors: where an object lives and how it is keyed on disk.
//!
//! Every source kind the engine understands is normalized once, at session
//! construction, into one `Location` variant. The variant decides the object
//! key (and with it the cache file names), the file extension, the cache
//! policy, and whether cipher material travels with the request.

use sha2::{Digest, Sha256};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

/// Identifier of the remote node (datacenter) currently serving an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub i32);

impl NodeId {
    /// Sentinel for objects whose node is unknown; such objects are cache-only.
    pub const UNREACHABLE: NodeId = NodeId(i32::MIN);
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Media kind of a remote object. Drives the extension and decode behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectKind {
    Photo,
    Video,
    Audio,
    Document { file_name: Option<String> },
}

/// How the remote side addresses the object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteAddress {
    /// Photo-style addressing by storage volume and local slot.
    Volume { volume_id: i64, local_id: i32, secret: i64 },
    /// Media/document addressing by object id.
    Object { id: i64, access_hash: i64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    /// Node the descriptor was issued for. Migration retargets the session,
    /// not the descriptor, so cache names stay stable.
    pub node: NodeId,
    pub address: RemoteAddress,
    pub kind: ObjectKind,
}

/// AES-256 key and the initial 32-byte IGE IV, supplied by the caller.
#[derive(Clone, PartialEq, Eq)]
pub struct CipherMaterial {
    pub key: [u8; 32],
    pub iv: [u8; 32],
}

impl fmt::Debug for CipherMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherMaterial")
            .field("key", &"<redacted>")
            .field("iv", &"<redacted>")
            .finish()
    }
}

/// A caller-owned local file, optionally backed by a media-library entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalMedia {
    pub path: PathBuf,
    pub media_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    RemoteFile(RemoteFile),
    RemoteFileEncrypted { file: RemoteFile, cipher: CipherMaterial },
    HttpUrl(Url),
    LocalOrMedia(LocalMedia),
}

#[derive(Debug, Error)]
pub enum LocationError {
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid media reference: {0}")]
    Media(String),
}

/// Cache behavior derived from the location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CachePolicy {
    /// Refetch even if the final file exists (the stale file is deleted).
    pub ignore_cache: bool,
    /// Never fetch; a cache miss is a failure.
    pub only_cache: bool,
    /// The final path belongs to the caller and is never deleted.
    pub caller_owned: bool,
    /// Finished bytes are handed to the decode collaborator.
    pub needs_decode: bool,
}

const HTTP_DEFAULT_EXT: &str = ".jpg";

impl Location {
    /// Parse a string reference: `http(s)://` URLs, `thumb://<media-id>:<path>`
    /// media references, or a bare local path.
    pub fn parse(s: &str) -> Result<Location, LocationError> {
        if s.starts_with("http") {
            return Ok(Location::HttpUrl(Url::parse(s)?));
        }
        if let Some(rest) = s.strip_prefix("thumb://") {
            let (id, path) = rest
                .split_once(':')
                .ok_or_else(|| LocationError::Media(s.to_string()))?;
            let media_id = id
                .parse::<i64>()
                .map_err(|_| LocationError::Media(s.to_string()))?;
            return Ok(Location::LocalOrMedia(LocalMedia {
                path: PathBuf::from(path),
                media_id: Some(media_id),
            }));
        }
        Ok(Location::LocalOrMedia(LocalMedia {
            path: PathBuf::from(s),
            media_id: None,
        }))
    }

    pub fn remote(&self) -> Option<&RemoteFile> {
        match self {
            Location::RemoteFile(file) | Location::RemoteFileEncrypted { file, .. } => Some(file),
            _ => None,
        }
    }

    pub fn cipher(&self) -> Option<&CipherMaterial> {
        match self {
            Location::RemoteFileEncrypted { cipher, .. } => Some(cipher),
            _ => None,
        }
    }

    /// Deterministic key naming the cache files. Repeated requests for the
    /// same object collapse onto the same files.
    pub fn object_key(&self) -> String {
        match self {
            Location::RemoteFile(file) | Location::RemoteFileEncrypted { file, .. } => {
                match file.address {
                    RemoteAddress::Volume { volume_id, local_id, .. } => {
                        format!("{}_{}", volume_id, local_id)
                    }
                    RemoteAddress::Object { id, .. } => format!("{}_{}", file.node, id),
                }
            }
            Location::HttpUrl(url) => {
                let digest = Sha256::digest(url.as_str().as_bytes());
                hex::encode(&digest[..16])
            }
            Location::LocalOrMedia(local) => local.path.to_string_lossy().into_owned(),
        }
    }

    /// Extension (with leading dot) of the cache files, or empty.
    pub fn extension(&self) -> String {
        match self {
            Location::RemoteFile(file) | Location::RemoteFileEncrypted { file, .. } => {
                match (&file.address, &file.kind) {
                    (RemoteAddress::Volume { .. }, _) => ".jpg".to_string(),
                    (_, ObjectKind::Photo) => ".jpg".to_string(),
                    (_, ObjectKind::Video) => ".mp4".to_string(),
                    (_, ObjectKind::Audio) => ".m4a".to_string(),
                    (_, ObjectKind::Document { file_name }) => {
                        file_name.as_deref().map(extension_of).unwrap_or_default()
                    }
                }
            }
            Location::HttpUrl(url) => {
                let last = url
                    .path_segments()
                    .and_then(|mut segs| segs.next_back())
                    .unwrap_or("");
                let ext = extension_of(last);
                if ext.is_empty() {
                    HTTP_DEFAULT_EXT.to_string()
                } else {
                    ext
                }
            }
            Location::LocalOrMedia(_) => String::new(),
        }
    }

    pub fn cache_policy(&self) -> CachePolicy {
        match self {
            Location::RemoteFile(file) | Location::RemoteFileEncrypted { file, .. } => {
                match file.address {
                    RemoteAddress::Volume { volume_id, .. } => CachePolicy {
                        ignore_cache: false,
                        only_cache: file.node == NodeId::UNREACHABLE
                            || volume_id == i32::MIN as i64,
                        caller_owned: false,
                        needs_decode: true,
                    },
                    RemoteAddress::Object { .. } => CachePolicy {
                        ignore_cache: true,
                        only_cache: false,
                        caller_owned: false,
                        needs_decode: false,
                    },
                }
            }
            Location::HttpUrl(_) => CachePolicy {
                ignore_cache: false,
                only_cache: false,
                caller_owned: false,
                needs_decode: true,
            },
            Location::LocalOrMedia(_) => CachePolicy {
                ignore_cache: false,
                only_cache: true,
                caller_owned: true,
                needs_decode: true,
            },
        }
    }

    pub fn media_id(&self) -> Option<i64> {
        match self {
            Location::LocalOrMedia(local) => local.media_id,
            _ => None,
        }
    }
}

/// Extension of a file name including the dot; empty when there is none or
/// when the name ends with a bare dot.
fn extension_of(name: &str) -> String {
    match name.rfind('.') {
        Some(idx) if name.len() - idx > 1 => name[idx..].to_string(),
        _ => String::new(),
    }
}
