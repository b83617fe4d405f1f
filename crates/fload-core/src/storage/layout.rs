//! Deterministic cache file names for a location.

use std::path::{Path, PathBuf};

use super::{IV_EXT, TEMP_INFIX};
use crate::location::Location;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheLayout {
    pub final_path: PathBuf,
    /// `None` for caller-owned local files, which are never fetched.
    pub temp_path: Option<PathBuf>,
    /// Present only for encrypted locations.
    pub iv_path: Option<PathBuf>,
}

impl CacheLayout {
    pub fn resolve(location: &Location, cache_dir: &Path) -> Self {
        if let Location::LocalOrMedia(local) = location {
            return CacheLayout {
                final_path: local.path.clone(),
                temp_path: None,
                iv_path: None,
            };
        }
        let key = location.object_key();
        let ext = location.extension();
        let iv_path = location
            .cipher()
            .map(|_| cache_dir.join(format!("{}{}", key, IV_EXT)));
        CacheLayout {
            final_path: cache_dir.join(format!("{}{}", key, ext)),
            temp_path: Some(cache_dir.join(format!("{}{}{}", key, TEMP_INFIX, ext))),
            iv_path,
        }
    }
}
