//! Seam to the downstream image decoder.
//!
//! The engine never decodes anything itself. When a location needs decoding
//! and a `Decoder` is configured, the finished (or cached) file is handed
//! over on the blocking pool and the result is reported through the same
//! delegate as the transfer.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Requested output size, written `"<width>_<height>"`. Trailing `_`-separated
/// flags are kept verbatim for the decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizeFilter {
    pub width: u32,
    pub height: u32,
    pub flags: Vec<String>,
}

impl FromStr for SizeFilter {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('_');
        let bad = || DecodeError::Filter(s.to_string());
        let width = parts.next().and_then(|w| w.parse().ok()).ok_or_else(bad)?;
        let height = parts.next().and_then(|h| h.parse().ok()).ok_or_else(bad)?;
        Ok(SizeFilter {
            width,
            height,
            flags: parts.map(str::to_string).collect(),
        })
    }
}

impl fmt::Display for SizeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.width, self.height)?;
        for flag in &self.flags {
            write!(f, "_{}", flag)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DecodeRequest {
    pub path: PathBuf,
    pub filter: Option<SizeFilter>,
    /// Media-library id when the source is a library thumbnail.
    pub media_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub data: Arc<[u8]>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("bad size filter {0:?}")]
    Filter(String),
    #[error("cannot read {0}")]
    Io(String),
    #[error("unsupported image data")]
    Unsupported,
    #[error("{0}")]
    Other(String),
}

pub trait Decoder: Send + Sync + 'static {
    fn decode(&self, request: &DecodeRequest) -> Result<DecodedImage, DecodeError>;
}

/// Spaces consecutive decodes by a minimum gap. One pacer is shared by all
/// sessions that should be throttled together.
pub struct DecodePacer {
    min_gap: Duration,
    last: Mutex<Option<Instant>>,
}

impl DecodePacer {
    pub fn new(min_gap: Duration) -> Self {
        Self {
            min_gap,
            last: Mutex::new(None),
        }
    }

    pub fn from_millis(ms: u64) -> Self {
        Self::new(Duration::from_millis(ms))
    }

    /// Wait until at least `min_gap` has passed since the previous call.
    pub async fn pace(&self) {
        let mut last = self.last.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_gap {
                tokio::time::sleep(self.min_gap - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_filter() {
        let f: SizeFilter = "100_50".parse().unwrap();
        assert_eq!((f.width, f.height), (100, 50));
        assert!(f.flags.is_empty());

        let f: SizeFilter = "50_50_b".parse().unwrap();
        assert_eq!(f.flags, vec!["b".to_string()]);
        assert_eq!(f.to_string(), "50_50_b");
    }

    #[test]
    fn reject_bad_filter() {
        assert_eq!(
            "abc".parse::<SizeFilter>(),
            Err(DecodeError::Filter("abc".to_string()))
        );
        assert!("10".parse::<SizeFilter>().is_err());
        assert!("10_x".parse::<SizeFilter>().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn pacer_spaces_calls() {
        let pacer = DecodePacer::from_millis(20);
        let t0 = Instant::now();
        pacer.pace().await;
        assert_eq!(t0.elapsed(), Duration::ZERO);
        pacer.pace().await;
        assert!(t0.elapsed() >= Duration::from_millis(20));
    }

    #[tokio::test(start_paused = true)]
    async fn pacer_does_not_wait_after_gap() {
        let pacer = DecodePacer::from_millis(20);
        pacer.pace().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        let t0 = Instant::now();
        pacer.pace().await;
        assert_eq!(t0.elapsed(), Duration::ZERO);
    }
}
