//! Plain HTTP fallback: stream the whole body into the temp file.
//!
//! There is no resume here; the temp file is truncated on start. The curl
//! transfer runs on the blocking pool and posts each received block back to
//! the actor, which appends it.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use url::Url;

use super::actor::SessionActor;
use super::state::SessionState;
use super::SessionEvent;
use crate::config::HttpConfig;
use crate::error::FailureReason;
use crate::storage::{OpenedStorage, TempFile};
use crate::transport::{header_value, status_code};

impl SessionActor {
    pub(super) fn start_http(&mut self, url: Url) {
        let Some(temp_path) = self.layout.as_ref().and_then(|l| l.temp_path.clone()) else {
            return self.fail(FailureReason::Unavailable);
        };
        let temp = match TempFile::open(&temp_path, 0) {
            Ok(temp) => temp,
            Err(e) => return self.fail(FailureReason::local_io(&e)),
        };
        self.storage = Some(OpenedStorage {
            temp,
            iv_file: None,
            resume_iv: None,
        });
        self.committed = 0;

        let Some(tx) = self.live_tx.clone() else {
            return;
        };
        let abort = Arc::new(AtomicBool::new(false));
        self.http_abort = Some(Arc::clone(&abort));
        let http = self.http.clone();
        tracing::info!(%url, key = %self.object_key, "starting HTTP transfer");
        self.runtime.spawn_blocking(move || {
            let result = stream_body(url.as_str(), &http, &abort, &tx);
            if !abort.load(Ordering::Relaxed) {
                let _ = tx.send(SessionEvent::HttpEnd(result));
            }
        });
    }

    pub(super) fn on_http_length(&mut self, len: u64) {
        if self.state == SessionState::Started && self.total_size == 0 {
            self.total_size = len;
        }
    }

    pub(super) fn on_http_block(&mut self, block: Vec<u8>) {
        if self.state != SessionState::Started {
            return;
        }
        let Some(storage) = self.storage.as_mut() else {
            return;
        };
        if let Err(e) = storage.temp.append(&block) {
            return self.fail(FailureReason::local_io(&e));
        }
        self.committed += block.len() as u64;
        self.report_progress();
    }

    pub(super) fn on_http_end(&mut self, result: Result<(), String>) {
        if self.state != SessionState::Started {
            return;
        }
        match result {
            Ok(()) => self.finish(),
            Err(msg) => self.fail(FailureReason::Transport(msg)),
        }
    }
}

fn is_success(code: u32) -> bool {
    (200..300).contains(&code)
}

fn configure(easy: &mut curl::easy::Easy, url: &str, http: &HttpConfig) -> Result<(), curl::Error> {
    easy.url(url)?;
    easy.follow_location(true)?;
    easy.connect_timeout(Duration::from_secs(http.connect_timeout_secs))?;
    easy.low_speed_limit(http.low_speed_limit_bytes)?;
    easy.low_speed_time(Duration::from_secs(http.low_speed_time_secs))?;
    Ok(())
}

/// Run the transfer, forwarding body blocks of the final 2xx response.
fn stream_body(
    url: &str,
    http: &HttpConfig,
    abort: &AtomicBool,
    tx: &UnboundedSender<SessionEvent>,
) -> Result<(), String> {
    let status = Cell::new(0u32);
    let length: Cell<Option<u64>> = Cell::new(None);
    let length_sent = Cell::new(false);

    let mut easy = curl::easy::Easy::new();
    configure(&mut easy, url, http).map_err(|e| e.to_string())?;

    {
        let mut transfer = easy.transfer();
        transfer
            .header_function(|line| {
                if let Some(code) = status_code(line) {
                    status.set(code);
                    length.set(None);
                } else if let Some(value) = header_value(line, "Content-Length") {
                    length.set(value.parse().ok());
                }
                true
            })
            .map_err(|e| e.to_string())?;
        transfer
            .write_function(|data| {
                if abort.load(Ordering::Relaxed) {
                    return Ok(0);
                }
                if !is_success(status.get()) {
                    return Ok(data.len());
                }
                if !length_sent.replace(true) {
                    if let Some(len) = length.get() {
                        let _ = tx.send(SessionEvent::HttpLength(len));
                    }
                }
                if tx.send(SessionEvent::HttpBlock(data.to_vec())).is_err() {
                    return Ok(0);
                }
                Ok(data.len())
            })
            .map_err(|e| e.to_string())?;
        transfer.perform().map_err(|e| e.to_string())?;
    }

    let code = easy.response_code().map_err(|e| e.to_string())?;
    if !is_success(code) {
        return Err(format!("HTTP {}", code));
    }
    Ok(())
}
