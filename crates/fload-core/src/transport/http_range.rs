//! Reference `RequestTransport` over HTTP Range GETs.
//!
//! Each node maps to a gateway base URL; an object is fetched from
//! `<base>/<object-key>`. Requests run as blocking curl transfers on the
//! runtime's blocking pool.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;

use super::{AbortRegistry, Completion, RangeRequest, RequestToken, RequestTransport, TransportError, TransportResult};
use crate::config::{FloadConfig, HttpConfig};
use crate::location::NodeId;

/// Response header naming the node an object moved to (with status 421).
pub const MIGRATE_HEADER: &str = "X-Migrate-Node";

pub struct HttpRangeTransport {
    nodes: HashMap<NodeId, String>,
    http: HttpConfig,
    runtime: Handle,
    aborts: Arc<AbortRegistry>,
}

impl HttpRangeTransport {
    pub fn new(nodes: HashMap<NodeId, String>, http: HttpConfig, runtime: Handle) -> Self {
        Self {
            nodes,
            http,
            runtime,
            aborts: Arc::new(AbortRegistry::new()),
        }
    }

    pub fn from_config(cfg: &FloadConfig, runtime: Handle) -> Self {
        Self::new(cfg.node_gateways(), cfg.http.clone(), runtime)
    }

    fn url_for(&self, request: &RangeRequest) -> Option<String> {
        self.nodes
            .get(&request.node)
            .map(|base| format!("{}/{}", base.trim_end_matches('/'), request.object_key))
    }
}

impl RequestTransport for HttpRangeTransport {
    fn submit(&self, request: RangeRequest, completion: Completion) -> RequestToken {
        let (id, flag) = self.aborts.register();
        let token = RequestToken(id);
        let Some(url) = self.url_for(&request) else {
            self.aborts.unregister(id);
            completion.complete(Err(TransportError::Other(format!(
                "no gateway configured for node {}",
                request.node
            ))));
            return token;
        };

        tracing::debug!(
            offset = request.offset,
            limit = request.limit,
            node = %request.node,
            in_flight = self.aborts.active(),
            %url,
            "range request"
        );
        let aborts = Arc::clone(&self.aborts);
        let http = self.http.clone();
        self.runtime.spawn_blocking(move || {
            let result = fetch_range(&url, request.offset, request.limit, &http, &flag);
            aborts.unregister(id);
            if flag.load(Ordering::Relaxed) {
                return;
            }
            completion.complete(result);
        });
        token
    }

    fn abort(&self, token: RequestToken) {
        self.aborts.request_abort(token.0);
    }
}

fn curl_err(e: curl::Error) -> TransportError {
    TransportError::Other(e.to_string())
}

fn fetch_range(url: &str, offset: u64, limit: u32, http: &HttpConfig, abort: &AtomicBool) -> TransportResult {
    let mut body: Vec<u8> = Vec::with_capacity(limit as usize);
    let mut migrate_to: Option<String> = None;

    let mut easy = curl::easy::Easy::new();
    easy.url(url).map_err(curl_err)?;
    easy.follow_location(true).map_err(curl_err)?;
    easy.connect_timeout(Duration::from_secs(http.connect_timeout_secs))
        .map_err(curl_err)?;
    easy.low_speed_limit(http.low_speed_limit_bytes).map_err(curl_err)?;
    easy.low_speed_time(Duration::from_secs(http.low_speed_time_secs))
        .map_err(curl_err)?;
    let end = offset + u64::from(limit).max(1) - 1;
    easy.range(&format!("{}-{}", offset, end)).map_err(curl_err)?;

    {
        let mut transfer = easy.transfer();
        transfer
            .header_function(|line| {
                if let Some(value) = header_value(line, MIGRATE_HEADER) {
                    migrate_to = Some(value);
                }
                true
            })
            .map_err(curl_err)?;
        transfer
            .write_function(|data| {
                if abort.load(Ordering::Relaxed) {
                    return Ok(0);
                }
                body.extend_from_slice(data);
                Ok(data.len())
            })
            .map_err(curl_err)?;
        transfer.perform().map_err(curl_err)?;
    }

    let code = easy.response_code().map_err(curl_err)?;
    map_response(code, migrate_to.as_deref(), body, offset, limit)
}

/// Value of header `name` if `line` is that header.
pub(crate) fn header_value(line: &[u8], name: &str) -> Option<String> {
    let line = std::str::from_utf8(line).ok()?;
    let (key, value) = line.split_once(':')?;
    if key.trim().eq_ignore_ascii_case(name) {
        Some(value.trim().to_string())
    } else {
        None
    }
}

/// Status code if `line` is a response status line.
pub(crate) fn status_code(line: &[u8]) -> Option<u32> {
    let line = std::str::from_utf8(line).ok()?;
    if !line.starts_with("HTTP/") {
        return None;
    }
    line.split_whitespace().nth(1)?.parse().ok()
}

/// Turn a finished HTTP exchange into a transport result.
fn map_response(code: u32, migrate_to: Option<&str>, mut body: Vec<u8>, offset: u64, limit: u32) -> TransportResult {
    match code {
        206 => {
            body.truncate(limit as usize);
            Ok(body)
        }
        // Server ignored the range and sent the whole object.
        200 => {
            let start = (offset as usize).min(body.len());
            let end = start.saturating_add(limit as usize).min(body.len());
            Ok(body[start..end].to_vec())
        }
        416 => Err(TransportError::InvalidOffset),
        421 => match migrate_to.and_then(|n| n.parse::<i32>().ok()) {
            Some(n) => Err(TransportError::Migrate(NodeId(n))),
            None => Err(TransportError::Other(format!(
                "HTTP 421 without a usable {} header",
                MIGRATE_HEADER
            ))),
        },
        _ => Err(TransportError::Other(format!("HTTP {}", code))),
    }
}
