//! Minimal HTTP/1.1 server for integration tests.
//!
//! Serves one static body for every path. GET with `Range: bytes=a-b` gets
//! 206 (or 416 past the end); without a range, 200 with the full body.
//! Options turn it into a server that ignores ranges, always answers with a
//! fixed error status, or redirects every request to another node.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::Arc;
use std::thread;

#[derive(Debug, Clone, Copy)]
pub struct RangeServerOptions {
    /// If false, GET ignores Range and always returns 200 with the full body.
    pub support_ranges: bool,
    /// Answer every request with this status and an empty body.
    pub status: Option<u16>,
    /// Answer every request with 421 and `X-Migrate-Node: <n>`.
    pub migrate_to: Option<i32>,
}

impl Default for RangeServerOptions {
    fn default() -> Self {
        Self {
            support_ranges: true,
            status: None,
            migrate_to: None,
        }
    }
}

/// Starts a server in a background thread serving `body`. Returns the base URL
/// (e.g. "http://127.0.0.1:12345/"). The server runs until the process exits.
pub fn start(body: Vec<u8>) -> String {
    start_with_options(body, RangeServerOptions::default())
}

pub fn start_with_options(body: Vec<u8>, opts: RangeServerOptions) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let body = Arc::new(body);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let body = Arc::clone(&body);
            thread::spawn(move || handle(stream, &body, opts));
        }
    });
    format!("http://127.0.0.1:{}/", port)
}

fn respond(stream: &mut std::net::TcpStream, status: &str, headers: &str, body: &[u8]) {
    let head = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n{}\r\n",
        status,
        body.len(),
        headers
    );
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(body);
}

fn handle(mut stream: std::net::TcpStream, body: &[u8], opts: RangeServerOptions) {
    let _ = stream.set_read_timeout(Some(std::time::Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(std::time::Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let (method, range) = parse_request(request);
    if !method.eq_ignore_ascii_case("GET") {
        respond(&mut stream, "405 Method Not Allowed", "", b"");
        return;
    }
    if let Some(node) = opts.migrate_to {
        let header = format!("X-Migrate-Node: {}\r\n", node);
        respond(&mut stream, "421 Misdirected Request", &header, b"");
        return;
    }
    if let Some(code) = opts.status {
        respond(&mut stream, &format!("{} Error", code), "", b"");
        return;
    }

    let total = body.len() as u64;
    match range.filter(|_| opts.support_ranges) {
        Some((start, end_incl)) => {
            let end_incl = end_incl.min(total.saturating_sub(1));
            if start >= total || start > end_incl {
                let header = format!("Content-Range: bytes */{}\r\n", total);
                respond(&mut stream, "416 Range Not Satisfiable", &header, b"");
            } else {
                let slice = &body[start as usize..=end_incl as usize];
                let header = format!("Content-Range: bytes {}-{}/{}\r\n", start, end_incl, total);
                respond(&mut stream, "206 Partial Content", &header, slice);
            }
        }
        None => respond(&mut stream, "200 OK", "", body),
    }
}

/// Returns (method, optional (start, end_inclusive) for Range: bytes=X-Y).
fn parse_request(request: &str) -> (&str, Option<(u64, u64)>) {
    let mut method = "";
    let mut range = None;
    for line in request.lines() {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if method.is_empty() {
            method = line.split_whitespace().next().unwrap_or("");
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            if !name.trim().eq_ignore_ascii_case("range") {
                continue;
            }
            let value = value.trim();
            if let Some(part) = value.strip_prefix("bytes=") {
                if let Some((a, b)) = part.split_once('-') {
                    let start = a.trim().parse::<u64>().unwrap_or(0);
                    let end_incl = b.trim().parse::<u64>().unwrap_or(u64::MAX);
                    range = Some((start, end_incl));
                }
            }
        }
    }
    (method, range)
}
