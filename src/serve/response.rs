//! HTTP response handlers.

use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use anyhow::{Context, Result};
use tiny_http::{Header, Method, Request, Response, StatusCode};

use super::inject::maybe_inject_hotreload;
use crate::embed::serve::{HOTRELOAD_JS, HotreloadVars, LOADING_HTML};
use crate::utils::mime::{self, types};

/// Respond with a static file, optionally injecting the live-reload script.
pub fn respond_file(request: Request, path: &Path, reload: bool) -> Result<()> {
    let content_type = mime::from_path(path);

    if is_head_request(&request) {
        return send_head(request, 200, content_type);
    }

    // Range requests (video/audio seeking)
    if let Some(range) = get_range_header(&request) {
        return respond_range(request, path, content_type, &range);
    }

    let body = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let body = maybe_inject_hotreload(body, content_type, reload);
    send_body(request, 200, content_type, body)
}

fn respond_range(
    request: Request,
    path: &Path,
    content_type: &'static str,
    range: &str,
) -> Result<()> {
    let file_size = fs::metadata(path)?.len();
    if file_size == 0 {
        return send_body(request, 200, content_type, Vec::new());
    }

    let range = range.strip_prefix("bytes=").unwrap_or(range);
    let (start, end) = parse_range(range, file_size);
    if start > end {
        let response = Response::empty(StatusCode(416))
            .with_header(make_header("Content-Range", &format!("bytes */{file_size}"))?);
        request.respond(response)?;
        return Ok(());
    }
    let length = end - start + 1;

    let mut file = fs::File::open(path)?;
    file.seek(SeekFrom::Start(start))?;
    let response = Response::new(
        StatusCode(206),
        vec![
            make_header("Content-Type", content_type)?,
            make_header("Content-Range", &format!("bytes {start}-{end}/{file_size}"))?,
            make_header("Accept-Ranges", "bytes")?,
        ],
        file.take(length),
        usize::try_from(length).ok(),
        None,
    );
    request.respond(response)?;
    Ok(())
}

/// Parse a `start-end` range against a non-empty file.
fn parse_range(range: &str, file_size: u64) -> (u64, u64) {
    let last = file_size - 1;
    match range.trim().split_once('-') {
        Some((s, "")) => (s.trim().parse().unwrap_or(0), last),
        Some(("", e)) => {
            let suffix: u64 = e.trim().parse().unwrap_or(0);
            (file_size.saturating_sub(suffix), last)
        }
        Some((s, e)) => {
            let start = s.trim().parse().unwrap_or(0);
            let end: u64 = e.trim().parse().unwrap_or(last);
            (start, end.min(last))
        }
        None => (0, last),
    }
}

fn get_range_header(request: &Request) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|h| h.field.equiv("Range"))
        .map(|h| h.value.to_string())
}

/// Respond with 404 page (custom `404.html` from the output root or plain text).
pub fn respond_not_found(request: Request, dest: &Path, reload: bool) -> Result<()> {
    let custom_404 = dest.join("404.html");

    if is_head_request(&request) {
        let mime = if custom_404.is_file() { types::HTML } else { types::PLAIN };
        return send_head(request, 404, mime);
    }

    if let Ok(body) = fs::read(&custom_404) {
        let body = maybe_inject_hotreload(body, types::HTML, reload);
        return send_body(request, 404, types::HTML, body);
    }

    send_body(request, 404, types::PLAIN, b"404 Not Found".to_vec())
}

/// Respond with loading page (initial build not finished).
pub fn respond_loading(request: Request) -> Result<()> {
    send_body(request, 200, types::HTML, LOADING_HTML.as_bytes().to_vec())
}

/// Respond with 503 Service Unavailable (server shutting down).
pub fn respond_unavailable(request: Request) -> Result<()> {
    send_body(request, 503, types::PLAIN, b"503 Service Unavailable".to_vec())
}

/// Respond with hotreload.js from memory.
pub fn respond_hotreload_js(request: Request, ws_port: u16) -> Result<()> {
    let body = HOTRELOAD_JS.render(&HotreloadVars { ws_port });
    send_body(request, 200, types::JAVASCRIPT, body.into_bytes())
}

fn is_head_request(request: &Request) -> bool {
    request.method() == &Method::Head
}

fn send_head(request: Request, status: u16, content_type: &str) -> Result<()> {
    let response =
        Response::empty(StatusCode(status)).with_header(make_header("Content-Type", content_type)?);
    request.respond(response)?;
    Ok(())
}

fn send_body(request: Request, status: u16, content_type: &str, body: Vec<u8>) -> Result<()> {
    let response = Response::from_data(body)
        .with_status_code(StatusCode(status))
        .with_header(make_header("Content-Type", content_type)?)
        .with_header(make_header("Cache-Control", "no-store")?);
    request.respond(response)?;
    Ok(())
}

fn make_header(key: &str, value: &str) -> Result<Header> {
    Header::from_bytes(key.as_bytes(), value.as_bytes())
        .map_err(|()| anyhow::anyhow!("invalid header `{key}: {value}`"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range() {
        assert_eq!(parse_range("0-499", 1000), (0, 499));
        assert_eq!(parse_range("500-", 1000), (500, 999));
        assert_eq!(parse_range("-100", 1000), (900, 999));
        assert_eq!(parse_range("900-5000", 1000), (900, 999));
        assert_eq!(parse_range("garbage", 1000), (0, 999));
    }

    #[test]
    fn test_unsatisfiable_range_detected() {
        let (start, end) = parse_range("2000-", 1000);
        assert!(start > end);
    }
}
