//! Development server: static files from the output root, with the
//! live-reload client injected into HTML.
//!
//! Requests are answered with a loading page until the initial build has
//! finished, and wait briefly while a watch-triggered run is writing.

mod inject;
mod lifecycle;
mod path;
mod response;

pub use lifecycle::wait_for_shutdown;

use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Duration;

use anyhow::Result;
use crossbeam::channel;
use tiny_http::{Request, Server};

use crate::config::{ServeConfig, cfg};
use crate::core::{is_busy, is_serving, is_shutdown, register_server};
use crate::embed::serve::HOTRELOAD_URL;
use crate::log;

/// WebSocket port of the live-reload channel, 0 while disabled.
static WS_PORT: AtomicU16 = AtomicU16::new(0);

/// Record the bound WebSocket port; enables script injection.
pub fn set_ws_port(port: u16) {
    WS_PORT.store(port, Ordering::Relaxed);
}

fn ws_port() -> Option<u16> {
    match WS_PORT.load(Ordering::Relaxed) {
        0 => None,
        port => Some(port),
    }
}

/// Bound server ready to accept requests
pub struct BoundServer {
    server: Arc<Server>,
    shutdown_rx: channel::Receiver<()>,
}

/// Bind the HTTP server and register it for Ctrl+C shutdown.
pub fn bind_server(serve: &ServeConfig) -> Result<BoundServer> {
    let (server, addr) = lifecycle::bind_with_retry(serve.interface, serve.port)?;
    let server = Arc::new(server);

    let (shutdown_tx, shutdown_rx) = channel::unbounded::<()>();
    register_server(Arc::clone(&server), shutdown_tx);

    log!("serve"; "http://{}", addr);
    Ok(BoundServer {
        server,
        shutdown_rx,
    })
}

impl BoundServer {
    /// Receiver signalled once on Ctrl+C.
    pub fn shutdown_signal(&self) -> channel::Receiver<()> {
        self.shutdown_rx.clone()
    }

    /// Run the request loop until the server is unblocked.
    pub fn run(self) -> Result<()> {
        let pool = rayon::ThreadPoolBuilder::new().num_threads(4).build()?;

        for request in self.server.incoming_requests() {
            pool.spawn(move || {
                if let Err(e) = handle_request(request) {
                    log!("serve"; "request error: {e}");
                }
            });
        }
        Ok(())
    }
}

/// Handle a single HTTP request
fn handle_request(request: Request) -> Result<()> {
    if is_shutdown() {
        return response::respond_unavailable(request);
    }

    if let Some(port) = ws_port()
        && request.url() == HOTRELOAD_URL
    {
        return response::respond_hotreload_js(request, port);
    }

    if !is_serving() {
        return response::respond_loading(request);
    }
    wait_until_idle();

    let config = cfg();
    let reload = config.serve.reload && ws_port().is_some();
    let dest = config.paths().dest();

    match path::resolve_path(request.url(), dest) {
        Some(path) => response::respond_file(request, &path, reload),
        None => response::respond_not_found(request, dest, reload),
    }
}

/// Give a running rebuild up to a second to finish writing.
fn wait_until_idle() {
    for _ in 0..20 {
        if !is_busy() {
            return;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}
