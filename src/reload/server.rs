//! WebSocket listener for live reload.
//!
//! The listener is bound up front so the port is known before the first
//! page is served. Accepted connections are handed to the [`WsActor`]
//! through its channel; the handshake happens there.
//!
//! [`WsActor`]: super::WsActor

use std::net::TcpListener;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;

use super::WsMsg;

/// Maximum port retry attempts
const MAX_PORT_RETRIES: u16 = 10;

/// A bound, not yet accepting, WebSocket listener.
pub struct WsListener {
    listener: TcpListener,
    port: u16,
}

impl WsListener {
    /// Bind on localhost, trying `base_port` and the next ports in turn.
    pub fn bind(base_port: u16) -> Result<Self> {
        let (listener, port) = try_bind_port(base_port, MAX_PORT_RETRIES)?;
        if port != base_port {
            crate::debug!("reload"; "port {} in use, using {} instead", base_port, port);
        }
        Ok(Self { listener, port })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Spawn the acceptor thread, sending each client to `ws_tx`.
    pub fn start(self, ws_tx: mpsc::Sender<WsMsg>) -> Result<()> {
        let listener = self.listener;
        listener.set_nonblocking(true)?;

        std::thread::spawn(move || {
            loop {
                if crate::core::is_shutdown() {
                    break;
                }
                match listener.accept() {
                    Ok((stream, addr)) => {
                        crate::debug!("reload"; "client connected: {}", addr);

                        // Set blocking for WebSocket operations
                        let _ = stream.set_nonblocking(false);

                        if ws_tx.blocking_send(WsMsg::AddClient(stream)).is_err() {
                            crate::debug!("reload"; "actor gone, stop accepting");
                            break;
                        }
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        std::thread::sleep(Duration::from_millis(100));
                    }
                    Err(e) => {
                        crate::log!("reload"; "accept error: {}", e);
                        std::thread::sleep(Duration::from_millis(100));
                    }
                }
            }
        });

        Ok(())
    }
}

/// Try binding to port, retry with incremented port if in use
fn try_bind_port(base_port: u16, max_retries: u16) -> Result<(TcpListener, u16)> {
    let mut last_error = None;

    for offset in 0..max_retries {
        let port = base_port.saturating_add(offset);
        match TcpListener::bind(("127.0.0.1", port)) {
            Ok(listener) => {
                let actual_port = listener.local_addr()?.port();
                return Ok((listener, actual_port));
            }
            Err(e) => last_error = Some(e),
        }
    }

    Err(anyhow::anyhow!(
        "Failed to bind WebSocket server after {} attempts: {}",
        max_retries,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_skips_taken_port() {
        let taken = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = taken.local_addr().unwrap().port();

        let (_listener, port) = try_bind_port(base, MAX_PORT_RETRIES).unwrap();
        assert_ne!(port, base);
        assert!(port > base && port < base + MAX_PORT_RETRIES);
    }

    #[test]
    fn test_bind_gives_up() {
        let taken = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = taken.local_addr().unwrap().port();
        assert!(try_bind_port(base, 1).is_err());
    }
}
