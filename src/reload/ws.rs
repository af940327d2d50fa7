//! WebSocket actor: client registry and broadcast.

use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tungstenite::WebSocket;
use tungstenite::protocol::Message;

use super::WsMsg;
use super::message::HotReloadMessage;

type Clients = Arc<Mutex<Vec<WebSocket<TcpStream>>>>;

/// Last error pushed to browsers, replayed to clients that connect later.
#[derive(Debug, Clone)]
struct PendingError {
    task: String,
    error: String,
}

/// WebSocket Actor - manages client connections and broadcasts
pub struct WsActor {
    rx: mpsc::Receiver<WsMsg>,
    clients: Clients,
    pending_error: Mutex<Option<PendingError>>,
}

impl WsActor {
    pub fn new(rx: mpsc::Receiver<WsMsg>) -> Self {
        Self {
            rx,
            clients: Arc::new(Mutex::new(Vec::new())),
            pending_error: Mutex::new(None),
        }
    }

    /// Run the actor event loop
    pub async fn run(mut self) {
        let clients_for_reader = Arc::clone(&self.clients);
        std::thread::spawn(move || client_reader_loop(clients_for_reader));

        while let Some(msg) = self.rx.recv().await {
            match msg {
                WsMsg::Reload { reason } => {
                    crate::debug!("ws"; "sending reload: {}", reason);
                    self.broadcast(&HotReloadMessage::reload_with_reason(reason));
                }
                WsMsg::Css { href } => {
                    crate::debug!("ws"; "sending css: {}", href);
                    self.broadcast(&HotReloadMessage::css(href));
                }
                WsMsg::Error { task, error } => {
                    let msg = HotReloadMessage::error(&task, &error);
                    *self.pending_error.lock() = Some(PendingError { task, error });
                    self.broadcast(&msg);
                }
                WsMsg::ClearError => {
                    *self.pending_error.lock() = None;
                    self.broadcast(&HotReloadMessage::clear_error());
                }
                WsMsg::AddClient(stream) => self.add_client(stream),
                WsMsg::Shutdown => {
                    crate::debug!("ws"; "shutting down");
                    for mut ws in self.clients.lock().drain(..) {
                        let _ = ws.close(None);
                    }
                    break;
                }
            }
        }
    }

    /// Handshake a new connection, greet it and replay any pending error.
    fn add_client(&self, stream: TcpStream) {
        // Keep blocking mode during handshake, switch to non-blocking after
        let mut ws = match tungstenite::accept(stream) {
            Ok(ws) => ws,
            Err(e) => {
                crate::log!("ws"; "handshake failed: {}", e);
                return;
            }
        };

        if let Err(e) = ws.send(text(&HotReloadMessage::connected())) {
            crate::log!("ws"; "failed to send connected message: {}", e);
            return;
        }

        if let Some(pending) = self.pending_error.lock().clone() {
            let msg = HotReloadMessage::error(pending.task, pending.error);
            if let Err(e) = ws.send(text(&msg)) {
                crate::debug!("ws"; "failed to send pending error: {}", e);
            }
        }

        let _ = ws.get_ref().set_nonblocking(true);
        let mut clients = self.clients.lock();
        clients.push(ws);
        crate::debug!("ws"; "client connected (total: {})", clients.len());
    }

    /// Send a message to every client, dropping those that fail.
    fn broadcast(&self, msg: &HotReloadMessage) {
        let mut clients = self.clients.lock();
        if clients.is_empty() {
            crate::debug!("ws"; "no clients connected");
            return;
        }

        let message = text(msg);
        clients.retain_mut(|ws| match ws.send(message.clone()) {
            Ok(()) => true,
            Err(e) => {
                crate::debug!("ws"; "client disconnected: {}", e);
                false
            }
        });
        crate::debug!("ws"; "broadcast to {} clients", clients.len());
    }
}

fn text(msg: &HotReloadMessage) -> Message {
    Message::Text(msg.to_json().into())
}

/// Background thread answering pings and dropping closed clients.
fn client_reader_loop(clients: Clients) {
    loop {
        std::thread::sleep(Duration::from_millis(100));
        if crate::core::is_shutdown() {
            break;
        }

        clients.lock().retain_mut(|ws| match ws.read() {
            Ok(Message::Close(_)) => false,
            Ok(_) => true,
            Err(tungstenite::Error::Io(ref e)) if e.kind() == std::io::ErrorKind::WouldBlock => {
                // Flush any queued pong frames
                !matches!(ws.flush(), Err(ref e) if !is_would_block(e))
            }
            Err(_) => false,
        });
    }
}

fn is_would_block(err: &tungstenite::Error) -> bool {
    matches!(err, tungstenite::Error::Io(e) if e.kind() == std::io::ErrorKind::WouldBlock)
}
