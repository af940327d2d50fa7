//! Live-reload channel.
//!
//! ```text
//! watch runner --WsMsg--> WsActor --HotReloadMessage--> browsers
//!                            ^
//!              WsListener ---+ (accepted TcpStreams)
//! ```
//!
//! - `message` - JSON protocol spoken to the injected client script
//! - `server` - WebSocket listener with port retry
//! - `ws` - Client registry and broadcast

pub mod message;
pub mod server;
mod ws;

pub use server::WsListener;
pub use ws::WsActor;

use std::net::TcpStream;

/// Messages to the WebSocket actor.
#[derive(Debug)]
pub enum WsMsg {
    /// Reload every page
    Reload { reason: String },
    /// Swap one stylesheet in place
    Css { href: String },
    /// A task failed (display overlay, no reload)
    Error { task: String, error: String },
    /// A run succeeded after a failure
    ClearError,
    /// Accepted connection awaiting handshake
    AddClient(TcpStream),
    Shutdown,
}
