//! Core process state shared across the codebase.

mod state;

pub use state::{
    begin_update, end_update, is_busy, is_serving, is_shutdown, register_server, set_serving,
    setup_shutdown_handler,
};
