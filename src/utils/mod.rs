//! Shared utilities.

pub mod date;
pub mod exec;
pub mod mime;
pub mod path;
