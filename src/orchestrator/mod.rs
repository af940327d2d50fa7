//! Orchestrator: composes tasks into steps and drives them.
//!
//! - `graph` - `Step` tree, the build graph and its executor
//! - `build` - One-shot entry points (`build`, `task`)
//! - `watch` - Watch mode: watcher, rules table, rebuild runner

mod build;
mod graph;
pub mod watch;

pub use build::{build, run_tasks};
pub use graph::{RunResult, Step, build_graph, execute};
