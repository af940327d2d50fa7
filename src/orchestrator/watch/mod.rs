//! Watch mode: initial build, development server, rerun on change.
//!
//! ```text
//! FsActor --RunnerMsg--> Runner --WsMsg--> WsActor --> browsers
//!                                            ^
//!                               WsListener --+
//! ```
//!
//! The HTTP request loop runs on the main thread; the actors share a small
//! tokio runtime on a dedicated thread.

mod debouncer;
mod fs;
mod rules;
mod runner;

use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam::channel::Receiver;
use tokio::sync::mpsc;

use crate::config::PipelineConfig;
use crate::reload::{WsActor, WsListener, WsMsg};
use crate::serve::{bind_server, set_ws_port, wait_for_shutdown};
use crate::{debug, log};

use fs::{FsActor, watch_paths};
use runner::Runner;

/// Channel buffer size
const CHANNEL_BUFFER: usize = 32;

/// Messages to the runner.
#[derive(Debug)]
pub enum RunnerMsg {
    /// Debounced batch of changed paths, sorted
    Changed(Vec<PathBuf>),
    Shutdown,
}

/// Run watch mode until Ctrl+C.
pub fn watch(config: Arc<PipelineConfig>) -> Result<()> {
    let server = bind_server(&config.serve)?;

    let listener = if config.serve.reload {
        match WsListener::bind(config.serve.ws_port) {
            Ok(listener) => {
                set_ws_port(listener.port());
                Some(listener)
            }
            Err(e) => {
                log!("reload"; "disabled: {:#}", e);
                None
            }
        }
    } else {
        None
    };

    let actors = spawn_actors(config, listener, server.shutdown_signal())?;
    server.run()?;
    wait_for_shutdown(Some(actors));
    Ok(())
}

fn spawn_actors(
    config: Arc<PipelineConfig>,
    listener: Option<WsListener>,
    shutdown_rx: Receiver<()>,
) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("sluice-actors".into())
        .spawn(move || {
            let rt = match tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    log!("actor"; "failed to create runtime: {}", e);
                    return;
                }
            };

            rt.block_on(async {
                if let Err(e) = run_actors(&config, listener, shutdown_rx).await {
                    log!("actor"; "error: {:#}", e);
                }
            });
        })
        .context("failed to spawn actor thread")
}

/// Wire up channels, run every actor until the shutdown signal.
async fn run_actors(
    config: &PipelineConfig,
    listener: Option<WsListener>,
    shutdown_rx: Receiver<()>,
) -> Result<()> {
    let (runner_tx, runner_rx) = mpsc::channel::<RunnerMsg>(CHANNEL_BUFFER);

    // Watcher first: changes made during the initial build are buffered
    let fs_actor = FsActor::new(watch_paths(config), runner_tx.clone())
        .map_err(|e| anyhow::anyhow!("watcher failed: {}", e))?;

    let (ws_tx, ws_handle) = match listener {
        Some(listener) => {
            let (ws_tx, ws_rx) = mpsc::channel::<WsMsg>(CHANNEL_BUFFER);
            listener.start(ws_tx.clone())?;
            let ws = WsActor::new(ws_rx);
            (Some(ws_tx), Some(tokio::spawn(ws.run())))
        }
        None => (None, None),
    };

    let runner = Runner::new(runner_rx, ws_tx.clone());
    let runner_handle = tokio::spawn(runner.run());
    let fs_handle = tokio::spawn(fs_actor.run());

    debug!("actor"; "start");
    loop {
        if shutdown_rx.try_recv().is_ok() {
            debug!("actor"; "shutdown signal received");
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    let _ = runner_tx.send(RunnerMsg::Shutdown).await;
    if let Some(tx) = &ws_tx {
        let _ = tx.send(WsMsg::Shutdown).await;
    }

    let _ = tokio::time::timeout(Duration::from_millis(500), runner_handle).await;
    if let Some(handle) = ws_handle {
        let _ = tokio::time::timeout(Duration::from_millis(500), handle).await;
    }
    fs_handle.abort();

    debug!("actor"; "stopped");
    Ok(())
}
