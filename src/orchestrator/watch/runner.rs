//! Runner actor: executes the steps a batch of changes calls for and
//! tells browsers what happened.
//!
//! Runs are serialized: the next batch is only planned once the current
//! run has finished.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;

use super::RunnerMsg;
use super::rules::plan;
use crate::config::{PipelineConfig, cfg, reload_config};
use crate::core::{begin_update, end_update, set_serving};
use crate::logger::{status_detach, status_error, status_success, status_unchanged};
use crate::orchestrator::build::{describe, log_failures, run_with_progress};
use crate::orchestrator::{RunResult, Step, build_graph, execute};
use crate::reload::WsMsg;
use crate::task::{Tasks, only_stylesheets};
use crate::utils::path::relative_slash;
use crate::{debug, log};

pub struct Runner {
    rx: mpsc::Receiver<RunnerMsg>,
    /// `None` when live reload is disabled
    ws_tx: Option<mpsc::Sender<WsMsg>>,
    /// Script cache lives here across runs
    tasks: Arc<Tasks>,
    /// Last run failed; the next success clears the browser overlay
    failing: bool,
}

impl Runner {
    pub fn new(rx: mpsc::Receiver<RunnerMsg>, ws_tx: Option<mpsc::Sender<WsMsg>>) -> Self {
        Self {
            rx,
            ws_tx,
            tasks: Arc::new(Tasks::new()),
            failing: false,
        }
    }

    /// Initial build, then one run per change batch until shutdown.
    pub async fn run(mut self) {
        self.initial_build().await;
        set_serving();

        while let Some(msg) = self.rx.recv().await {
            match msg {
                RunnerMsg::Changed(paths) => self.on_changed(paths).await,
                RunnerMsg::Shutdown => break,
            }
        }
        debug!("runner"; "stopped");
    }

    /// Full pipeline before serving. Failure is reported, never fatal.
    async fn initial_build(&mut self) {
        let start = Instant::now();
        let tasks = Arc::clone(&self.tasks);
        let outcome = tokio::task::spawn_blocking(move || {
            let config = cfg();
            let result = run_with_progress(&build_graph(), &tasks, &config);
            (result, config)
        })
        .await;

        let Ok((result, config)) = outcome else {
            log!("error"; "initial build panicked");
            return;
        };

        if result.is_ok() {
            log!(
                "build";
                "{} file(s) written in {}ms",
                result.written().count(),
                start.elapsed().as_millis()
            );
            return;
        }

        log_failures(&result, &config);
        if let Some(msg) = failure_message(&result, &config) {
            self.failing = true;
            self.send(msg).await;
        }
    }

    async fn on_changed(&mut self, paths: Vec<PathBuf>) {
        let plan = plan(&paths, &cfg());

        if plan.reload_config {
            match reload_config() {
                Ok(true) => {
                    // Keep the last status block above the log line
                    status_detach();
                    log!("config"; "reloaded");
                }
                Ok(false) => debug!("config"; "unchanged"),
                Err(e) => {
                    let detail = format!("{e:#}");
                    status_error("config reload failed", &detail);
                    self.failing = true;
                    self.send(WsMsg::Error {
                        task: "config".to_string(),
                        error: detail,
                    })
                    .await;
                    return;
                }
            }
        }

        let Some(step) = plan.step else {
            debug!("runner"; "no rule for {} change(s)", paths.len());
            return;
        };

        let start = Instant::now();
        begin_update();
        let result = self.execute(step).await;
        end_update();

        let Some((result, config)) = result else {
            log!("error"; "run panicked");
            return;
        };
        self.report(&result, &config, start.elapsed().as_millis()).await;
    }

    /// Execute on a blocking thread against the current config.
    async fn execute(&self, step: Step) -> Option<(RunResult, Arc<PipelineConfig>)> {
        let tasks = Arc::clone(&self.tasks);
        tokio::task::spawn_blocking(move || {
            let config = cfg();
            let result = execute(&step, |kind| tasks.run(kind, &config));
            (result, config)
        })
        .await
        .ok()
    }

    async fn report(&mut self, result: &RunResult, config: &PipelineConfig, ms: u128) {
        if let Some(msg) = failure_message(result, config) {
            let detail: Vec<_> = result
                .failures
                .iter()
                .map(|(kind, err)| describe(*kind, err, config))
                .collect();
            status_error(
                &format!("{} task(s) failed", result.failures.len()),
                &detail.join("\n"),
            );
            self.failing = true;
            self.send(msg).await;
            return;
        }

        if std::mem::take(&mut self.failing) {
            self.send(WsMsg::ClearError).await;
        }

        let written: Vec<PathBuf> = result.written().cloned().collect();
        if written.is_empty() {
            status_unchanged("up to date");
            return;
        }

        for msg in change_messages(&written, config) {
            self.send(msg).await;
        }
        status_success(&format!("{} file(s) in {}ms", written.len(), ms));
    }

    async fn send(&self, msg: WsMsg) {
        if let Some(tx) = &self.ws_tx {
            let _ = tx.send(msg).await;
        }
    }
}

/// Browser overlay for the first failed task.
fn failure_message(result: &RunResult, config: &PipelineConfig) -> Option<WsMsg> {
    let (kind, err) = result.failures.first()?;
    Some(WsMsg::Error {
        task: kind.name().to_string(),
        error: describe(*kind, err, config),
    })
}

/// Stylesheet-only output is swapped in place, anything else reloads.
fn change_messages(written: &[PathBuf], config: &PipelineConfig) -> Vec<WsMsg> {
    let dest = config.paths().dest();
    if only_stylesheets(written) {
        let hrefs: Option<Vec<String>> = written
            .iter()
            .map(|p| relative_slash(p, dest).map(|rel| format!("/{rel}")))
            .collect();
        if let Some(hrefs) = hrefs {
            return hrefs.into_iter().map(|href| WsMsg::Css { href }).collect();
        }
    }

    let reason = match written {
        [one] => relative_slash(one, dest).unwrap_or_else(|| one.display().to_string()),
        _ => format!("{} files changed", written.len()),
    };
    vec![WsMsg::Reload { reason }]
}
