//! File system actor.
//!
//! Starts watching before the initial build so no change is lost, then
//! hands debounced batches of changed paths to the runner.
//!
//! ```text
//! notify → Debouncer (timing, dedup) → RunnerMsg::Changed
//! ```

use std::path::{Path, PathBuf};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use rustc_hash::FxHashSet;
use tokio::sync::mpsc;

use super::RunnerMsg;
use super::debouncer::Debouncer;
use crate::config::{PipelineConfig, cfg};

/// File system actor
pub struct FsActor {
    /// Sync channel fed by notify
    notify_rx: std::sync::mpsc::Receiver<notify::Result<notify::Event>>,
    /// Watcher handle (must be kept alive)
    watcher: RecommendedWatcher,
    watch_roots: WatchRoots,
    runner_tx: mpsc::Sender<RunnerMsg>,
    debouncer: Debouncer,
}

impl FsActor {
    /// Create the watcher immediately. Events buffer in the channel while
    /// the caller performs the initial build.
    pub fn new(paths: Vec<PathBuf>, runner_tx: mpsc::Sender<RunnerMsg>) -> notify::Result<Self> {
        let (notify_tx, notify_rx) = std::sync::mpsc::channel();

        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = notify_tx.send(res);
        })?;

        // Missing roots are attached later, once they appear
        let mut watch_roots = WatchRoots::new(paths);
        watch_roots.attach_existing(&mut watcher)?;

        Ok(Self {
            notify_rx,
            watcher,
            watch_roots,
            runner_tx,
            debouncer: Debouncer::new(),
        })
    }

    /// Run the event loop until the runner goes away.
    pub async fn run(self) {
        let notify_rx = self.notify_rx;
        let runner_tx = self.runner_tx;
        let mut debouncer = self.debouncer;
        let mut watcher = self.watcher;
        let mut watch_roots = self.watch_roots;

        let (async_tx, mut async_rx) = mpsc::channel::<notify::Event>(64);

        // notify is sync; bridge it into the runtime
        std::thread::spawn(move || {
            while let Ok(result) = notify_rx.recv() {
                match result {
                    Ok(event) => {
                        if async_tx.blocking_send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) => crate::log!("watch"; "notify error: {}", e),
                }
            }
        });

        loop {
            tokio::select! {
                biased;
                Some(event) = async_rx.recv() => debouncer.add_event(&event),
                _ = tokio::time::sleep(debouncer.sleep_duration()) => {
                    // A config reload may have moved the watched directories
                    watch_roots.retarget(watch_paths(&cfg()), &mut watcher);
                    watch_roots.maintain(&mut watcher);
                    if process_changes(&mut debouncer, &runner_tx).await.is_err() {
                        break;
                    }
                }
            }
        }
        crate::debug!("watch"; "stopped");
    }
}

/// Forward ready changes to the runner.
///
/// Returns `Err(())` once the runner has shut down.
async fn process_changes(
    debouncer: &mut Debouncer,
    runner_tx: &mpsc::Sender<RunnerMsg>,
) -> Result<(), ()> {
    // Checked before taking, so changes made during the initial build survive
    if !crate::core::is_serving() {
        return Ok(());
    }

    let Some(changes) = debouncer.take_if_ready() else {
        return Ok(());
    };

    let config = cfg();
    let mut paths: Vec<PathBuf> = changes
        .into_iter()
        .filter(|(path, _)| !is_output(path, &config))
        .map(|(path, kind)| {
            crate::debug!("watch"; "{}: {}", kind.label(), path.display());
            path
        })
        .collect();

    if paths.is_empty() {
        return Ok(());
    }
    paths.sort();

    runner_tx
        .send(RunnerMsg::Changed(paths))
        .await
        .map_err(|_| ())
}

/// Writes under the output root must never retrigger a run.
fn is_output(path: &Path, config: &PipelineConfig) -> bool {
    let paths = config.paths();
    paths.dest() != paths.root() && path.starts_with(paths.dest())
}

/// Roots handed to the watcher: every class's watch directories plus the
/// config file itself.
pub fn watch_paths(config: &PipelineConfig) -> Vec<PathBuf> {
    let mut paths = config.paths().watch_dirs();
    if config.config_path.exists() && !paths.iter().any(|p| config.config_path.starts_with(p)) {
        paths.push(config.config_path.clone());
    }
    paths
}

/// Watch-root consistency manager.
///
/// Attaches existing roots at startup and re-attaches roots that were
/// removed and recreated.
struct WatchRoots {
    desired: Vec<PathBuf>,
    attached: FxHashSet<PathBuf>,
}

impl WatchRoots {
    fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            desired: paths,
            attached: FxHashSet::default(),
        }
    }

    fn attach_existing(&mut self, watcher: &mut RecommendedWatcher) -> notify::Result<()> {
        for path in &self.desired {
            if !path.exists() {
                continue;
            }
            watcher.watch(path, RecursiveMode::Recursive)?;
            self.attached.insert(path.clone());
        }
        Ok(())
    }

    /// Swap the desired roots, detaching the ones no longer wanted.
    fn retarget(&mut self, paths: Vec<PathBuf>, watcher: &mut RecommendedWatcher) {
        if paths == self.desired {
            return;
        }
        let stale: Vec<PathBuf> = self
            .attached
            .iter()
            .filter(|p| !paths.contains(p))
            .cloned()
            .collect();
        for path in stale {
            let _ = watcher.unwatch(&path);
            self.attached.remove(&path);
            crate::debug!("watch"; "detached: {}", path.display());
        }
        self.desired = paths;
    }

    fn maintain(&mut self, watcher: &mut RecommendedWatcher) {
        // Drop stale handles for roots that no longer exist
        self.attached.retain(|path| path.exists());

        for path in &self.desired {
            if self.attached.contains(path) || !path.exists() {
                continue;
            }
            if watcher.watch(path, RecursiveMode::Recursive).is_ok() {
                self.attached.insert(path.clone());
                crate::debug!("watch"; "attached: {}", path.display());
            }
        }
    }
}
