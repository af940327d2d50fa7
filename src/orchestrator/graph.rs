//! Orchestration graph: tasks composed in series and in parallel.
//!
//! ```text
//! series(clean, clean-font-styles,
//!        parallel(views, scripts, webp, images, assets,
//!                 series(fonts, styles)))
//! ```
//!
//! A series stops at its first failing child. A parallel step lets every
//! started child finish and fails if any of them failed. Hard failures
//! (filesystem errors outside per-file processing) raise a shared abort
//! flag: tasks that have not started yet are skipped.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use rayon::prelude::*;
use rustc_hash::FxHashSet;

use crate::core::is_shutdown;
use crate::task::{TaskError, TaskKind, TaskReport};

/// A node of the orchestration graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Task(TaskKind),
    Series(Vec<Step>),
    Parallel(Vec<Step>),
}

impl Step {
    pub fn series(steps: impl IntoIterator<Item = Step>) -> Self {
        Self::Series(steps.into_iter().collect())
    }

    pub fn parallel(steps: impl IntoIterator<Item = Step>) -> Self {
        Self::Parallel(steps.into_iter().collect())
    }

    /// Tasks in declaration order.
    pub fn tasks(&self) -> Vec<TaskKind> {
        let mut out = Vec::new();
        self.collect_tasks(&mut out);
        out
    }

    fn collect_tasks(&self, out: &mut Vec<TaskKind>) {
        match self {
            Self::Task(kind) => out.push(*kind),
            Self::Series(steps) | Self::Parallel(steps) => {
                steps.iter().for_each(|s| s.collect_tasks(out));
            }
        }
    }

    /// Drop tasks in `covered`, collapsing groups left with one child.
    fn prune(self, covered: &FxHashSet<TaskKind>) -> Option<Self> {
        let rebuild = |steps: Vec<Self>, wrap: fn(Vec<Self>) -> Self| {
            let mut kept: Vec<_> = steps.into_iter().filter_map(|s| s.prune(covered)).collect();
            match kept.len() {
                0 => None,
                1 => kept.pop(),
                _ => Some(wrap(kept)),
            }
        };
        match self {
            Self::Task(kind) => (!covered.contains(&kind)).then_some(self),
            Self::Series(steps) => rebuild(steps, Self::Series),
            Self::Parallel(steps) => rebuild(steps, Self::Parallel),
        }
    }

    /// Union of several steps, in order, each task at most once.
    ///
    /// A task already scheduled by an earlier step is removed from the
    /// later ones; what remains runs in parallel.
    pub fn union(steps: impl IntoIterator<Item = Step>) -> Option<Self> {
        let mut covered = FxHashSet::default();
        let mut kept = Vec::new();
        for step in steps {
            if let Some(step) = step.prune(&covered) {
                covered.extend(step.tasks());
                kept.push(step);
            }
        }
        match kept.len() {
            0 => None,
            1 => kept.pop(),
            _ => Some(Self::Parallel(kept)),
        }
    }
}

/// The full pipeline.
pub fn build_graph() -> Step {
    use TaskKind::*;
    Step::series([
        Step::Task(Clean),
        Step::Task(CleanFontStyles),
        Step::parallel([
            Step::Task(Views),
            Step::Task(Scripts),
            Step::Task(Webp),
            Step::Task(Images),
            Step::Task(Assets),
            Step::series([Step::Task(Fonts), Step::Task(Styles)]),
        ]),
    ])
}

/// Everything one graph execution produced.
#[derive(Debug, Default)]
pub struct RunResult {
    /// Reports of tasks that succeeded, in completion order.
    pub reports: Vec<TaskReport>,
    /// Tasks that failed, in completion order.
    pub failures: Vec<(TaskKind, TaskError)>,
    /// Tasks never started because an earlier step failed or abort was raised.
    pub skipped: Vec<TaskKind>,
}

impl RunResult {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    /// Every written file, including those of partially failed tasks.
    pub fn written(&self) -> impl Iterator<Item = &std::path::PathBuf> {
        self.reports
            .iter()
            .chain(self.failures.iter().filter_map(|(_, e)| e.report()))
            .flat_map(|r| r.written.iter())
    }

    pub fn skipped_files(&self) -> usize {
        self.reports.iter().map(|r| r.skipped).sum()
    }
}

/// Execute `step`, calling `run` for every task.
pub fn execute<F>(step: &Step, run: F) -> RunResult
where
    F: Fn(TaskKind) -> Result<TaskReport, TaskError> + Sync,
{
    let exec = Execution {
        run,
        abort: AtomicBool::new(false),
        result: Mutex::new(RunResult::default()),
    };
    exec.step(step);
    exec.result.into_inner()
}

struct Execution<F> {
    run: F,
    abort: AtomicBool,
    result: Mutex<RunResult>,
}

impl<F> Execution<F>
where
    F: Fn(TaskKind) -> Result<TaskReport, TaskError> + Sync,
{
    /// Returns whether the step succeeded.
    fn step(&self, step: &Step) -> bool {
        match step {
            Step::Task(kind) => self.task(*kind),
            Step::Series(steps) => {
                for (i, child) in steps.iter().enumerate() {
                    if !self.step(child) {
                        steps[i + 1..].iter().for_each(|rest| self.skip(rest));
                        return false;
                    }
                }
                true
            }
            Step::Parallel(steps) => {
                let outcomes: Vec<bool> = steps.par_iter().map(|child| self.step(child)).collect();
                outcomes.into_iter().all(|ok| ok)
            }
        }
    }

    fn task(&self, kind: TaskKind) -> bool {
        if self.abort.load(Ordering::Acquire) || is_shutdown() {
            self.result.lock().skipped.push(kind);
            return false;
        }

        match (self.run)(kind) {
            Ok(report) => {
                self.result.lock().reports.push(report);
                true
            }
            Err(err) => {
                if err.is_hard() {
                    self.abort.store(true, Ordering::Release);
                }
                self.result.lock().failures.push((kind, err));
                false
            }
        }
    }

    fn skip(&self, step: &Step) {
        self.result.lock().skipped.extend(step.tasks());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::path::PathBuf;
    use TaskKind::*;

    fn ok(kind: TaskKind) -> Result<TaskReport, TaskError> {
        Ok(TaskReport::new(kind))
    }

    fn file_failure(kind: TaskKind) -> Result<TaskReport, TaskError> {
        let mut report = TaskReport::new(kind);
        report.fail(
            &PathBuf::from("broken"),
            &io::Error::other("cannot transcode"),
        );
        report.into_result()
    }

    fn ran(result: &RunResult) -> Vec<TaskKind> {
        let mut kinds: Vec<_> = result
            .reports
            .iter()
            .map(|r| r.task)
            .chain(result.failures.iter().map(|(k, _)| *k))
            .collect();
        kinds.sort_by_key(|k| k.name());
        kinds
    }

    #[test]
    fn test_build_graph_shape() {
        let graph = build_graph();
        assert_eq!(
            graph.tasks(),
            vec![Clean, CleanFontStyles, Views, Scripts, Webp, Images, Assets, Fonts, Styles]
        );
        let Step::Series(steps) = &graph else {
            panic!("build graph must be a series");
        };
        assert_eq!(steps[0], Step::Task(Clean));
        assert_eq!(steps[1], Step::Task(CleanFontStyles));
    }

    #[test]
    fn test_series_runs_in_order() {
        let order = Mutex::new(Vec::new());
        let result = execute(&Step::series([Step::Task(Fonts), Step::Task(Styles)]), |k| {
            order.lock().push(k);
            ok(k)
        });
        assert!(result.is_ok());
        assert_eq!(order.into_inner(), vec![Fonts, Styles]);
    }

    #[test]
    fn test_series_stops_after_failure() {
        let step = Step::series([Step::Task(Fonts), Step::Task(Styles), Step::Task(Views)]);
        let result = execute(&step, |k| if k == Fonts { file_failure(k) } else { ok(k) });

        assert!(!result.is_ok());
        assert_eq!(ran(&result), vec![Fonts]);
        assert_eq!(result.skipped, vec![Styles, Views]);
    }

    #[test]
    fn test_parallel_completes_siblings_and_fails() {
        let step = Step::parallel([Step::Task(Views), Step::Task(Scripts), Step::Task(Images)]);
        let result = execute(&step, |k| if k == Scripts { file_failure(k) } else { ok(k) });

        assert!(!result.is_ok());
        assert_eq!(ran(&result), vec![Images, Scripts, Views]);
        assert!(result.skipped.is_empty());
        assert_eq!(result.failures[0].0, Scripts);
    }

    #[test]
    fn test_failed_parallel_stops_enclosing_series() {
        let step = Step::series([
            Step::parallel([Step::Task(Views), Step::Task(Scripts)]),
            Step::Task(Styles),
        ]);
        let result = execute(&step, |k| if k == Views { file_failure(k) } else { ok(k) });
        assert_eq!(result.skipped, vec![Styles]);
    }

    #[test]
    fn test_hard_failure_aborts_pending_tasks() {
        // Single-threaded order: the io failure comes first
        let step = Step::series([Step::Task(Clean), Step::Task(Views)]);
        let result = execute(&step, |k| {
            if k == Clean {
                Err(TaskError::Io {
                    task: k,
                    path: PathBuf::from("dist"),
                    source: io::Error::other("read-only"),
                })
            } else {
                ok(k)
            }
        });
        assert!(result.failures[0].1.is_hard());
        assert_eq!(result.skipped, vec![Views]);
    }

    #[test]
    fn test_written_includes_partial_reports() {
        let step = Step::parallel([Step::Task(Views), Step::Task(Images)]);
        let result = execute(&step, |k| {
            let mut report = TaskReport::new(k);
            report.written.push(PathBuf::from(format!("dist/{k}")));
            if k == Images {
                report.fail(&PathBuf::from("x.png"), &io::Error::other("bad"));
            }
            report.into_result()
        });
        assert_eq!(result.written().count(), 2);
    }

    #[test]
    fn test_union_deduplicates() {
        let views = Step::parallel([Step::Task(Views), Step::Task(Styles)]);
        let styles = Step::Task(Styles);

        assert_eq!(Step::union([views.clone(), styles.clone()]), Some(views.clone()));
        assert_eq!(Step::union([styles.clone()]), Some(styles.clone()));
        assert_eq!(
            Step::union([styles, Step::parallel([Step::Task(Scripts), Step::Task(Styles)])]),
            Some(Step::parallel([Step::Task(Styles), Step::Task(Scripts)]))
        );
        assert_eq!(Step::union([]), None);
    }

    #[test]
    fn test_union_keeps_series_order() {
        let fonts = Step::series([Step::Task(CleanFontStyles), Step::Task(Fonts)]);
        let images = Step::parallel([Step::Task(Webp), Step::Task(Images)]);
        let union = Step::union([fonts.clone(), images.clone()]).unwrap();
        assert_eq!(union, Step::parallel([fonts, images]));
        assert!(union.tasks().contains(&Webp));
        assert!(!union.tasks().contains(&Views));
    }
}
