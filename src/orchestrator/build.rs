//! One-shot runs: the full pipeline or a list of named tasks.

use std::time::Instant;

use anyhow::{Result, bail};

use super::graph::{RunResult, Step, build_graph, execute};
use crate::config::PipelineConfig;
use crate::logger::ProgressLine;
use crate::task::{TaskError, TaskKind, Tasks};
use crate::utils::path::display_relative;
use crate::{debug, log};

/// Run the full pipeline once. Fails if any task failed.
pub fn build(config: &PipelineConfig) -> Result<()> {
    run_once(&build_graph(), config)
}

/// Run the named tasks once, in order.
pub fn run_tasks(names: &[TaskKind], config: &PipelineConfig) -> Result<()> {
    run_once(&Step::series(names.iter().copied().map(Step::Task)), config)
}

fn run_once(step: &Step, config: &PipelineConfig) -> Result<()> {
    let tasks = Tasks::new();
    let start = Instant::now();
    let result = run_with_progress(step, &tasks, config);
    let elapsed = start.elapsed().as_millis();

    log_failures(&result, config);
    if !result.is_ok() {
        bail!("{} task(s) failed", result.failures.len());
    }

    log!(
        "build";
        "{} file(s) written, {} up to date in {}ms",
        result.written().count(),
        result.skipped_files(),
        elapsed
    );
    Ok(())
}

/// Execute `step` with a task counter on the terminal.
pub(super) fn run_with_progress(step: &Step, tasks: &Tasks, config: &PipelineConfig) -> RunResult {
    let progress = ProgressLine::new(&[("tasks", step.tasks().len())]);
    let result = execute(step, |kind| {
        let result = tasks.run(kind, config);
        progress.inc("tasks");
        result
    });
    progress.finish();

    for report in &result.reports {
        debug!(report.task.name(); "{} written, {} fresh", report.written.len(), report.skipped);
    }
    result
}

/// Log every failed task with its file failures.
pub(super) fn log_failures(result: &RunResult, config: &PipelineConfig) {
    for (kind, err) in &result.failures {
        log!("error"; "{}", describe(*kind, err, config));
    }
    if !result.skipped.is_empty() {
        let names: Vec<_> = result.skipped.iter().map(|k| k.name()).collect();
        log!("build"; "skipped: {}", names.join(", "));
    }
}

/// Multi-line description of a task failure, paths relative to the root.
pub(super) fn describe(kind: TaskKind, err: &TaskError, config: &PipelineConfig) -> String {
    let root = config.get_root();
    match err {
        TaskError::Files(report) => {
            let mut out = format!("{kind}: {} file(s) failed", report.failures.len());
            for failure in &report.failures {
                out.push_str(&format!(
                    "\n  {}: {}",
                    display_relative(&failure.path, root),
                    failure.message
                ));
            }
            out
        }
        TaskError::Io { path, source, .. } => {
            format!("{kind}: {}: {source}", display_relative(path, root))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config_at;
    use crate::transcode::font::fixture::tiny_ttf;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::collections::BTreeMap;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn site() -> TempDir {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("views/partials")).unwrap();
        fs::create_dir_all(src.join("scripts")).unwrap();
        fs::create_dir_all(src.join("styles")).unwrap();
        fs::create_dir_all(src.join("assets")).unwrap();
        fs::write(
            src.join("views/index.hbs"),
            "<html><head><link rel=\"stylesheet\" href=\"styles.min.css\"></head><body>{{> footer}}</body></html>",
        )
        .unwrap();
        fs::write(src.join("views/partials/footer.hbs"), "<footer>hi</footer>").unwrap();
        fs::write(src.join("scripts/main.ts"), "const n: number = 1;\nconsole.log(n + 1);\n").unwrap();
        fs::write(src.join("styles/globals.css"), ".a { color: #ff0000; }\n").unwrap();
        fs::write(src.join("assets/robots.txt"), "User-agent: *").unwrap();
        dir
    }

    #[test]
    fn test_full_build() {
        let dir = site();
        let config = test_config_at(dir.path(), "");
        build(&config).unwrap();

        let dist = dir.path().join("dist");
        let html = fs::read_to_string(dist.join("index.html")).unwrap();
        assert!(html.contains("<footer>hi</footer>"));
        assert!(html.contains("styles.min.css?v="));
        assert!(fs::read_to_string(dist.join("main.min.js")).unwrap().contains("console.log"));
        assert!(fs::read_to_string(dist.join("styles.min.css")).unwrap().contains("color:red"));
        assert!(dist.join("robots.txt").is_file());
        // Font-style file exists even without fonts
        assert!(dir.path().join("src/styles/_fonts.scss").is_file());
    }

    /// Every file under `dir`, keyed by its path relative to `dir`.
    fn snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
        fn collect(root: &Path, dir: &Path, out: &mut BTreeMap<PathBuf, Vec<u8>>) {
            for entry in fs::read_dir(dir).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    collect(root, &path, out);
                } else {
                    let rel = path.strip_prefix(root).unwrap().to_path_buf();
                    out.insert(rel, fs::read(&path).unwrap());
                }
            }
        }
        let mut out = BTreeMap::new();
        collect(dir, dir, &mut out);
        out
    }

    #[test]
    fn test_rebuild_is_byte_identical() {
        let dir = site();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("images/icons")).unwrap();
        fs::create_dir_all(src.join("fonts")).unwrap();
        DynamicImage::ImageRgb8(RgbImage::from_fn(8, 8, |x, y| {
            image::Rgb([(x * 30) as u8, (y * 30) as u8, 90])
        }))
        .save_with_format(src.join("images/hero.png"), ImageFormat::Png)
        .unwrap();
        fs::write(
            src.join("images/icons/dot.svg"),
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"4\" height=\"4\"><circle cx=\"2\" cy=\"2\" r=\"2\"/></svg>",
        )
        .unwrap();
        fs::write(src.join("fonts/Inter-Bold.ttf"), tiny_ttf(512)).unwrap();

        let config = test_config_at(dir.path(), "[views.version]\nvalue = \"fixed\"");
        let dist = dir.path().join("dist");

        build(&config).unwrap();
        let first = snapshot(&dist);
        build(&config).unwrap();
        let second = snapshot(&dist);

        assert_eq!(
            first.keys().collect::<Vec<_>>(),
            second.keys().collect::<Vec<_>>()
        );
        for (path, bytes) in &first {
            assert!(!bytes.is_empty(), "{} is empty", path.display());
            assert!(second[path] == *bytes, "{} differs between builds", path.display());
        }

        // Every asset class produced output
        let has = |pred: &dyn Fn(&Path) -> bool| first.keys().any(|p| pred(p));
        let ext = |p: &Path, e: &str| p.extension().is_some_and(|x| x == e);
        assert!(has(&|p| p == Path::new("index.html")));
        assert!(has(&|p| p == Path::new("main.min.js")));
        assert!(has(&|p| p == Path::new("styles.min.css")));
        assert!(has(&|p| p == Path::new("robots.txt")));
        assert!(has(&|p| p.starts_with("images") && ext(p, "png")));
        assert!(has(&|p| p.starts_with("images") && ext(p, "svg")));
        assert!(has(&|p| p.starts_with("images") && ext(p, "webp")));
        assert!(has(&|p| p.starts_with("fonts") && ext(p, "woff2")));
        assert!(has(&|p| p.starts_with("fonts") && ext(p, "woff")));

        let html = String::from_utf8(first[Path::new("index.html")].clone()).unwrap();
        assert!(html.contains("styles.min.css?v=fixed"));
    }

    #[test]
    fn test_clean_removes_stale_output() {
        let dir = site();
        let config = test_config_at(dir.path(), "");
        fs::create_dir_all(dir.path().join("dist")).unwrap();
        fs::write(dir.path().join("dist/stale.html"), "old").unwrap();

        build(&config).unwrap();
        assert!(!dir.path().join("dist/stale.html").exists());
    }

    #[test]
    fn test_build_fails_on_broken_source() {
        let dir = site();
        fs::write(dir.path().join("src/scripts/main.ts"), "let = ;").unwrap();
        let config = test_config_at(dir.path(), "");

        let err = build(&config).unwrap_err();
        assert_eq!(err.to_string(), "1 task(s) failed");
        // Siblings still ran
        assert!(dir.path().join("dist/index.html").is_file());
    }

    #[test]
    fn test_run_named_tasks() {
        let dir = site();
        let config = test_config_at(dir.path(), "");
        run_tasks(&[TaskKind::Styles], &config).unwrap();

        let dist = dir.path().join("dist");
        assert!(dist.join("styles.min.css").is_file());
        assert!(!dist.join("index.html").exists());
    }

    #[test]
    fn test_describe_file_failures() {
        let dir = site();
        let config = test_config_at(dir.path(), "");
        let mut report = crate::task::TaskReport::new(TaskKind::Views);
        report.fail(
            &dir.path().join("src/views/index.hbs"),
            &std::io::Error::other("unclosed block"),
        );
        let err = report.into_result().unwrap_err();
        assert_eq!(
            describe(TaskKind::Views, &err, &config),
            "views: 1 file(s) failed\n  src/views/index.hbs: unclosed block"
        );
    }
}
