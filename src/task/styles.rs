//! `styles`: preprocess → Tailwind (optional) → prefix + minify.

use std::path::PathBuf;

use super::{TaskError, TaskKind, TaskReport, ensure_dir, entry_output, sources, write_output};
use crate::config::{AssetClass, PipelineConfig};
use crate::transcode::style::{StyleOptions, TailwindRun, compile};

const TASK: TaskKind = TaskKind::Styles;

pub(super) fn run(config: &PipelineConfig) -> Result<TaskReport, TaskError> {
    let table = config.paths();
    let entry = table.entry(AssetClass::Styles);
    let files = sources(TASK, config, AssetClass::Styles)?;
    ensure_dir(TASK, &entry.dest)?;

    let styles = &config.styles;
    let tailwind = styles.tailwind.is_enabled(entry.aux.as_deref()).then(|| TailwindRun {
        command: &styles.tailwind.command,
        config: entry.aux.as_deref(),
        quiet: styles.tailwind.quiet,
        cwd: table.root(),
        scratch: &entry.dest,
    });
    let options = StyleOptions {
        targets: &styles.targets,
        minify: styles.minify,
        load_paths: &styles.load_paths,
        tailwind,
    };

    let single = files.len() == 1;
    let mut report = TaskReport::new(TASK);
    // Sequential: Tailwind scratch files are shared
    for path in &files {
        let output = entry_output(&entry.dest, path, single, &styles.output, ".min.css");
        let result = compile(path, &options)
            .and_then(|css| write_output(&output, css))
            .map(|()| vec![output]);
        report.record(path, result);
    }
    report.into_result()
}

/// Whether every written file is a stylesheet. Such runs can be applied in
/// the browser without a page reload.
pub fn only_stylesheets(written: &[PathBuf]) -> bool {
    !written.is_empty()
        && written
            .iter()
            .all(|p| p.extension().is_some_and(|e| e.eq_ignore_ascii_case("css")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config_at;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    #[test]
    fn test_scss_entry_with_partial() {
        let dir = TempDir::new().unwrap();
        let styles = dir.path().join("src/styles");
        fs::create_dir_all(&styles).unwrap();
        fs::write(styles.join("_tokens.scss"), "$accent: #ff0000;\n").unwrap();
        fs::write(
            styles.join("globals.scss"),
            "@import \"tokens\";\n.button { color: $accent; user-select: none; }\n",
        )
        .unwrap();
        let config = test_config_at(dir.path(), "[styles]\ntargets = [\"safari 10\"]");

        let report = run(&config).unwrap();
        let out = config.paths().dest().join("styles.min.css");
        assert_eq!(report.written, vec![out.clone()]);

        let css = fs::read_to_string(out).unwrap();
        assert!(css.contains("color:red"));
        assert!(css.contains("-webkit-user-select:none"));
        assert!(css.contains(".button{"));
    }

    #[test]
    fn test_missing_entry_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let config = test_config_at(dir.path(), "");
        let report = run(&config).unwrap();
        assert!(report.written.is_empty());
    }

    #[test]
    fn test_sass_error_is_file_failure() {
        let dir = TempDir::new().unwrap();
        let styles = dir.path().join("src/styles");
        fs::create_dir_all(&styles).unwrap();
        fs::write(styles.join("globals.scss"), ".a { color: $undefined; }").unwrap();
        let config = test_config_at(dir.path(), "");

        let err = run(&config).unwrap_err();
        assert_eq!(err.report().unwrap().failures.len(), 1);
    }

    #[test]
    fn test_only_stylesheets() {
        assert!(only_stylesheets(&[PathBuf::from("dist/styles.min.css")]));
        assert!(!only_stylesheets(&[
            PathBuf::from("dist/styles.min.css"),
            Path::new("dist/index.html").to_path_buf()
        ]));
        assert!(!only_stylesheets(&[]));
    }
}
