//! `images`: copy images into the output tree, optionally re-encoded.

use std::fs;
use std::path::{Path, PathBuf};

use super::{
    TaskError, TaskKind, TaskReport, copy_fresh, ensure_dir, mirrored, process_files, sources,
    write_output,
};
use crate::config::{AssetClass, ImagesConfig, PipelineConfig};
use crate::freshness::is_fresh;
use crate::transcode::TranscodeError;
use crate::transcode::image::optimize;

const TASK: TaskKind = TaskKind::Images;

pub(super) fn run(config: &PipelineConfig) -> Result<TaskReport, TaskError> {
    let entry = config.paths().entry(AssetClass::Images);
    let files = sources(TASK, config, AssetClass::Images)?;
    ensure_dir(TASK, &entry.dest)?;

    process_files(TASK, &files, |path| {
        let output = mirrored(config, AssetClass::Images, path);
        if config.images.optimize {
            optimize_one(path, &output, &config.images)
        } else {
            copy_fresh(path, &output)
        }
    })
    .into_result()
}

fn optimize_one(
    source: &Path,
    output: &Path,
    images: &ImagesConfig,
) -> Result<Vec<PathBuf>, TranscodeError> {
    if is_fresh(source, output) {
        return Ok(Vec::new());
    }
    let ext = source
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();
    let bytes = fs::read(source).map_err(|e| TranscodeError::io(source, e))?;
    write_output(output, optimize(ext, &bytes, images.quality)?)?;
    Ok(vec![output.to_path_buf()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config_at;
    use tempfile::TempDir;

    const SVG: &str = r##"<?xml version="1.0"?>
<!-- exported by an editor -->
<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10">
    <metadata>editor junk</metadata>
    <rect x="0" y="0" width="10" height="10" fill="#ff0000"/>
</svg>
"##;

    fn site() -> TempDir {
        let dir = TempDir::new().unwrap();
        let images = dir.path().join("src/images/icons");
        fs::create_dir_all(&images).unwrap();
        fs::write(images.join("logo.svg"), SVG).unwrap();
        fs::write(dir.path().join("src/images/notes.txt"), "not an image").unwrap();
        dir
    }

    #[test]
    fn test_copies_verbatim_by_default() {
        let dir = site();
        let config = test_config_at(dir.path(), "");

        let report = run(&config).unwrap();
        let out = config.paths().dest().join("images/icons/logo.svg");
        assert_eq!(report.written, vec![out.clone()]);
        assert_eq!(fs::read_to_string(out).unwrap(), SVG);

        // Second run: everything fresh
        let report = run(&config).unwrap();
        assert!(report.written.is_empty());
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn test_optimize_svg() {
        let dir = site();
        let config = test_config_at(dir.path(), "[images]\noptimize = true");

        run(&config).unwrap();
        let out = fs::read_to_string(config.paths().dest().join("images/icons/logo.svg")).unwrap();
        assert!(out.len() < SVG.len());
        assert!(!out.contains("editor junk"));
        assert!(out.contains("<svg"));
    }

    #[test]
    fn test_optimize_failure_is_per_file() {
        let dir = site();
        fs::write(dir.path().join("src/images/broken.png"), "garbage").unwrap();
        let config = test_config_at(dir.path(), "[images]\noptimize = true");

        let err = run(&config).unwrap_err();
        assert!(!err.is_hard());
        let report = err.report().unwrap();
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].path.ends_with("broken.png"));
        assert_eq!(report.written.len(), 1);
    }
}
