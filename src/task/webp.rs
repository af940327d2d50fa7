//! `webp`: raster images → lossless WebP next to the copied originals.

use std::fs;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;

use super::{TaskError, TaskKind, TaskReport, ensure_dir, mirrored, process_files, sources, write_output};
use crate::config::{AssetClass, PipelineConfig};
use crate::debug;
use crate::freshness::is_fresh;
use crate::transcode::TranscodeError;
use crate::transcode::image::to_webp;

const TASK: TaskKind = TaskKind::Webp;

pub(super) fn run(config: &PipelineConfig) -> Result<TaskReport, TaskError> {
    let entry = config.paths().entry(AssetClass::Images);
    let files = convertible(config, sources(TASK, config, AssetClass::Images)?);
    ensure_dir(TASK, &entry.dest)?;

    process_files(TASK, &files, |path| {
        let output = mirrored(config, AssetClass::Images, path).with_extension("webp");
        convert(path, &output)
    })
    .into_result()
}

/// Sources to convert, at most one per output path.
///
/// An authored `.webp` among the sources is copied by `images` and wins
/// over conversion. Between `hero.png` and `hero.jpg` the first in source
/// order wins.
fn convertible(config: &PipelineConfig, sources: Vec<PathBuf>) -> Vec<PathBuf> {
    let authored: FxHashSet<PathBuf> = sources
        .iter()
        .filter(|p| p.extension().is_some_and(|e| e.eq_ignore_ascii_case("webp")))
        .cloned()
        .collect();

    let mut claimed = FxHashSet::default();
    sources
        .into_iter()
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| config.images.converts_to_webp(e))
        })
        .filter(|p| {
            let target = p.with_extension("webp");
            if authored.contains(&target) || !claimed.insert(target) {
                debug!(TASK.name(); "skip {}: webp output already provided", p.display());
                return false;
            }
            true
        })
        .collect()
}

fn convert(source: &Path, output: &Path) -> Result<Vec<PathBuf>, TranscodeError> {
    if is_fresh(source, output) {
        return Ok(Vec::new());
    }
    let bytes = fs::read(source).map_err(|e| TranscodeError::io(source, e))?;
    write_output(output, to_webp(&bytes)?)?;
    Ok(vec![output.to_path_buf()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config_at;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::fs::File;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn write_png(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, image::Rgb([10, 20, 30])))
            .save_with_format(path, ImageFormat::Png)
            .unwrap();
    }

    fn set_mtime(path: &Path, time: SystemTime) {
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(time)
            .unwrap();
    }

    #[test]
    fn test_converts_and_mirrors_tree() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src/images/icons/dot.png");
        write_png(&src);
        fs::write(dir.path().join("src/images/logo.svg"), "<svg/>").unwrap();
        let config = test_config_at(dir.path(), "");

        let report = run(&config).unwrap();
        let out = config.paths().dest().join("images/icons/dot.webp");
        assert_eq!(report.written, vec![out.clone()]);
        assert_eq!(&fs::read(out).unwrap()[8..12], b"WEBP");
    }

    #[test]
    fn test_authored_webp_is_not_overwritten() {
        let dir = TempDir::new().unwrap();
        let images = dir.path().join("src/images");
        write_png(&images.join("hero.png"));
        write_png(&images.join("banner.png"));
        write_png(&images.join("banner.jpg"));
        fs::write(images.join("hero.webp"), "authored").unwrap();
        let config = test_config_at(dir.path(), "");

        let report = run(&config).unwrap();
        let dest = config.paths().dest().join("images");
        assert_eq!(report.written, vec![dest.join("banner.webp")]);
        assert!(!dest.join("hero.webp").exists());
    }

    #[test]
    fn test_freshness() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src/images/dot.png");
        write_png(&src);
        let config = test_config_at(dir.path(), "");
        let out = config.paths().dest().join("images/dot.webp");

        run(&config).unwrap();

        // Output newer than source: skipped
        let now = SystemTime::now();
        set_mtime(&src, now - Duration::from_secs(60));
        set_mtime(&out, now);
        let report = run(&config).unwrap();
        assert_eq!(report.skipped, 1);
        assert!(report.written.is_empty());

        // Equal times: still fresh
        set_mtime(&src, now);
        assert_eq!(run(&config).unwrap().skipped, 1);

        // Source newer: reconverted
        set_mtime(&src, now + Duration::from_secs(60));
        let report = run(&config).unwrap();
        assert_eq!(report.written, vec![out]);
    }

    #[test]
    fn test_corrupt_image_is_file_failure() {
        let dir = TempDir::new().unwrap();
        let images = dir.path().join("src/images");
        fs::create_dir_all(&images).unwrap();
        fs::write(images.join("broken.jpg"), "not a jpeg").unwrap();
        write_png(&images.join("ok.png"));
        let config = test_config_at(dir.path(), "");

        let err = run(&config).unwrap_err();
        let report = err.report().unwrap();
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.written.len(), 1);
    }
}
