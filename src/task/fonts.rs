//! `fonts`: TrueType → WOFF2/WOFF, plus the regenerated font-style file.
//!
//! Conversions run in parallel and are freshness-guarded per output. Face
//! descriptors are gathered into a [`FontFaceSheet`] and written to the
//! class `aux` file once, after every font has been processed. Faces whose
//! outputs were fresh are still declared.

use std::fs;
use std::path::{Path, PathBuf};

use super::{TaskError, TaskKind, TaskReport, ensure_dir, process_files, sources, write_output};
use crate::config::{AssetClass, FontsConfig, PipelineConfig};
use crate::freshness::is_fresh;
use crate::log;
use crate::transcode::TranscodeError;
use crate::transcode::font::{FontFace, FontFaceSheet, FontFormat, to_woff, to_woff2};
use crate::utils::path::{display_relative, relative_url};

const TASK: TaskKind = TaskKind::Fonts;

pub(super) fn run(config: &PipelineConfig) -> Result<TaskReport, TaskError> {
    let table = config.paths();
    let entry = table.entry(AssetClass::Fonts);
    let files = sources(TASK, config, AssetClass::Fonts)?;
    ensure_dir(TASK, &entry.dest)?;

    let formats = formats(&config.fonts);
    let report = process_files(TASK, &files, |path| convert(path, &entry.dest, &formats));

    let mut sheet = FontFaceSheet::new();
    for path in &files {
        if report.failures.iter().any(|f| &f.path == path) {
            continue;
        }
        if let Some(face) = FontFace::from_path(path) {
            sheet.insert(face);
        }
    }

    if let Some(aux) = &entry.aux {
        let url = font_url(config);
        sheet
            .write(aux, &url, &config.fonts.display, &formats)
            .map_err(|e| match e {
                TranscodeError::Io(path, source) => TaskError::io(TASK, path, source),
                other => TaskError::io(TASK, aux, std::io::Error::other(other.to_string())),
            })?;
        log!(TASK.name(); "{} face(s) → {}", sheet.len(), display_relative(aux, table.root()));
    }

    report.into_result()
}

/// Enabled output formats, most compact first.
fn formats(fonts: &FontsConfig) -> Vec<FontFormat> {
    let mut formats = Vec::with_capacity(2);
    if fonts.woff2 {
        formats.push(FontFormat::Woff2);
    }
    if fonts.woff {
        formats.push(FontFormat::Woff);
    }
    formats
}

/// URL prefix of the font files as seen from the compiled stylesheet.
fn font_url(config: &PipelineConfig) -> String {
    if let Some(url) = &config.fonts.url {
        return url.clone();
    }
    let table = config.paths();
    relative_url(
        &table.entry(AssetClass::Styles).dest,
        &table.entry(AssetClass::Fonts).dest,
    )
}

fn convert(source: &Path, dest: &Path, formats: &[FontFormat]) -> Result<Vec<PathBuf>, TranscodeError> {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let pending: Vec<_> = formats
        .iter()
        .map(|f| (*f, dest.join(format!("{stem}.{}", f.extension()))))
        .filter(|(_, out)| !is_fresh(source, out))
        .collect();
    if pending.is_empty() {
        return Ok(Vec::new());
    }

    let ttf = fs::read(source).map_err(|e| TranscodeError::io(source, e))?;
    let mut written = Vec::with_capacity(pending.len());
    for (format, output) in pending {
        let bytes = match format {
            FontFormat::Woff2 => to_woff2(&ttf)?,
            FontFormat::Woff => to_woff(&ttf)?,
        };
        write_output(&output, bytes)?;
        written.push(output);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config_at;
    use crate::task::clean::clean_font_styles;
    use crate::transcode::font::fixture::tiny_ttf;
    use std::fs::File;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    fn site(fonts: &[&str]) -> TempDir {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src/fonts");
        fs::create_dir_all(&src).unwrap();
        for name in fonts {
            fs::write(src.join(name), tiny_ttf(256)).unwrap();
        }
        dir
    }

    fn sheet(config: &PipelineConfig) -> String {
        let aux = config.paths().entry(AssetClass::Fonts).aux.clone().unwrap();
        fs::read_to_string(aux).unwrap()
    }

    #[test]
    fn test_converts_and_declares() {
        let dir = site(&["Inter-SemiBoldItalic.ttf", "Inter-Regular.ttf"]);
        let config = test_config_at(dir.path(), "");

        let report = run(&config).unwrap();
        let fonts = config.paths().dest().join("fonts");
        assert_eq!(report.written.len(), 4);
        assert_eq!(&fs::read(fonts.join("Inter-Regular.woff2")).unwrap()[..4], b"wOF2");
        assert_eq!(&fs::read(fonts.join("Inter-Regular.woff")).unwrap()[..4], b"wOFF");

        let css = sheet(&config);
        assert_eq!(css.matches("@font-face").count(), 2);
        assert!(css.contains("font-weight: 600;"));
        assert!(css.contains("font-style: italic;"));
        assert!(css.contains("font-weight: 400;"));
        assert!(css.contains(
            r#"src: url("fonts/Inter-Regular.woff2") format("woff2"), url("fonts/Inter-Regular.woff") format("woff");"#
        ));
    }

    #[test]
    fn test_freshness_skips_conversion() {
        let dir = site(&["Inter-Bold.ttf"]);
        let config = test_config_at(dir.path(), "");
        run(&config).unwrap();

        let report = run(&config).unwrap();
        assert!(report.written.is_empty());
        assert_eq!(report.skipped, 1);
        // Still declared
        assert!(sheet(&config).contains("font-weight: 700;"));

        // Touching the source reconverts both formats
        let src = dir.path().join("src/fonts/Inter-Bold.ttf");
        File::options()
            .write(true)
            .open(&src)
            .unwrap()
            .set_modified(SystemTime::now() + Duration::from_secs(60))
            .unwrap();
        assert_eq!(run(&config).unwrap().written.len(), 2);
    }

    #[test]
    fn test_rerun_after_clean_has_no_duplicates() {
        let dir = site(&["Inter-Light.ttf", "Mono.ttf"]);
        let config = test_config_at(dir.path(), "");

        run(&config).unwrap();
        clean_font_styles(&config).unwrap();
        run(&config).unwrap();

        let css = sheet(&config);
        assert_eq!(css.matches("@font-face").count(), 2);
        assert_eq!(css.matches("\"Inter\"").count(), 1);
        // No separator: normal upright face
        assert!(css.contains("font-family: \"Mono\";\n  font-style: normal;\n  font-weight: normal;"));
    }

    #[test]
    fn test_formats_and_url_from_config() {
        let dir = site(&["Inter-Black.ttf"]);
        let config = test_config_at(
            dir.path(),
            "[fonts]\nwoff = false\nurl = \"/static/fonts\"",
        );

        let report = run(&config).unwrap();
        assert_eq!(report.written.len(), 1);
        assert!(!config.paths().dest().join("fonts/Inter-Black.woff").exists());
        assert!(sheet(&config).contains(r#"src: url("/static/fonts/Inter-Black.woff2") format("woff2");"#));
    }

    #[test]
    fn test_invalid_font_is_not_declared() {
        let dir = site(&["Inter-Bold.ttf"]);
        fs::write(dir.path().join("src/fonts/Broken-Bold.ttf"), "nope").unwrap();
        let config = test_config_at(dir.path(), "");

        let err = run(&config).unwrap_err();
        assert_eq!(err.report().unwrap().failures.len(), 1);
        let css = sheet(&config);
        assert!(css.contains("\"Inter\""));
        assert!(!css.contains("Broken"));
    }
}
