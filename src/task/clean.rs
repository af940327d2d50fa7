//! `clean` and `clean-font-styles`.

use std::fs;
use std::io;
use std::path::Path;

use super::{TaskError, TaskKind, TaskReport};
use crate::config::{AssetClass, PipelineConfig};
use crate::debug;

/// Remove the whole output root.
pub(super) fn clean(config: &PipelineConfig) -> Result<TaskReport, TaskError> {
    let table = config.paths();
    let dest = table.dest();
    // Config validation keeps dest inside the project, never the root itself
    if dest == table.root() {
        return Err(TaskError::io(
            TaskKind::Clean,
            dest,
            io::Error::other("refusing to remove the project root"),
        ));
    }
    remove(TaskKind::Clean, dest, |p| fs::remove_dir_all(p))
}

/// Delete the regenerated font-style file so the next fonts run starts from
/// an empty sheet.
pub(super) fn clean_font_styles(config: &PipelineConfig) -> Result<TaskReport, TaskError> {
    match &config.paths().entry(AssetClass::Fonts).aux {
        Some(path) => remove(TaskKind::CleanFontStyles, path, |p| fs::remove_file(p)),
        None => Ok(TaskReport::new(TaskKind::CleanFontStyles)),
    }
}

fn remove(
    task: TaskKind,
    path: &Path,
    op: fn(&Path) -> io::Result<()>,
) -> Result<TaskReport, TaskError> {
    let mut report = TaskReport::new(task);
    match op(path) {
        Ok(()) => debug!(task.name(); "removed {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => report.skipped += 1,
        Err(e) => return Err(TaskError::io(task, path, e)),
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config_at;
    use tempfile::TempDir;

    #[test]
    fn test_clean_removes_output_root() {
        let dir = TempDir::new().unwrap();
        let config = test_config_at(dir.path(), "");
        let dist = config.paths().dest().to_path_buf();
        fs::create_dir_all(dist.join("images")).unwrap();
        fs::write(dist.join("images/a.png"), "x").unwrap();
        fs::write(dist.join("index.html"), "x").unwrap();

        clean(&config).unwrap();
        assert!(!dist.exists());

        // Second run has nothing to do
        let report = clean(&config).unwrap();
        assert_eq!(report.skipped, 1);
    }

    #[test]
    fn test_clean_font_styles() {
        let dir = TempDir::new().unwrap();
        let config = test_config_at(dir.path(), "");
        let sheet = config
            .paths()
            .entry(AssetClass::Fonts)
            .aux
            .clone()
            .unwrap();
        fs::create_dir_all(sheet.parent().unwrap()).unwrap();
        fs::write(&sheet, "@font-face {}").unwrap();

        clean_font_styles(&config).unwrap();
        assert!(!sheet.exists());
        assert!(clean_font_styles(&config).is_ok());
    }
}
