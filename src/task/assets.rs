//! `assets`: copy static files verbatim.

use super::{TaskError, TaskKind, TaskReport, copy_fresh, ensure_dir, mirrored, process_files, sources};
use crate::config::{AssetClass, PipelineConfig};

const TASK: TaskKind = TaskKind::Assets;

pub(super) fn run(config: &PipelineConfig) -> Result<TaskReport, TaskError> {
    let files = sources(TASK, config, AssetClass::Assets)?;
    ensure_dir(TASK, &config.paths().entry(AssetClass::Assets).dest)?;

    process_files(TASK, &files, |path| {
        copy_fresh(path, &mirrored(config, AssetClass::Assets, path))
    })
    .into_result()
}
