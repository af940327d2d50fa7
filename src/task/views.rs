//! `views`: handlebars → version injection → `<stem>.html`.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

use super::{TaskError, TaskKind, TaskReport, ensure_dir, process_files, sources, write_output};
use crate::config::{AssetClass, PipelineConfig};
use crate::transcode::TranscodeError;
use crate::transcode::version::VersionInjector;
use crate::transcode::view::ViewRenderer;

const TASK: TaskKind = TaskKind::Views;

pub(super) fn run(config: &PipelineConfig) -> Result<TaskReport, TaskError> {
    let entry = config.paths().entry(AssetClass::Views);
    let files = sources(TASK, config, AssetClass::Views)?;
    ensure_dir(TASK, &entry.dest)?;

    let partials = entry.aux.as_deref();
    let renderer = match ViewRenderer::new(partials, config.views.strict) {
        Ok(renderer) => renderer,
        Err(err) => {
            // Without partials no view can render
            let mut report = TaskReport::new(TASK);
            report.fail(partials.unwrap_or(config.get_root()), &err);
            return report.into_result();
        }
    };

    let data = serde_json::to_value(&config.views.data).unwrap_or(Value::Null);
    let version = &config.views.version;
    let injector = version.enable.then(|| VersionInjector::new(version, now_ms()));

    process_files(TASK, &files, |path| {
        render_one(path, &entry.dest, &renderer, &data, injector.as_ref()).map(|out| vec![out])
    })
    .into_result()
}

fn render_one(
    source: &Path,
    dest: &Path,
    renderer: &ViewRenderer,
    data: &Value,
    injector: Option<&VersionInjector>,
) -> Result<PathBuf, TranscodeError> {
    let html = renderer.render(source, data)?;
    let html = match injector {
        Some(injector) => injector.apply(&html).into_owned(),
        None => html,
    };

    let stem = source.file_stem().unwrap_or_default().to_string_lossy();
    let output = dest.join(format!("{stem}.html"));
    write_output(&output, html)?;
    Ok(output)
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
