//! `scripts`: oxc bundle per entry, with an incremental cache.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::{TaskError, TaskKind, TaskReport, ensure_dir, entry_output, sources, write_output};
use crate::config::{AssetClass, PipelineConfig};
use crate::debug;
use crate::freshness::ContentHash;
use crate::transcode::TranscodeError;
use crate::transcode::script::{BundleOptions, bundle};

const TASK: TaskKind = TaskKind::Scripts;

/// Incremental cache of the scripts task.
///
/// Maps an entry file to the modules it was last bundled from, their
/// fingerprint (contents plus bundle options) and the bytes produced. A hit
/// skips resolving, transforming and minifying; the output is still written.
#[derive(Debug, Default)]
pub struct ScriptCache {
    entries: FxHashMap<PathBuf, CachedBundle>,
}

#[derive(Debug, Clone)]
struct CachedBundle {
    inputs: Vec<PathBuf>,
    fingerprint: ContentHash,
    output: Arc<str>,
}

impl ScriptCache {
    /// Cached output for `entry` if none of its modules changed since.
    pub fn get(&self, entry: &Path, options: &BundleOptions) -> Option<Arc<str>> {
        let cached = self.entries.get(entry)?;
        // A module that can no longer be read is a miss
        let current = options.fingerprint_files(&cached.inputs).ok()?;
        (current == cached.fingerprint).then(|| Arc::clone(&cached.output))
    }

    pub fn insert(
        &mut self,
        entry: PathBuf,
        inputs: Vec<PathBuf>,
        fingerprint: ContentHash,
        output: Arc<str>,
    ) {
        self.entries.insert(
            entry,
            CachedBundle {
                inputs,
                fingerprint,
                output,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

pub(super) fn run(config: &PipelineConfig, cache: &mut ScriptCache) -> Result<TaskReport, TaskError> {
    let entry = config.paths().entry(AssetClass::Scripts);
    let files = sources(TASK, config, AssetClass::Scripts)?;
    ensure_dir(TASK, &entry.dest)?;

    let options = BundleOptions::from_config(&config.scripts);
    let use_cache = config.scripts.cache;
    let single = files.len() == 1;

    let mut report = TaskReport::new(TASK);
    for path in &files {
        let output = entry_output(&entry.dest, path, single, &config.scripts.output, ".min.js");
        let result = bundle_cached(path, &options, use_cache.then_some(&mut *cache))
            .and_then(|code| write_output(&output, code.as_bytes()))
            .map(|()| vec![output]);
        report.record(path, result);
    }
    if use_cache {
        debug!("scripts"; "cache: {} entries", cache.len());
    }
    report.into_result()
}

fn bundle_cached(
    path: &Path,
    options: &BundleOptions,
    cache: Option<&mut ScriptCache>,
) -> Result<Arc<str>, TranscodeError> {
    let Some(cache) = cache else {
        return bundle(path, options).map(|b| Arc::from(b.code));
    };

    if let Some(code) = cache.get(path, options) {
        debug!("scripts"; "cache hit {}", path.display());
        return Ok(code);
    }

    let bundled = bundle(path, options)?;
    debug!("scripts"; "bundled {} module(s) from {}", bundled.inputs.len(), path.display());
    let code: Arc<str> = bundled.code.into();
    cache.insert(
        path.to_path_buf(),
        bundled.inputs,
        bundled.fingerprint,
        Arc::clone(&code),
    );
    Ok(code)
}
