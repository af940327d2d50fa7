//! Which steps a batch of changed paths reruns.

use std::path::PathBuf;

use crate::config::{AssetClass, PipelineConfig};
use crate::orchestrator::{Step, build_graph};
use crate::task::TaskKind;

/// Rules in evaluation order: a change matching a class's watch patterns
/// reruns that class's step.
pub(super) fn rules() -> [(AssetClass, Step); 6] {
    use TaskKind::*;
    [
        (AssetClass::Views, Step::parallel([Step::Task(Views), Step::Task(Styles)])),
        (AssetClass::Styles, Step::Task(Styles)),
        (AssetClass::Scripts, Step::parallel([Step::Task(Scripts), Step::Task(Styles)])),
        (
            AssetClass::Fonts,
            Step::series([Step::Task(CleanFontStyles), Step::Task(Fonts)]),
        ),
        (AssetClass::Images, Step::parallel([Step::Task(Webp), Step::Task(Images)])),
        (AssetClass::Assets, Step::Task(Assets)),
    ]
}

/// What to do about one batch of changes.
#[derive(Debug, PartialEq, Eq)]
pub(super) struct Plan {
    /// Re-read `sluice.toml` before running.
    pub reload_config: bool,
    /// `None` when no rule matched.
    pub step: Option<Step>,
}

/// Plan the rerun for `paths`, rules evaluated in table order.
///
/// A change to the config file replaces everything with the full build.
pub(super) fn plan(paths: &[PathBuf], config: &PipelineConfig) -> Plan {
    if paths.iter().any(|p| config.is_config_file(p)) {
        return Plan {
            reload_config: true,
            step: Some(build_graph()),
        };
    }

    let table = config.paths();
    let matched = rules()
        .into_iter()
        .filter(|(class, _)| paths.iter().any(|p| table.watches(*class, p)))
        .map(|(class, step)| {
            crate::debug!("watch"; "{} rule matched", class);
            step
        });

    Plan {
        reload_config: false,
        step: Step::union(matched),
    }
}
