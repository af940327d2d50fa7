//! Handlebars view rendering.
//!
//! Templates under the partials directory are registered by their path
//! relative to it, without extension: `partials/layout/head.hbs` is
//! available as `{{> layout/head}}`.

use std::fs;
use std::path::Path;

use handlebars::Handlebars;
use jwalk::{Parallelism, WalkDir};
use serde_json::Value;

use super::TranscodeError;
use crate::utils::path::relative_slash;

/// Template registry for one views run.
pub struct ViewRenderer {
    registry: Handlebars<'static>,
}

impl ViewRenderer {
    /// Build a renderer, registering every `.hbs` under `partials`.
    ///
    /// A missing partials directory registers nothing.
    pub fn new(partials: Option<&Path>, strict: bool) -> Result<Self, TranscodeError> {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(strict);

        if let Some(dir) = partials.filter(|d| d.is_dir()) {
            let mut files = Vec::new();
            for entry in WalkDir::new(dir).parallelism(Parallelism::Serial) {
                let entry = entry.map_err(|e| TranscodeError::io(dir, e.into()))?;
                let path = entry.path();
                if entry.file_type().is_file() && path.extension().is_some_and(|e| e == "hbs") {
                    files.push(path);
                }
            }
            files.sort();

            for file in files {
                let Some(rel) = relative_slash(&file, dir) else {
                    continue;
                };
                let name = rel.trim_end_matches(".hbs");
                let source =
                    fs::read_to_string(&file).map_err(|e| TranscodeError::io(&file, e))?;
                registry.register_partial(name, source).map_err(|e| {
                    TranscodeError::Template(format!("partial `{name}`: {e}"))
                })?;
            }
        }

        Ok(Self { registry })
    }

    #[cfg(test)]
    pub fn has_partial(&self, name: &str) -> bool {
        self.registry.has_template(name)
    }

    /// Render one view with the global data plus `page` (the file stem).
    pub fn render(&self, source: &Path, data: &Value) -> Result<String, TranscodeError> {
        let template = fs::read_to_string(source).map_err(|e| TranscodeError::io(source, e))?;
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut context = match data {
            Value::Object(map) => map.clone(),
            _ => serde_json::Map::new(),
        };
        context
            .entry("page")
            .or_insert_with(|| Value::String(stem));

        self.registry
            .render_template(&template, &Value::Object(context))
            .map_err(|e| TranscodeError::Template(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_render_with_partials_and_data() {
        let dir = TempDir::new().unwrap();
        let partials = dir.path().join("partials");
        fs::create_dir_all(partials.join("layout")).unwrap();
        fs::write(partials.join("layout/head.hbs"), "<title>{{title}}</title>").unwrap();

        let page = dir.path().join("about.hbs");
        fs::write(&page, "<html>{{> layout/head}}<body class=\"{{page}}\"></body></html>").unwrap();

        let renderer = ViewRenderer::new(Some(&partials), false).unwrap();
        assert!(renderer.has_partial("layout/head"));

        let html = renderer.render(&page, &json!({ "title": "About" })).unwrap();
        assert_eq!(
            html,
            "<html><title>About</title><body class=\"about\"></body></html>"
        );
    }

    #[test]
    fn test_missing_partials_dir_is_fine() {
        let dir = TempDir::new().unwrap();
        let renderer = ViewRenderer::new(Some(&dir.path().join("nope")), false).unwrap();
        assert!(!renderer.has_partial("nav"));
    }

    #[test]
    fn test_strict_mode_reports_missing_variable() {
        let dir = TempDir::new().unwrap();
        let page = dir.path().join("index.hbs");
        fs::write(&page, "{{missing}}").unwrap();

        let lax = ViewRenderer::new(None, false).unwrap();
        assert_eq!(lax.render(&page, &json!({})).unwrap(), "");

        let strict = ViewRenderer::new(None, true).unwrap();
        assert!(matches!(
            strict.render(&page, &json!({})),
            Err(TranscodeError::Template(_))
        ));
    }

    #[test]
    fn test_syntax_error() {
        let dir = TempDir::new().unwrap();
        let page = dir.path().join("index.hbs");
        fs::write(&page, "{{#if}}").unwrap();

        let renderer = ViewRenderer::new(None, false).unwrap();
        assert!(renderer.render(&page, &json!({})).is_err());
    }
}
