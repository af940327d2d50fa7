//! Version-number injection for cache busting.
//!
//! Appends `key=value` to the query of every `src` / `href` URL whose
//! extension is listed in `[views.version] to`:
//!
//! ```text
//! <link href="styles.min.css">        → <link href="styles.min.css?v=3f2a…">
//! <script src="main.min.js?x=1">      → <script src="main.min.js?x=1&v=3f2a…">
//! ```
//!
//! The value template is resolved once per views run, so every page of a
//! run shares the same value.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::config::VersionConfig;
use crate::freshness::ContentHash;
use crate::utils::date::DateTimeUtc;

/// `src="…"` / `href='…'` attributes. Case variants spelled out so the
/// pattern needs no Unicode case tables.
static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"([ \t\r\n])([sS][rR][cC]|[hH][rR][eE][fF])([ \t\r\n]*=[ \t\r\n]*)(?:"([^"]*)"|'([^']*)')"#,
    )
    .expect("static regex")
});

/// Resolve a value template against a build timestamp (ms since epoch).
///
/// | token   | replaced by                                  |
/// |---------|----------------------------------------------|
/// | `%MDS%` | hex digest of the timestamp (32 chars)       |
/// | `%TS%`  | the timestamp in milliseconds                |
/// | `%DT%`  | UTC date-time as `YYYYMMDDhhmmss`            |
///
/// Anything else is kept literally.
pub fn resolve_value(template: &str, timestamp_ms: u64) -> String {
    let ts = timestamp_ms.to_string();
    let mut value = template.to_string();
    if value.contains("%MDS%") {
        let digest = ContentHash::of(ts.as_bytes()).to_hex();
        value = value.replace("%MDS%", &digest[..32]);
    }
    if value.contains("%DT%") {
        let dt = DateTimeUtc::from_unix_secs(timestamp_ms / 1000).to_compact();
        value = value.replace("%DT%", &dt);
    }
    value.replace("%TS%", &ts)
}

/// Rewrites asset URLs in rendered HTML.
#[derive(Debug, Clone)]
pub struct VersionInjector {
    key: String,
    value: String,
    to: Vec<String>,
}

impl VersionInjector {
    pub fn new(config: &VersionConfig, timestamp_ms: u64) -> Self {
        Self {
            key: config.key.clone(),
            value: resolve_value(&config.value, timestamp_ms),
            to: config.to.iter().map(|e| e.to_ascii_lowercase()).collect(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Rewrite every matching attribute in `html`.
    pub fn apply<'a>(&self, html: &'a str) -> Cow<'a, str> {
        ATTR_RE.replace_all(html, |caps: &Captures| {
            let (url, quote) = match (caps.get(4), caps.get(5)) {
                (Some(m), _) => (m.as_str(), '"'),
                (_, Some(m)) => (m.as_str(), '\''),
                _ => return caps[0].to_string(),
            };
            let url = self.version_url(url).unwrap_or_else(|| url.to_string());
            format!("{}{}{}{quote}{url}{quote}", &caps[1], &caps[2], &caps[3])
        })
    }

    /// Versioned form of `url`, or `None` if it is left untouched.
    pub fn version_url(&self, url: &str) -> Option<String> {
        let trimmed = url.trim();
        if trimmed.is_empty()
            || trimmed.starts_with('#')
            || has_scheme(trimmed, "data")
            || has_scheme(trimmed, "javascript")
            || has_scheme(trimmed, "mailto")
        {
            return None;
        }

        let (before_fragment, fragment) = match url.split_once('#') {
            Some((b, f)) => (b, Some(f)),
            None => (url, None),
        };
        let (path, query) = match before_fragment.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (before_fragment, None),
        };

        let file = path.rsplit('/').next().unwrap_or(path);
        let ext = file.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase())?;
        if !self.to.contains(&ext) {
            return None;
        }

        if let Some(query) = query
            && query
                .split('&')
                .any(|pair| pair.split('=').next() == Some(self.key.as_str()))
        {
            return None;
        }

        let mut out = String::with_capacity(url.len() + self.key.len() + self.value.len() + 2);
        out.push_str(path);
        match query {
            Some(q) if !q.is_empty() => {
                out.push('?');
                out.push_str(q);
                out.push('&');
            }
            _ => out.push('?'),
        }
        out.push_str(&self.key);
        out.push('=');
        out.push_str(&self.value);
        if let Some(fragment) = fragment {
            out.push('#');
            out.push_str(fragment);
        }
        Some(out)
    }
}

fn has_scheme(url: &str, scheme: &str) -> bool {
    url.len() > scheme.len()
        && url.as_bytes()[scheme.len()] == b':'
        && url[..scheme.len()].eq_ignore_ascii_case(scheme)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn injector(value: &str) -> VersionInjector {
        let config = VersionConfig {
            value: value.into(),
            ..VersionConfig::default()
        };
        VersionInjector::new(&config, 1_718_461_845_123)
    }

    #[test]
    fn test_resolve_tokens() {
        assert_eq!(resolve_value("%TS%", 1_718_461_845_123), "1718461845123");
        assert_eq!(resolve_value("%DT%", 1_718_461_845_123), "20240615143045");
        assert_eq!(resolve_value("release-1", 5), "release-1");

        let mds = resolve_value("%MDS%", 1_718_461_845_123);
        assert_eq!(mds.len(), 32);
        assert!(mds.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(mds, resolve_value("%MDS%", 1_718_461_845_123));
        assert_ne!(mds, resolve_value("%MDS%", 1_718_461_845_124));
    }

    #[test]
    fn test_appends_query() {
        let v = injector("42");
        let html = r#"<link rel="stylesheet" href="styles.min.css"><script src='main.min.js'></script>"#;
        assert_eq!(
            v.apply(html),
            r#"<link rel="stylesheet" href="styles.min.css?v=42"><script src='main.min.js?v=42'></script>"#
        );
    }

    #[test]
    fn test_existing_query_and_fragment() {
        let v = injector("42");
        assert_eq!(
            v.version_url("/css/a.css?media=print#top").as_deref(),
            Some("/css/a.css?media=print&v=42#top")
        );
        assert_eq!(v.version_url("a.js?").as_deref(), Some("a.js?v=42"));
    }

    #[test]
    fn test_untouched_urls() {
        let v = injector("42");
        assert_eq!(v.version_url("about.html"), None);
        assert_eq!(v.version_url("a.css?v=1"), None);
        assert_eq!(v.version_url("data:image/png;base64,AAAA.png"), None);
        assert_eq!(v.version_url("#section"), None);
        assert_eq!(v.version_url("/images/"), None);

        let html = r#"<a href="about.html">About</a>"#;
        assert_eq!(v.apply(html), html);
    }

    #[test]
    fn test_case_insensitive_extension_and_attribute() {
        let v = injector("42");
        assert_eq!(
            v.apply(r#"<IMG SRC="Hero.PNG">"#),
            r#"<IMG SRC="Hero.PNG?v=42">"#
        );
    }

    #[test]
    fn test_data_attributes_ignored() {
        let v = injector("42");
        let html = r#"<div data-src="x.js"></div>"#;
        assert_eq!(v.apply(html), html);
    }
}
