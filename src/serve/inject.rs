//! Live-reload script injection into served HTML.

use crate::embed::serve::hotreload_tag;

/// Inject the live-reload script if the body is HTML.
pub fn maybe_inject_hotreload(body: Vec<u8>, content_type: &str, enabled: bool) -> Vec<u8> {
    if enabled && content_type.starts_with("text/html") {
        inject_hotreload_script(&body)
    } else {
        body
    }
}

/// Inject the script before the last `</body>` tag, or append it.
fn inject_hotreload_script(content: &[u8]) -> Vec<u8> {
    const PATTERN: &[u8] = b"</body>";

    let script = hotreload_tag();
    let script = script.as_bytes();
    let pos = content
        .windows(PATTERN.len())
        .rposition(|w| w.eq_ignore_ascii_case(PATTERN))
        .unwrap_or(content.len());

    let mut result = Vec::with_capacity(content.len() + script.len());
    result.extend_from_slice(&content[..pos]);
    result.extend_from_slice(script);
    result.extend_from_slice(&content[pos..]);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::mime::types::{CSS, HTML};

    #[test]
    fn test_injects_before_last_body() {
        let html = b"<html><body><p>&lt;/body&gt;</p></BODY></html>".to_vec();
        let out = String::from_utf8(maybe_inject_hotreload(html, HTML, true)).unwrap();
        assert!(out.ends_with(&format!("{}</BODY></html>", hotreload_tag())));
    }

    #[test]
    fn test_appends_without_body() {
        let out = maybe_inject_hotreload(b"<p>fragment</p>".to_vec(), HTML, true);
        assert!(String::from_utf8(out).unwrap().ends_with("</script>"));
    }

    #[test]
    fn test_leaves_other_content_alone() {
        let css = b"body{color:red}".to_vec();
        assert_eq!(maybe_inject_hotreload(css.clone(), CSS, true), css);
        let html = b"<body></body>".to_vec();
        assert_eq!(maybe_inject_hotreload(html.clone(), HTML, false), html);
    }
}
