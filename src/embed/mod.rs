//! Embedded static resources for the development server.
//!
//! `hotreload.js` is minified at build time with the error-overlay
//! stylesheet inlined (see `build.rs`); the WebSocket port is filled in
//! per request because it is only known once the listener is bound.

mod template;

pub use template::{Template, TemplateVars};

pub mod serve {
    use super::{Template, TemplateVars};

    /// Server path of the live-reload client.
    pub const HOTRELOAD_URL: &str = "/__sluice/hotreload.js";

    /// Variables for hotreload.js.
    pub struct HotreloadVars {
        pub ws_port: u16,
    }

    impl TemplateVars for HotreloadVars {
        fn apply(&self, content: &str) -> String {
            content.replace("__SLUICE_WS_PORT__", &self.ws_port.to_string())
        }
    }

    /// Live-reload client with WebSocket port injection.
    pub const HOTRELOAD_JS: Template<HotreloadVars> =
        Template::new(include_str!(concat!(env!("OUT_DIR"), "/hotreload.min.js")));

    /// `<script>` tag injected into served HTML.
    pub fn hotreload_tag() -> String {
        format!(r#"<script src="{HOTRELOAD_URL}" defer></script>"#)
    }

    /// Page shown while the initial build runs.
    pub const LOADING_HTML: &str = include_str!("serve/loading.html");
}
