//! Live-reload message protocol.
//!
//! JSON objects tagged by `type`, sent from the server to browser clients:
//!
//! | type          | fields          | client action                      |
//! |---------------|-----------------|------------------------------------|
//! | `connected`   | `version`       | none                               |
//! | `reload`      | `reason?`       | `location.reload()`                |
//! | `css`         | `href`          | re-fetch matching `<link>` only    |
//! | `error`       | `task`, `error` | show the error overlay             |
//! | `clear_error` |                 | hide the error overlay             |

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum HotReloadMessage {
    /// Connection established
    Connected { version: String },

    /// Full page reload
    Reload {
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },

    /// Stylesheet swap without reload
    Css {
        /// Server path of the stylesheet, e.g. `/styles.min.css`
        href: String,
    },

    /// Task failure (display overlay, no reload)
    Error { task: String, error: String },

    /// Clear error overlay (run succeeded after a failure)
    #[serde(rename = "clear_error")]
    ClearError,
}

impl HotReloadMessage {
    pub fn connected() -> Self {
        Self::Connected {
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn reload_with_reason(reason: impl Into<String>) -> Self {
        Self::Reload {
            reason: Some(reason.into()),
        }
    }

    pub fn css(href: impl Into<String>) -> Self {
        Self::Css { href: href.into() }
    }

    pub fn error(task: impl Into<String>, error: impl Into<String>) -> Self {
        Self::Error {
            task: task.into(),
            error: error.into(),
        }
    }

    pub fn clear_error() -> Self {
        Self::ClearError
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"type":"reload"}"#.to_string())
    }

    #[cfg(test)]
    pub fn from_json(s: &str) -> Option<Self> {
        serde_json::from_str(s).ok()
    }
}
