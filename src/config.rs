//! Engine configuration.
//!
//! Every field has a default, so hosts only override what they need:
//!
//! ```
//! use editable_regions::config::EngineConfig;
//!
//! let config = EngineConfig::from_json(r#"{ "stack_lines": 3 }"#).unwrap();
//! assert_eq!(config.stack_lines, 3);
//! assert_eq!(config.retry.attempts, 20);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Bounded retry window for renderer lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 20,
            delay_ms: 200,
        }
    }
}

impl RetryPolicy {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub retry: RetryPolicy,
    /// Classes added by the editing widget; never removed by reconciliation.
    pub transient_class_prefixes: Vec<String>,
    /// Attributes added by the editing widget; never removed by reconciliation.
    pub transient_attributes: Vec<String>,
    /// Class applied to a region showing a diagnostic.
    pub errored_class: String,
    /// Maximum stack lines shown on a diagnostic card.
    pub stack_lines: usize,
    /// Tags stripped from renderer output.
    pub stripped_tags: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            transient_class_prefixes: vec!["ProseMirror".into(), "editing".into()],
            transient_attributes: vec!["contenteditable".into()],
            errored_class: "errored".into(),
            stack_lines: 5,
            stripped_tags: vec!["noscript".into()],
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn is_transient_class(&self, class: &str) -> bool {
        self.transient_class_prefixes
            .iter()
            .any(|prefix| class.starts_with(prefix.as_str()))
    }

    pub fn is_transient_attribute(&self, name: &str) -> bool {
        self.transient_attributes.iter().any(|attr| attr == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.retry.delay(), Duration::from_millis(200));
        assert!(config.is_transient_class("ProseMirror-focused"));
        assert!(config.is_transient_class("editing"));
        assert!(!config.is_transient_class("card"));
        assert!(config.is_transient_attribute("contenteditable"));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EngineConfig::from_json(r#"{"retry": {"attempts": 2}}"#).unwrap();
        assert_eq!(config.retry.attempts, 2);
        assert_eq!(config.retry.delay_ms, 200);
        assert_eq!(config.errored_class, "errored");
    }
}
