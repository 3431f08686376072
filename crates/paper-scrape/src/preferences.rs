//! Read-only preference access for sources and extensions.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Per-source preference entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScraperPreference {
    /// Whether the source may run.
    #[serde(default = "enabled_by_default")]
    pub enable: bool,

    /// Free-form source argument (e.g. `"use-dblp"`).
    #[serde(default)]
    pub args: Option<String>,
}

const fn enabled_by_default() -> bool {
    true
}

impl Default for ScraperPreference {
    fn default() -> Self {
        Self { enable: true, args: None }
    }
}

/// Source of preferences, keyed by source name or extension id.
pub trait PreferenceStore: Send + Sync {
    /// Preference for a source; unknown sources are enabled with no args.
    fn scraper(&self, name: &str) -> ScraperPreference;

    /// All stored preferences of an extension.
    fn extension(&self, _id: &str) -> Map<String, Value> {
        Map::new()
    }
}

/// In-memory preference store, loadable from JSON.
///
/// ```json
/// {
///   "scrapers": { "dblp": { "enable": true, "args": "use-dblp" } },
///   "extensions": { "my-ext": { "apiKey": "..." } }
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScraperPreferences {
    #[serde(default)]
    scrapers: HashMap<String, ScraperPreference>,

    #[serde(default)]
    extensions: HashMap<String, Map<String, Value>>,
}

impl ScraperPreferences {
    /// Empty store: every source enabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load preferences from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Builder-style source preference.
    #[must_use]
    pub fn with_scraper(mut self, name: impl Into<String>, pref: ScraperPreference) -> Self {
        self.scrapers.insert(name.into(), pref);
        self
    }

    /// Disable a source.
    #[must_use]
    pub fn disable(self, name: impl Into<String>) -> Self {
        self.with_scraper(name, ScraperPreference { enable: false, args: None })
    }

    /// Builder-style extension preferences.
    #[must_use]
    pub fn with_extension(mut self, id: impl Into<String>, prefs: Map<String, Value>) -> Self {
        self.extensions.insert(id.into(), prefs);
        self
    }
}

impl PreferenceStore for ScraperPreferences {
    fn scraper(&self, name: &str) -> ScraperPreference {
        self.scrapers.get(name).cloned().unwrap_or_default()
    }

    fn extension(&self, id: &str) -> Map<String, Value> {
        self.extensions.get(id).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_source_is_enabled() {
        let prefs = ScraperPreferences::new();
        assert!(prefs.scraper("dblp").enable);
        assert!(prefs.scraper("dblp").args.is_none());
    }

    #[test]
    fn test_parse_json_preferences() {
        let prefs: ScraperPreferences = serde_json::from_value(serde_json::json!({
            "scrapers": {
                "dblp": {"args": "use-dblp"},
                "doi": {"enable": false}
            },
            "extensions": {"ext": {"token": "abc"}}
        }))
        .unwrap();

        assert!(prefs.scraper("dblp").enable);
        assert_eq!(prefs.scraper("dblp").args.as_deref(), Some("use-dblp"));
        assert!(!prefs.scraper("doi").enable);
        assert_eq!(prefs.extension("ext")["token"], "abc");
        assert!(prefs.extension("missing").is_empty());
    }

    #[test]
    fn test_disable_builder() {
        let prefs = ScraperPreferences::new().disable("dblp");
        assert!(!prefs.scraper("dblp").enable);
    }
}
