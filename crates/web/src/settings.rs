//! Dispatcher configuration.
//!
//! Settings are plain data, deserializable with serde. Every missing field
//! falls back to its default, so a partial document such as
//! `{"debug": true}` is a complete configuration.

use serde::Deserialize;

use crate::view::DEFAULT_DB_ALIAS;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Include error details in 500 responses.
    pub debug: bool,
    /// Middleware names, outermost first.
    pub middleware: Vec<String>,
    pub databases: Vec<DatabaseSettings>,
    /// Charset announced by responses the dispatcher builds itself.
    pub default_charset: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: false,
            middleware: Vec::new(),
            databases: vec![DatabaseSettings::new(DEFAULT_DB_ALIAS)],
            default_charset: "utf-8".to_string(),
        }
    }
}

impl Settings {
    pub fn database(&self, alias: &str) -> Option<&DatabaseSettings> {
        self.databases.iter().find(|database| database.alias == alias)
    }

    pub fn database_mut(&mut self, alias: &str) -> Option<&mut DatabaseSettings> {
        self.databases.iter_mut().find(|database| database.alias == alias)
    }

    /// Whether requests run inside a transaction on `alias`.
    pub fn atomic_requests(&self, alias: &str) -> bool {
        self.database(alias).is_some_and(|database| database.atomic_requests)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseSettings {
    pub alias: String,
    #[serde(default)]
    pub atomic_requests: bool,
}

impl DatabaseSettings {
    pub fn new(alias: impl Into<String>) -> Self {
        Self { alias: alias.into(), atomic_requests: false }
    }

    pub fn atomic(alias: impl Into<String>) -> Self {
        Self { alias: alias.into(), atomic_requests: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    #[test]
    fn defaults() {
        let settings = Settings::default();

        assert!(!settings.debug);
        assert!(settings.middleware.is_empty());
        assert_eq!(settings.default_charset, "utf-8");
        assert_eq!(settings.database(DEFAULT_DB_ALIAS), Some(&DatabaseSettings::new(DEFAULT_DB_ALIAS)));
        assert!(!settings.atomic_requests(DEFAULT_DB_ALIAS));
    }

    #[test]
    fn deserialize_full_document() {
        let json = indoc! {r#"
            {
                "debug": true,
                "middleware": ["common", "security"],
                "databases": [
                    {"alias": "default", "atomic_requests": true},
                    {"alias": "replica"}
                ]
            }
        "#};

        let settings: Settings = serde_json::from_str(json).unwrap();

        assert!(settings.debug);
        assert_eq!(settings.middleware, ["common", "security"]);
        assert!(settings.atomic_requests("default"));
        assert!(!settings.atomic_requests("replica"));
        assert!(!settings.atomic_requests("missing"));
        assert_eq!(settings.default_charset, "utf-8");
    }

    #[test]
    fn partial_document_keeps_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"debug": true}"#).unwrap();

        assert_eq!(settings, Settings { debug: true, ..Settings::default() });
    }

    #[test]
    fn middleware_must_be_a_list() {
        let result = serde_json::from_str::<Settings>(r#"{"middleware": 42}"#);
        assert!(result.is_err());
    }

    #[test]
    fn toggle_atomic_requests() {
        let mut settings = Settings::default();
        settings.database_mut(DEFAULT_DB_ALIAS).unwrap().atomic_requests = true;

        assert!(settings.atomic_requests(DEFAULT_DB_ALIAS));
    }
}
