use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::logging::LoggingConfig;

/// The typed view of a configuration generation, matching §3's Data Model
/// and §6's recognized top-level keys. `admin`, `storage`, and the values
/// of `apps` stay as deferred-decoding `serde_json::Value` blobs — they are
/// instantiated on demand by `ignis-loader`, not eagerly typed here.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub admin: Option<serde_json::Value>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub storage: Option<serde_json::Value>,
    #[serde(default)]
    pub apps: BTreeMap<String, serde_json::Value>,
}

impl Default for Config {
    fn default() -> Self {
        Self { admin: None, logging: LoggingConfig::default(), storage: None, apps: BTreeMap::new() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_top_level_key_is_rejected() {
        let raw = serde_json::json!({"apps": {}, "bogus": 1});
        let err = serde_json::from_value::<Config>(raw);
        assert!(err.is_err());
    }

    #[test]
    fn missing_keys_all_default() {
        let cfg: Config = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(cfg.admin.is_none());
        assert!(cfg.apps.is_empty());
        assert!(cfg.logging.logs.is_empty());
    }
}
