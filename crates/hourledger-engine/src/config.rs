use hourledger_model::{LedgerError, MilestoneCatalog, Result};
use hourledger_storage::StorageConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for [`HoursService`](crate::HoursService)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub storage: StorageConfig,
    /// Threshold tables, per activity name with a default
    pub milestones: MilestoneCatalog,
    /// Fill the write-once accolade cache when accolades are viewed
    pub cache_accolades: bool,
}

impl EngineConfig {
    pub fn from_json_str(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| LedgerError::validation(format!("config: {e}")))
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_uses_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.storage.lock_timeout_ms, 2_000);
        assert_eq!(config.milestones.milestones_for("anything").milestones().len(), 3);
    }

    #[test]
    fn per_activity_tables_are_parsed() {
        let config = EngineConfig::from_json_str(
            r#"{
                "cache_accolades": true,
                "storage": { "data_dir": "/tmp/ledger", "lock_timeout_ms": 50 },
                "milestones": {
                    "per_activity": {
                        "help_desk": [
                            { "threshold": 5, "label": "Desk Regular" },
                            { "threshold": 20, "label": "Desk Veteran" }
                        ]
                    }
                }
            }"#,
        )
        .unwrap();
        assert!(config.cache_accolades);
        assert_eq!(config.storage.lock_timeout_ms, 50);
        assert_eq!(config.storage.wal_file, "hourledger.wal");
        assert_eq!(
            config.milestones.milestones_for("help_desk").resolve(7),
            "Desk Regular"
        );
        assert_eq!(
            config.milestones.milestones_for("volunteering").resolve(10),
            "10 Hour Milestone"
        );
    }

    #[test]
    fn unordered_thresholds_fail_to_load() {
        let err = EngineConfig::from_json_str(
            r#"{ "milestones": { "default": [
                { "threshold": 9, "label": "b" },
                { "threshold": 3, "label": "a" }
            ] } }"#,
        );
        assert!(matches!(err, Err(LedgerError::Validation(_))));
    }
}
