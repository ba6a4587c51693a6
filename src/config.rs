//! Runtime configuration
//!
//! [`EngineConfig`] carries the knobs of the transfer orchestrator;
//! [`LogConfig`] the subscriber settings chosen on the command line.
//! Batch sizing lives with the async pipeline in
//! [`BatchConfig`](crate::strategy::BatchConfig).

use crate::types::Region;

/// Transfer orchestrator settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Region used for fee resolution when a request names none
    pub default_region: Region,
    /// Whether committed transfers are announced to the notifier
    pub notifications_enabled: bool,
    /// Value written to `metadata.source` of every transaction record
    pub source: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_region: Region::global(),
            notifications_enabled: true,
            source: "wallet_transfer".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn with_region(mut self, region: Region) -> Self {
        self.default_region = region;
        self
    }

    pub fn with_notifications(mut self, enabled: bool) -> Self {
        self.notifications_enabled = enabled;
        self
    }
}

/// Log subscriber settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,
    /// Emit JSON lines instead of human-readable text
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.default_region, Region::global());
        assert!(config.notifications_enabled);
        assert_eq!(config.source, "wallet_transfer");
    }

    #[test]
    fn test_engine_config_builders() {
        let config = EngineConfig::default()
            .with_region(Region::new("eu"))
            .with_notifications(false);
        assert_eq!(config.default_region.as_str(), "EU");
        assert!(!config.notifications_enabled);
    }
}
