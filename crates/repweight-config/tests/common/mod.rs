// crates/repweight-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config validation tests.
// Purpose: Reduce duplication across integration tests for repweight-config.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use std::collections::HashMap;

use repweight_config::ConfigError;
use repweight_config::RepweightConfig;

/// Parses a TOML string into a `RepweightConfig` for tests.
pub fn config_from_toml(toml_str: &str) -> Result<RepweightConfig, ConfigError> {
    RepweightConfig::from_toml(toml_str)
}

/// Returns a minimal config with all defaults applied.
pub fn minimal_config() -> Result<RepweightConfig, ConfigError> {
    config_from_toml("")
}

/// Builds an environment lookup over fixed pairs.
pub fn env_lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> =
        pairs.iter().map(|(key, value)| ((*key).to_string(), (*value).to_string())).collect();
    move |name: &str| map.get(name).cloned()
}

/// Asserts that `result` failed with a message containing `needle`.
pub fn assert_invalid(result: Result<(), ConfigError>, needle: &str) -> Result<(), String> {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(()) => Err("expected invalid config".to_string()),
    }
}
