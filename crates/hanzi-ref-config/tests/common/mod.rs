// crates/hanzi-ref-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config validation tests.
// Purpose: Reduce duplication across integration tests for hanzi-ref-config.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use hanzi_ref_config::HanziRefConfig;

/// Parses a TOML string into a `HanziRefConfig` without validation.
pub fn config_from_toml(toml_str: &str) -> Result<HanziRefConfig, toml::de::Error> {
    toml::from_str(toml_str)
}

/// Returns a minimal config with all defaults applied.
pub fn minimal_config() -> Result<HanziRefConfig, toml::de::Error> {
    config_from_toml("")
}

/// Writes `contents` to `name` inside `dir` and returns the path.
pub fn write_config(dir: &Path, name: &str, contents: &[u8]) -> Result<PathBuf, String> {
    let path = dir.join(name);
    fs::write(&path, contents).map_err(|err| err.to_string())?;
    Ok(path)
}
