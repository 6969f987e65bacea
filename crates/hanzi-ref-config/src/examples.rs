// crates/hanzi-ref-config/src/examples.rs
// ============================================================================
// Module: Config Examples
// Description: Example configuration payloads.
// Purpose: Deterministic examples for docs and tooling.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Example `hanzi-ref.toml` configuration. Output is deterministic and
//! spells out every default.

/// Returns an example `hanzi-ref.toml` configuration.
#[must_use]
pub fn config_toml_example() -> String {
    String::from(
        r#"[storage]
path = "main.db"
busy_timeout_ms = 5000
journal_mode = "wal"
sync_mode = "full"

[cache]
enabled = true
snapshot_path = "reference-cache.json"

[router]
queue_capacity = 1024
"#,
    )
}
