// crates/hanzi-ref-config/src/lib.rs
// ============================================================================
// Module: Hanzi Reference Config Library
// Description: Config model, validation, and example generation.
// Purpose: Single source of truth for hanzi-ref.toml semantics.
// Dependencies: hanzi-ref-core, hanzi-ref-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `hanzi-ref-config` defines the configuration model for the hanzi
//! reference store. It validates limits before any store is opened and
//! converts the file model into backend and router settings.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod examples;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use examples::config_toml_example;
