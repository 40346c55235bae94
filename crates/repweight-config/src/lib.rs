// crates/repweight-config/src/lib.rs
// ============================================================================
// Module: Repweight Config Library
// Description: Canonical configuration model for Repweight hosts.
// Purpose: Single source of truth for config loading and validation.
// ============================================================================

//! ## Overview
//! `repweight-config` parses `repweight.toml`, applies `REPWEIGHT_DB_*`
//! environment overrides, and validates the result before any store is opened.

pub mod config;

pub use config::*;
