// system-tests/tests/helpers/mod.rs
// ============================================================================
// Module: System Test Helpers
// Description: Shared helpers for Repweight system-tests.
// Purpose: Provide database fixtures for store suites.
// Dependencies: system-tests, repweight-store-postgres, testcontainers
// ============================================================================

//! ## Overview
//! Shared helpers for Repweight system-tests.

#![allow(dead_code, reason = "Shared helpers are reused across multiple test suites.")]

pub mod infra;
