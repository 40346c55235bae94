// crates/repweight-core/src/runtime/migration.rs
// ============================================================================
// Module: Repweight Migration Planner
// Description: Versioned schema scripts, checksums, and pending-set planning.
// Purpose: Give every relational backend identical apply-once semantics.
// Dependencies: sha2, thiserror
// ============================================================================

//! ## Overview
//! Backends ship an ordered list of [`Migration`] scripts and record each
//! applied script in a history table. [`plan_migrations`] compares the two and
//! returns the scripts still to apply. It fails closed when history
//! references a script this build does not know or when an applied script has
//! been edited since it ran. Applying is the backend's job; planning is pure.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

use crate::core::Timestamp;
use crate::core::key::hex_encode;

// ============================================================================
// SECTION: Migration Types
// ============================================================================

/// Versioned schema script.
///
/// # Invariants
/// - `version` is 1-based and unique within a backend's script list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Migration {
    /// Script version.
    pub version: u32,
    /// Short human description recorded in history.
    pub description: &'static str,
    /// SQL executed as a single batch.
    pub sql: &'static str,
}

impl Migration {
    /// Creates a migration script descriptor.
    #[must_use]
    pub const fn new(version: u32, description: &'static str, sql: &'static str) -> Self {
        Self {
            version,
            description,
            sql,
        }
    }

    /// Returns the lowercase hex SHA-256 of the script text.
    #[must_use]
    pub fn checksum(&self) -> String {
        hex_encode(&Sha256::digest(self.sql.as_bytes()))
    }
}

/// History row for an applied migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMigration {
    /// Script version.
    pub version: u32,
    /// Description recorded at apply time.
    pub description: String,
    /// Script checksum recorded at apply time.
    pub checksum: String,
    /// Apply time.
    pub applied_at: Timestamp,
}

/// Outcome of a migration run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Versions applied by this run, ascending.
    pub applied: Vec<u32>,
    /// Highest applied version after the run.
    pub current_version: Option<u32>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Migration errors.
///
/// # Invariants
/// - Every variant aborts startup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MigrationError {
    /// Storage could not be reached.
    #[error("migration storage unavailable: {0}")]
    Unavailable(String),
    /// Script list is not strictly increasing from version 1.
    #[error("invalid migration plan: {0}")]
    InvalidPlan(String),
    /// History references a version with no matching script.
    #[error("applied migration version {0} is unknown to this build")]
    UnknownVersion(u32),
    /// Applied script text no longer matches its recorded checksum.
    #[error("migration version {version} checksum mismatch: recorded {recorded}, found {found}")]
    ChecksumMismatch {
        /// Script version.
        version: u32,
        /// Checksum stored in history.
        recorded: String,
        /// Checksum of the bundled script.
        found: String,
    },
    /// Script execution failed.
    #[error("migration version {version} failed: {message}")]
    Failed {
        /// Script version.
        version: u32,
        /// Engine error message.
        message: String,
    },
}

// ============================================================================
// SECTION: Planning
// ============================================================================

/// Returns the scripts from `available` that are not yet applied, ascending.
///
/// # Errors
///
/// Returns [`MigrationError`] when the script list is malformed, history
/// references an unknown version, or an applied script changed.
pub fn plan_migrations<'a>(
    available: &'a [Migration],
    applied: &[AppliedMigration],
) -> Result<Vec<&'a Migration>, MigrationError> {
    let mut expected = 1_u32;
    for migration in available {
        if migration.version != expected {
            return Err(MigrationError::InvalidPlan(format!(
                "expected version {expected}, found {}",
                migration.version
            )));
        }
        expected = expected.saturating_add(1);
    }
    let by_version: BTreeMap<u32, &Migration> =
        available.iter().map(|migration| (migration.version, migration)).collect();
    for record in applied {
        let Some(migration) = by_version.get(&record.version) else {
            return Err(MigrationError::UnknownVersion(record.version));
        };
        let found = migration.checksum();
        if found != record.checksum {
            return Err(MigrationError::ChecksumMismatch {
                version: record.version,
                recorded: record.checksum.clone(),
                found,
            });
        }
    }
    Ok(available
        .iter()
        .filter(|migration| !applied.iter().any(|record| record.version == migration.version))
        .collect())
}
