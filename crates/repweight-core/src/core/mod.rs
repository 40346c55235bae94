// crates/repweight-core/src/core/mod.rs
// ============================================================================
// Module: Repweight Core Types
// Description: Key, account, and time model for Repweight.
// Purpose: Group the value types shared by stores, config, and the CLI.
// Dependencies: crate::core::{account, key, time}
// ============================================================================

//! ## Overview
//! Core types are plain values: they never touch storage or the network.
//! Validation happens at construction so every [`PublicKey`] in the system is
//! exactly 32 bytes.

pub mod account;
pub mod key;
pub mod time;

pub use account::AccountRecord;
pub use account::AmountView;
pub use account::PersistenceState;
pub use key::KeyError;
pub use key::PUBLIC_KEY_LEN;
pub use key::PublicKey;
pub use key::decode_key;
pub use key::encode_key;
pub use time::Timestamp;
