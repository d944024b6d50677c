//! Name normalization shared by every lookup and insert path.
//!
//! # Responsibility
//! - Repair encoding corruption in raw names.
//! - Produce the normalized key that decides entity identity.
//!
//! # Invariants
//! - There is exactly one corruption-repair table and one alias table per run.

pub mod mojibake;
pub mod name_key;
