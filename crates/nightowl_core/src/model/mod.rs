//! Domain model for stored sleep sessions.
//!
//! # Responsibility
//! - Define the canonical record shared by ingestion, storage and reports.
//! - Own the nap classification rule and the dedup key.
//!
//! # Invariants
//! - Every record carries a calendar `date`.
//! - Numeric metrics are optional; absence is never encoded as zero.

pub mod sleep;
