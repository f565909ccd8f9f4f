//! Durable sleep history storage.
//!
//! # Responsibility
//! - Merge incoming sessions into the stored history without I/O (`merge`).
//! - Persist the history as CSV behind the `SleepStore` contract.
//!
//! # Invariants
//! - Stored records are unique per `DedupKey` and sorted by it.
//! - A malformed file fails the whole load; partial data is never returned.

pub mod merge;
pub mod sleep_store;
