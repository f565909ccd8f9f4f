//! Dashboard reports derived from the stored history.
//!
//! # Responsibility
//! - Hold the template catalog and breadcrumb navigation.
//! - Turn the nap-free history into one HTML page per template.
//!
//! # Invariants
//! - Report failures never affect the store.

pub mod aggregate;
#[cfg(feature = "charts")]
pub mod charts;
pub mod generator;
pub mod navigation;
pub mod page;
pub mod template;
