//! Run orchestration services.
//!
//! # Responsibility
//! - Sequence normalization, storage and reporting into one run.
//! - Keep the CLI decoupled from store and report details.

pub mod sync_service;
