//! # nutrilens core
//!
//! Shared, I/O-free logic for nutrilens: label text cleaning, the analysis
//! data model, schema validation of language-model output, record merging,
//! and the store abstraction.
//!
//! This crate contains no tokio, sqlx, or HTTP dependencies. Everything
//! here is deterministic and can be tested without network access.

pub mod clean;
pub mod merge;
pub mod models;
pub mod prompt;
pub mod schema;
pub mod store;
