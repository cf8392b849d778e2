//! Database module: row mapping and SQL repositories.
//!
//! - `model`: maps SQLite rows into domain records.
//! - `repo`: SQL-only functions for favorites and settings.
//!
//! Callers import from `hnfeed::db`; the repository API is re-exported here.

pub mod model;
pub mod repo;

pub use repo::*;
