//! Database module.
//!
//! Provides the SQLite attempt ledger (with embedded migrations) and
//! read-only access to the metrics store.

mod metrics;
mod models;
mod store;

pub use metrics::*;
pub use models::*;
pub use store::*;
