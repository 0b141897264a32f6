//! Pool filter and diff engine.
//!
//! Applies per-user thresholds to a pool listing and works out which pools
//! have not been seen in that user's previous snapshot.

pub mod filter;
pub mod snapshot;

pub use filter::*;
pub use snapshot::*;
