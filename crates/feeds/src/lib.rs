//! Upstream pool listing and pair-detail clients.
//!
//! - `rest` - `PoolClient` for the listing and pair-detail REST APIs
//! - `error` - `FeedError`

pub mod error;
pub mod rest;

pub use error::*;
pub use rest::*;
