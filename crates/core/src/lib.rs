//! Core data types for the pool watch bot.

pub mod pool;
pub mod settings;

pub use pool::*;
pub use settings::*;
