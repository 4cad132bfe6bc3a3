//! wq-core: stable foundation for the waterqual engine.
//!
//! Contains:
//! - numeric (Real + tolerances + float helpers)
//! - ids (stable compact IDs for network/model objects)
//! - error (shared error types)
//! - options (global water-quality solver options)

pub mod error;
pub mod ids;
pub mod numeric;
pub mod options;

// Re-exports: nice ergonomics for downstream crates
pub use error::{WqError, WqResult};
pub use ids::*;
pub use numeric::*;
pub use options::*;
