//! md-core: stable foundation for mdflow.
//!
//! Contains:
//! - numeric (Real + tolerances + float helpers)
//! - error (shared error types)
//! - timing (opt-in instrumentation of the step pipeline)

pub mod error;
pub mod numeric;
pub mod timing;

// Re-exports: nice ergonomics for downstream crates
pub use error::{MdError, MdResult};
pub use numeric::*;
