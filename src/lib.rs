//! Streaming generation sessions for content review.
//!
//! Build a [`GenerationConfiguration`](core::GenerationConfiguration) with
//! [`configure`](core::configure), drive a model through a
//! [`StreamingSession`](core::StreamingSession) and validate its answer with
//! [`clean`](core::clean).

pub mod core;
pub mod error;
pub mod providers;

// re-exports
pub use error::{Error, Result};
