//! Concrete [`LanguageModel`](crate::core::LanguageModel) implementations.

#[cfg(feature = "google")]
pub mod google;
