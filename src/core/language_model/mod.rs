//! Defines the `LanguageModel` trait: the chunked-response generation call a
//! [`StreamingSession`](crate::core::StreamingSession) drives.
//!
//! Implementors connect to a concrete model endpoint and turn its streaming
//! wire format into an ordered sequence of [`StreamEvent`]s terminated by an
//! explicit [`StreamEvent::End`] or an error.

pub mod request;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::GenerationError;

pub use request::LanguageModelRequest;

// ============================================================================
// Section: traits
// ============================================================================

/// The collaborator contract for streaming generation.
#[async_trait]
pub trait LanguageModel: Send + Sync + std::fmt::Debug {
    /// A short name for logs, e.g. `google-generative-ai`.
    fn provider_name(&self) -> &str;

    /// Opens a streaming generation for `request`.
    ///
    /// # Errors
    ///
    /// Returns a [`GenerationError`] if the stream cannot be opened. Failures
    /// after opening are yielded as items of the stream.
    async fn stream(&self, request: LanguageModelRequest) -> Result<ChunkStream, GenerationError>;
}

// ============================================================================
// Section: stream types
// ============================================================================

/// One item of a generation stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// An incremental piece of text. Boundaries carry no meaning.
    Delta(String),
    /// The explicit end-of-stream signal. Nothing may follow it.
    End { finish_reason: Option<String> },
}

impl StreamEvent {
    pub fn delta(text: impl Into<String>) -> Self {
        StreamEvent::Delta(text.into())
    }
}

/// The ordered sequence of events of one generation call.
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, GenerationError>> + Send>>;
