//! One-call review: send a piece of content to the model and clean the answer.

use schemars::JsonSchema;

use crate::core::cleaner::CleanedResult;
use crate::core::configuration::GenerationConfiguration;
use crate::core::history::ConversationHistory;
use crate::core::language_model::LanguageModel;
use crate::core::schema::SchemaDescriptor;
use crate::core::session::StreamingSession;
use crate::error::{ConfigurationError, Result};

/// Reviews content with a fixed system instruction and optional schema.
///
/// Every review starts from an empty history, so reviews never see each other.
#[derive(Debug)]
pub struct Reviewer<M: LanguageModel> {
    session: StreamingSession<M>,
}

impl<M: LanguageModel> Reviewer<M> {
    /// Creates a reviewer calling the configured default model.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] if `schema` is structurally invalid.
    pub fn new(
        model: M,
        system_instruction: impl Into<String>,
        schema: Option<SchemaDescriptor>,
    ) -> std::result::Result<Self, ConfigurationError> {
        let mut builder = GenerationConfiguration::builder().system_instruction(system_instruction);
        if let Some(schema) = schema {
            builder = builder.schema(schema);
        }
        Ok(Self::with_configuration(model, builder.build()?))
    }

    /// Creates a reviewer whose answers must deserialize into `T`.
    pub fn for_type<T: JsonSchema>(
        model: M,
        system_instruction: impl Into<String>,
    ) -> std::result::Result<Self, ConfigurationError> {
        Self::new(model, system_instruction, Some(SchemaDescriptor::for_type::<T>()?))
    }

    pub fn with_configuration(model: M, configuration: GenerationConfiguration) -> Self {
        Self {
            session: StreamingSession::new(model, configuration),
        }
    }

    pub fn session(&self) -> &StreamingSession<M> {
        &self.session
    }

    /// Reviews `content`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Generation`](crate::Error::Generation) if the model
    /// call fails and [`Error::Clean`](crate::Error::Clean) if the answer does
    /// not satisfy the schema.
    pub async fn review(&self, content: impl Into<String>) -> Result<CleanedResult> {
        self.review_with_callback(content, |chunk| {
            log::trace!("review chunk: {chunk}");
        })
        .await
    }

    /// Like [`review`](Self::review), handing every chunk to `on_chunk`.
    pub async fn review_with_callback<F>(
        &self,
        content: impl Into<String>,
        on_chunk: F,
    ) -> Result<CleanedResult>
    where
        F: FnMut(&str) + Send,
    {
        let mut history = ConversationHistory::new();
        self.session
            .generate_and_clean_with_callback(&mut history, content, on_chunk)
            .await
    }
}
