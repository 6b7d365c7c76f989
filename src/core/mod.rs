//! Core functionality: configuration, conversation history, the streaming
//! session and the response cleaner.

pub mod cleaner;
pub mod configuration;
pub mod history;
pub mod language_model;
pub mod review;
pub mod schema;
pub mod session;
#[cfg(any(test, feature = "test-access"))]
pub mod testing;

pub use cleaner::{CleanedResult, clean};
pub use configuration::{
    DEFAULT_MODEL, GenerationConfiguration, GenerationConfigurationBuilder, GenerationOptions,
    GenerationOptionsBuilder, JSON_MIME_TYPE, OutputConstraint, configure,
};
pub use history::{ConversationHistory, HistoryBuilder, Role, Turn};
pub use language_model::{ChunkStream, LanguageModel, LanguageModelRequest, StreamEvent};
pub use review::Reviewer;
pub use schema::{FieldDescriptor, SchemaDescriptor};
pub use session::StreamingSession;
