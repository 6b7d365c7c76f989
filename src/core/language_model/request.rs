use serde::{Deserialize, Serialize};

use crate::core::configuration::{GenerationConfiguration, GenerationOptions, OutputConstraint};
use crate::core::history::Turn;

/// Everything sent to the model for one generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageModelRequest {
    /// The model to call.
    pub model: String,

    /// System prompt to be used for the request.
    pub system_instruction: Option<String>,

    /// The full conversation so far, ending with the new user turn.
    pub contents: Vec<Turn>,

    /// Structured-output hint, present when the configuration has a schema.
    pub output_constraint: Option<OutputConstraint>,

    pub options: GenerationOptions,
}

impl LanguageModelRequest {
    pub fn new(configuration: &GenerationConfiguration, contents: Vec<Turn>) -> Self {
        Self {
            model: configuration.model().to_string(),
            system_instruction: configuration.system_instruction().map(str::to_string),
            contents,
            output_constraint: configuration.output_constraint().cloned(),
            options: configuration.options().clone(),
        }
    }
}
