//! Conversions between the crate's request/event types and Gemini's wire format.

use crate::core::configuration::GenerationOptions;
use crate::core::history::Role;
use crate::core::language_model::{LanguageModelRequest, StreamEvent};
use crate::error::GenerationError;
use crate::providers::google::{
    GoogleContent, GoogleGenerationConfig, GooglePart, GoogleRequest, GoogleStreamResponse,
    GoogleSystemInstruction,
};

impl From<LanguageModelRequest> for GoogleRequest {
    fn from(request: LanguageModelRequest) -> Self {
        let contents = request
            .contents
            .into_iter()
            .map(|turn| GoogleContent {
                role: match turn.role() {
                    Role::User => "user".into(),
                    Role::Assistant => "model".into(), // Google uses "model" instead of "assistant"
                },
                parts: vec![GooglePart {
                    text: turn.content().to_string(),
                }],
            })
            .collect();

        let system_instruction = request
            .system_instruction
            .map(|text| GoogleSystemInstruction {
                parts: vec![GooglePart { text }],
            });

        let GenerationOptions {
            temperature,
            top_p,
            top_k,
            max_output_tokens,
            stop_sequences,
        } = request.options;

        let has_options = temperature.is_some()
            || top_p.is_some()
            || top_k.is_some()
            || max_output_tokens.is_some()
            || stop_sequences.is_some();

        let generation_config = if has_options || request.output_constraint.is_some() {
            let (response_mime_type, response_schema) = match request.output_constraint {
                Some(constraint) => (Some(constraint.mime_type), constraint.response_schema),
                None => (None, None),
            };
            Some(GoogleGenerationConfig {
                max_output_tokens,
                temperature,
                top_p,
                top_k,
                stop_sequences,
                response_mime_type,
                response_schema,
            })
        } else {
            None
        };

        GoogleRequest {
            contents,
            system_instruction,
            generation_config,
        }
    }
}

impl GoogleStreamResponse {
    /// The events carried by one payload: the first candidate's answer text
    /// as a single delta, then the end signal if it has a finish reason.
    pub(crate) fn into_events(self) -> Result<Vec<StreamEvent>, GenerationError> {
        let Some(candidate) = self.candidates.into_iter().next() else {
            if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
                return Err(GenerationError::transport(format!(
                    "prompt blocked: {reason}"
                )));
            }
            return Ok(Vec::new());
        };

        let text: String = candidate
            .content
            .map(|content| content.parts)
            .unwrap_or_default()
            .into_iter()
            .filter(|part| !part.thought)
            .filter_map(|part| part.text)
            .collect();

        let mut events = Vec::with_capacity(2);
        if !text.is_empty() {
            events.push(StreamEvent::Delta(text));
        }
        if let Some(finish_reason) = candidate.finish_reason {
            events.push(StreamEvent::End {
                finish_reason: Some(finish_reason),
            });
        }
        Ok(events)
    }
}
