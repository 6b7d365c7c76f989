//! This module provides the Google Generative AI provider, which implements
//! the `LanguageModel` trait over Gemini's `streamGenerateContent` endpoint.

pub mod conversions;
pub mod settings;
pub(crate) mod stream;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::language_model::{ChunkStream, LanguageModel, LanguageModelRequest};
use crate::error::{ConfigurationError, GenerationError};
use crate::providers::google::settings::{
    GoogleGenerativeAISettings, GoogleGenerativeAISettingsBuilder,
};

/// The GoogleGenerativeAI provider (ai.google.dev).
#[derive(Debug)]
pub struct GoogleGenerativeAI {
    client: Client,
    settings: GoogleGenerativeAISettings,
}

// Request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GoogleRequest {
    pub(crate) contents: Vec<GoogleContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) system_instruction: Option<GoogleSystemInstruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) generation_config: Option<GoogleGenerationConfig>,
}

#[derive(Debug, Serialize)]
pub(crate) struct GoogleContent {
    pub(crate) role: String,
    pub(crate) parts: Vec<GooglePart>,
}

#[derive(Debug, Serialize)]
pub(crate) struct GooglePart {
    pub(crate) text: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct GoogleSystemInstruction {
    pub(crate) parts: Vec<GooglePart>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GoogleGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) top_k: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) stop_sequences: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) response_schema: Option<Value>,
}

// One `data:` payload of the SSE stream
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GoogleStreamResponse {
    #[serde(default)]
    pub(crate) candidates: Vec<GoogleCandidate>,
    pub(crate) prompt_feedback: Option<GooglePromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GoogleCandidate {
    pub(crate) content: Option<GoogleResponseContent>,
    pub(crate) finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GoogleResponseContent {
    #[serde(default)]
    pub(crate) parts: Vec<GoogleResponsePart>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GoogleResponsePart {
    pub(crate) text: Option<String>,
    /// Set on thinking-mode summaries, which are not part of the answer.
    #[serde(default)]
    pub(crate) thought: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GooglePromptFeedback {
    pub(crate) block_reason: Option<String>,
}

impl GoogleGenerativeAI {
    /// Creates a provider with the API key from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::MissingApiKey`] when neither
    /// `GEMINI_API_KEY` nor `GOOGLE_API_KEY` is set.
    pub fn from_env() -> Result<Self, ConfigurationError> {
        GoogleGenerativeAISettingsBuilder::default().build()
    }

    /// GoogleGenerativeAI provider setting builder.
    pub fn builder() -> GoogleGenerativeAISettingsBuilder {
        GoogleGenerativeAISettings::builder()
    }

    pub fn settings(&self) -> &GoogleGenerativeAISettings {
        &self.settings
    }
}

#[async_trait]
impl LanguageModel for GoogleGenerativeAI {
    fn provider_name(&self) -> &str {
        &self.settings.provider_name
    }

    async fn stream(&self, request: LanguageModelRequest) -> Result<ChunkStream, GenerationError> {
        let url = self.settings.stream_url(&request.model);
        let body: GoogleRequest = request.into();

        log::debug!("POST {url}");
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.settings.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::transport(format!(
                "{} returned {status}: {}",
                self.settings.provider_name,
                body.trim()
            )));
        }

        Ok(stream::chunk_stream(response.bytes_stream()))
    }
}
