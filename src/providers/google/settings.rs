//! Defines the settings for the Google Generative AI provider.

use std::fmt;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::providers::google::GoogleGenerativeAI;

/// Public Gemini API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub const DEFAULT_API_VERSION: &str = "v1beta";

pub const DEFAULT_PROVIDER_NAME: &str = "google-generative-ai";

/// Environment variables searched for the API key, in order.
pub const API_KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY", "GOOGLE_API_KEY"];

/// Settings for the GoogleGenerativeAI provider.
#[derive(Clone, Serialize, Deserialize)]
pub struct GoogleGenerativeAISettings {
    /// The API key for the Gemini API.
    #[serde(skip_serializing)]
    pub api_key: String,
    /// Scheme and host, without a trailing slash.
    pub base_url: String,
    pub api_version: String,
    /// The name of the provider.
    pub provider_name: String,
}

impl GoogleGenerativeAISettings {
    /// Creates a new builder for `GoogleGenerativeAISettings`.
    pub fn builder() -> GoogleGenerativeAISettingsBuilder {
        GoogleGenerativeAISettingsBuilder::default()
    }

    /// The streaming endpoint for `model`.
    pub fn stream_url(&self, model: &str) -> String {
        format!(
            "{}/{}/models/{}:streamGenerateContent?alt=sse",
            self.base_url.trim_end_matches('/'),
            self.api_version,
            model.trim_start_matches("models/")
        )
    }
}

impl fmt::Debug for GoogleGenerativeAISettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoogleGenerativeAISettings")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("api_version", &self.api_version)
            .field("provider_name", &self.provider_name)
            .finish()
    }
}

pub struct GoogleGenerativeAISettingsBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    api_version: Option<String>,
    provider_name: Option<String>,
}

impl GoogleGenerativeAISettingsBuilder {
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = Some(api_version.into());
        self
    }

    pub fn provider_name(mut self, provider_name: impl Into<String>) -> Self {
        self.provider_name = Some(provider_name.into());
        self
    }

    /// Builds the provider.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::MissingApiKey`] if no key was given and
    /// none of [`API_KEY_ENV_VARS`] is set.
    pub fn build(self) -> Result<GoogleGenerativeAI, ConfigurationError> {
        let api_key = self
            .api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ConfigurationError::MissingApiKey(API_KEY_ENV_VARS.join(" or ")))?;

        let settings = GoogleGenerativeAISettings {
            api_key,
            base_url: self
                .base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_version: self
                .api_version
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            provider_name: self
                .provider_name
                .unwrap_or_else(|| DEFAULT_PROVIDER_NAME.to_string()),
        };

        let client = Client::new();

        Ok(GoogleGenerativeAI { settings, client })
    }
}

impl Default for GoogleGenerativeAISettingsBuilder {
    fn default() -> Self {
        Self {
            api_key: API_KEY_ENV_VARS
                .iter()
                .find_map(|name| std::env::var(name).ok().filter(|key| !key.is_empty())),
            base_url: None,
            api_version: None,
            provider_name: None,
        }
    }
}
