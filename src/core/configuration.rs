//! Immutable generation configuration.
//!
//! A [`GenerationConfiguration`] fixes everything about a generation request
//! except the conversation itself: which model to call, the system
//! instruction, sampling options and, optionally, the schema the answer must
//! follow. Building one is pure; the only failure is a structurally invalid
//! schema.

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::schema::SchemaDescriptor;
use crate::error::ConfigurationError;

/// Model used when none is given.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// MIME type requested from the model when a schema is configured.
pub const JSON_MIME_TYPE: &str = "application/json";

/// Sampling options for a request. `None` is used for the provider default.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Builder)]
#[builder(
    pattern = "owned",
    default,
    setter(into, strip_option),
    build_fn(error = "ConfigurationError")
)]
pub struct GenerationOptions {
    /// Randomness.
    pub temperature: Option<f32>,

    /// Nucleus sampling.
    pub top_p: Option<f32>,

    /// Top-k sampling.
    pub top_k: Option<u32>,

    /// Max output tokens.
    pub max_output_tokens: Option<u32>,

    /// Stop sequences.
    /// If set, the model will stop generating text when one of the stop sequences is generated.
    pub stop_sequences: Option<Vec<String>>,
}

impl GenerationOptions {
    pub fn builder() -> GenerationOptionsBuilder {
        GenerationOptionsBuilder::default()
    }
}

/// The output-format hint derived from a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConstraint {
    pub mime_type: String,
    /// The schema in the provider's `responseSchema` dialect. `None` when the
    /// schema has no expressible field; the MIME type alone is sent then.
    pub response_schema: Option<Value>,
}

/// Everything a generation request needs besides the conversation.
///
/// Immutable once built. Reconfiguring a session means building a new one.
#[derive(Debug, Clone, PartialEq, Builder)]
#[builder(
    pattern = "owned",
    build_fn(private, name = "build_inner", error = "ConfigurationError")
)]
pub struct GenerationConfiguration {
    /// Model identifier. Empty or blank falls back to [`DEFAULT_MODEL`].
    #[builder(default, setter(into))]
    model: String,

    #[builder(default, setter(into, strip_option))]
    system_instruction: Option<String>,

    #[builder(default, setter(into, strip_option))]
    schema: Option<SchemaDescriptor>,

    #[builder(default)]
    options: GenerationOptions,

    #[builder(setter(skip))]
    output_constraint: Option<OutputConstraint>,
}

impl GenerationConfigurationBuilder {
    /// Builds the configuration.
    ///
    /// Substitutes [`DEFAULT_MODEL`] for a missing model, checks the schema's
    /// structure and derives the JSON output constraint from it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidSchema`] for empty or duplicate
    /// field names anywhere in the schema.
    pub fn build(self) -> Result<GenerationConfiguration, ConfigurationError> {
        let mut configuration = self.build_inner()?;

        let model = configuration.model.trim();
        configuration.model = if model.is_empty() {
            DEFAULT_MODEL.to_string()
        } else {
            model.to_string()
        };

        if let Some(schema) = &configuration.schema {
            schema.check_structure("")?;
            configuration.output_constraint = Some(OutputConstraint {
                mime_type: JSON_MIME_TYPE.to_string(),
                response_schema: schema.to_response_schema(),
            });
        }

        Ok(configuration)
    }
}

impl GenerationConfiguration {
    pub fn builder() -> GenerationConfigurationBuilder {
        GenerationConfigurationBuilder::default()
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn system_instruction(&self) -> Option<&str> {
        self.system_instruction.as_deref()
    }

    pub fn schema(&self) -> Option<&SchemaDescriptor> {
        self.schema.as_ref()
    }

    pub fn options(&self) -> &GenerationOptions {
        &self.options
    }

    /// Present exactly when a schema is configured.
    pub fn output_constraint(&self) -> Option<&OutputConstraint> {
        self.output_constraint.as_ref()
    }
}

impl Default for GenerationConfiguration {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            system_instruction: None,
            schema: None,
            options: GenerationOptions::default(),
            output_constraint: None,
        }
    }
}

/// Builds a configuration from an optional model name and schema.
///
/// # Example
/// ```
/// use autoreview::core::{DEFAULT_MODEL, configure};
///
/// let configuration = configure(None, None).unwrap();
/// assert_eq!(configuration.model(), DEFAULT_MODEL);
/// ```
pub fn configure(
    model: Option<&str>,
    schema: Option<SchemaDescriptor>,
) -> Result<GenerationConfiguration, ConfigurationError> {
    let mut builder = GenerationConfiguration::builder();
    if let Some(model) = model {
        builder = builder.model(model);
    }
    if let Some(schema) = schema {
        builder = builder.schema(schema);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::schema::FieldDescriptor;
    use serde_json::json;

    fn review_schema() -> SchemaDescriptor {
        SchemaDescriptor::object([
            FieldDescriptor::required("summary", SchemaDescriptor::String),
            FieldDescriptor::required("score", SchemaDescriptor::Number),
        ])
    }

    #[test]
    fn test_default_model_when_absent_or_blank() {
        for model in [None, Some(""), Some("   ")] {
            let configuration = configure(model, None).unwrap();
            assert_eq!(configuration.model(), DEFAULT_MODEL);
            assert!(configuration.output_constraint().is_none());
        }
        assert_eq!(GenerationConfiguration::default().model(), DEFAULT_MODEL);
    }

    #[test]
    fn test_custom_model_is_kept() {
        let configuration = configure(Some("gemini-1.5-pro"), None).unwrap();
        assert_eq!(configuration.model(), "gemini-1.5-pro");
    }

    #[test]
    fn test_schema_derives_json_constraint() {
        let configuration = configure(None, Some(review_schema())).unwrap();
        let constraint = configuration.output_constraint().unwrap();

        assert_eq!(constraint.mime_type, JSON_MIME_TYPE);
        let response_schema = constraint.response_schema.as_ref().unwrap();
        assert_eq!(response_schema["type"], json!("OBJECT"));
        assert_eq!(
            response_schema["required"],
            json!(["summary", "score"])
        );
        assert_eq!(configuration.schema(), Some(&review_schema()));
    }

    #[test]
    fn test_invalid_schema_is_a_configuration_error() {
        let schema = SchemaDescriptor::object([
            FieldDescriptor::required("", SchemaDescriptor::String),
        ]);
        let err = configure(None, Some(schema)).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidSchema { .. }));
    }

    #[test]
    fn test_builder_with_system_instruction_and_options() {
        let configuration = GenerationConfiguration::builder()
            .model("gemini-2.0-flash")
            .system_instruction("You are a careful reviewer.")
            .options(
                GenerationOptions::builder()
                    .temperature(0.2f32)
                    .max_output_tokens(1024u32)
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap();

        assert_eq!(
            configuration.system_instruction(),
            Some("You are a careful reviewer.")
        );
        assert_eq!(configuration.options().temperature, Some(0.2));
        assert_eq!(configuration.options().max_output_tokens, Some(1024));
        assert_eq!(configuration.options().top_k, None);
    }

    #[test]
    fn test_free_form_schema_still_requests_json() {
        let schema = SchemaDescriptor::object([FieldDescriptor::required(
            "metadata",
            SchemaDescriptor::object([]),
        )]);
        let configuration = configure(None, Some(schema)).unwrap();
        let constraint = configuration.output_constraint().unwrap();

        assert_eq!(constraint.mime_type, JSON_MIME_TYPE);
        assert_eq!(constraint.response_schema, None);
    }
}
