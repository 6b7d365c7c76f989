//! Error types for configuration, generation and cleaning.
//!
//! Each operation of the crate fails with its own error type so callers can
//! match on exactly what can go wrong there. The crate-level [`Error`] wraps
//! all of them for code that drives the whole configure, generate and clean
//! cycle at once.

use std::fmt;

/// A `Result` alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors detected while building a configuration, before any network call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigurationError {
    /// The schema descriptor is structurally invalid or uses an unsupported
    /// construct.
    #[error("invalid schema at `{}`: {reason}", display_path(.path))]
    InvalidSchema { path: String, reason: String },

    /// No API key was provided or found in the environment.
    #[error("missing API key: set {0}")]
    MissingApiKey(String),

    /// A builder was finalized with a required field unset.
    #[error("builder error: {0}")]
    Builder(String),
}

impl ConfigurationError {
    pub(crate) fn invalid_schema(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSchema {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl From<derive_builder::UninitializedFieldError> for ConfigurationError {
    fn from(err: derive_builder::UninitializedFieldError) -> Self {
        Self::Builder(err.to_string())
    }
}

/// The failure classes of a generation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationErrorKind {
    /// The stream could not be opened, broke mid-way, closed without an
    /// end-of-stream signal, or violated the chunk protocol.
    Transport,
    /// The caller's deadline elapsed before the stream finished.
    Timeout,
}

impl fmt::Display for GenerationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationErrorKind::Transport => f.write_str("transport"),
            GenerationErrorKind::Timeout => f.write_str("timeout"),
        }
    }
}

/// A failed generation call.
///
/// `partial_text` holds whatever was accumulated before the failure. It is
/// diagnostic only and never a usable answer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("generation failed ({kind}): {message}")]
pub struct GenerationError {
    pub kind: GenerationErrorKind,
    pub message: String,
    pub partial_text: String,
}

impl GenerationError {
    /// A transport failure with no accumulated text.
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: GenerationErrorKind::Transport,
            message: message.into(),
            partial_text: String::new(),
        }
    }

    /// A deadline failure with no accumulated text.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: GenerationErrorKind::Timeout,
            message: message.into(),
            partial_text: String::new(),
        }
    }

    /// Attaches the text accumulated so far.
    pub fn with_partial_text(mut self, partial_text: impl Into<String>) -> Self {
        self.partial_text = partial_text.into();
        self
    }
}

#[cfg(feature = "google")]
impl From<reqwest::Error> for GenerationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout(err.to_string())
        } else {
            Self::transport(err.to_string())
        }
    }
}

/// The failure classes of a clean call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanErrorKind {
    MalformedOutput,
    SchemaMismatch,
}

/// The model's output did not parse, or parsed but did not match the schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CleanError {
    /// The text is not syntactically valid JSON.
    #[error("malformed model output at line {line}, column {column}: {message}")]
    MalformedOutput {
        raw_text: String,
        line: usize,
        column: usize,
        message: String,
    },

    /// The parsed value does not conform to the schema at `path`.
    #[error("schema mismatch at `{}`: expected {expected}, found {actual}", display_path(.path))]
    SchemaMismatch {
        path: String,
        expected: String,
        actual: String,
    },
}

impl CleanError {
    pub fn kind(&self) -> CleanErrorKind {
        match self {
            CleanError::MalformedOutput { .. } => CleanErrorKind::MalformedOutput,
            CleanError::SchemaMismatch { .. } => CleanErrorKind::SchemaMismatch,
        }
    }
}

/// Crate-level error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Clean(#[from] CleanError),

    /// JSON (de)serialization failed outside of cleaning, e.g. while turning
    /// validated data into a typed value.
    #[error("JSON error: {0}")]
    Json(String),

    #[error("YAML error: {0}")]
    Yaml(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Yaml(err.to_string())
    }
}

impl From<derive_builder::UninitializedFieldError> for Error {
    fn from(err: derive_builder::UninitializedFieldError) -> Self {
        Error::Configuration(err.into())
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() { "<root>" } else { path }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_mismatch_display_names_field() {
        let err = CleanError::SchemaMismatch {
            path: "score".to_string(),
            expected: "number".to_string(),
            actual: "string".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "schema mismatch at `score`: expected number, found string"
        );
        assert_eq!(err.kind(), CleanErrorKind::SchemaMismatch);
    }

    #[test]
    fn test_root_path_display() {
        let err = ConfigurationError::invalid_schema("", "empty union");
        assert_eq!(err.to_string(), "invalid schema at `<root>`: empty union");
    }

    #[test]
    fn test_generation_error_carries_partial_text() {
        let err = GenerationError::transport("connection reset").with_partial_text("Hel");
        assert_eq!(err.kind, GenerationErrorKind::Transport);
        assert_eq!(err.partial_text, "Hel");
        assert_eq!(
            err.to_string(),
            "generation failed (transport): connection reset"
        );
    }

    #[test]
    fn test_crate_error_conversions() {
        let err: Error = GenerationError::timeout("deadline elapsed").into();
        assert!(matches!(
            err,
            Error::Generation(GenerationError {
                kind: GenerationErrorKind::Timeout,
                ..
            })
        ));

        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Json(_)));
    }
}
