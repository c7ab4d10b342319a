//! Errors raised while loading or validating batch tracker configuration

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// The configuration file exists but could not be read
    #[error("Cannot read batch tracker config '{file_path}': {error}")]
    FileReadError { file_path: String, error: String },

    /// A source could not be parsed into `BatchConfig`
    #[error("Parse Error for {source_name}: {reason}")]
    ParseError { source_name: String, reason: String },

    #[error("Field '{field}' is required for {context}")]
    MissingRequiredField { field: String, context: String },

    #[error("Field '{field}' has unusable value '{value}': {context}")]
    InvalidValue {
        field: String,
        value: String,
        context: String,
    },

    #[error("Batch tracker config rejected: {error}")]
    ValidationError { error: String },
}

impl ConfigurationError {
    pub fn file_read_error(file_path: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self::FileReadError {
            file_path: file_path.into(),
            error: error.to_string(),
        }
    }

    pub fn parse_error(source_name: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::ParseError {
            source_name: source_name.into(),
            reason: reason.to_string(),
        }
    }

    pub fn missing_required_field(field: impl Into<String>, context: impl Into<String>) -> Self {
        Self::MissingRequiredField {
            field: field.into(),
            context: context.into(),
        }
    }

    pub fn invalid_value(
        field: impl Into<String>,
        value: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            context: context.into(),
        }
    }

    pub fn validation_error(error: impl Into<String>) -> Self {
        Self::ValidationError {
            error: error.into(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigurationError>;
