//! Error taxonomy shared by the loader, the transforms and the pipeline runner.
//!
//! Every failure is raised at the point it is detected and propagated to the
//! caller unchanged. Unmapped department codes are deliberately not errors.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PluginError>;

/// Errors raised while loading or running plugins.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PluginError {
    /// A plugin specification referenced a name that no namespace exports,
    /// or a module-path prefix that is not registered.
    #[error("name '{name}' is not defined in module '{module}'")]
    NameResolution { name: String, module: String },

    /// A plugin specification could not be parsed as an expression.
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    /// A constructor or builtin was called with unusable arguments.
    #[error("invalid arguments for '{callee}': {message}")]
    InvalidArgument { callee: String, message: String },

    /// A transform expected a field that the document does not carry.
    #[error("key \"{field}\" not found in document {document}")]
    MissingField { field: String, document: String },

    /// A field value does not have the shape a transform expects.
    #[error("malformed value for field \"{field}\": {reason}")]
    MalformedValue { field: String, reason: String },

    /// Aggregation was asked to reduce an empty group or divide by zero weight.
    #[error("aggregation precondition failed: {0}")]
    AggregationPrecondition(String),

    /// Pipeline configuration or code table could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),
}

impl PluginError {
    pub(crate) fn invalid_argument(callee: &str, message: impl Into<String>) -> Self {
        PluginError::InvalidArgument {
            callee: callee.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn malformed(field: &str, reason: impl Into<String>) -> Self {
        PluginError::MalformedValue {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_message_names_the_key() {
        let err = PluginError::MissingField {
            field: "key_name".to_string(),
            document: "{\"foo\":\"<D10>\"}".to_string(),
        };
        assert!(err.to_string().contains("\"key_name\""));
        assert!(err.to_string().contains("<D10>"));
    }

    #[test]
    fn test_syntax_error_reports_offset() {
        let err = PluginError::Syntax {
            offset: 7,
            message: "unexpected ')'".to_string(),
        };
        assert_eq!(err.to_string(), "syntax error at offset 7: unexpected ')'");
    }
}
