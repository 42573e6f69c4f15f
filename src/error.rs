//! Error types for cliconf.
//!
//! This module defines the error types shared by the parser, the template
//! renderer, the diff planner and the translation units. Session failures
//! have their own [`SessionError`](crate::session::SessionError) and convert
//! into [`Error::Session`].

use std::path::PathBuf;
use thiserror::Error;

use crate::session::SessionError;

/// Result type alias for cliconf operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for cliconf.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Pattern Errors
    // ========================================================================
    /// A field pattern failed to compile.
    #[error("Invalid pattern '{pattern}': {message}")]
    Pattern {
        /// Pattern source text
        pattern: String,
        /// Error message
        message: String,
    },

    // ========================================================================
    // Template Errors
    // ========================================================================
    /// Template syntax error, detected when the template is compiled.
    #[error("Template syntax error in '{template}': {message}")]
    TemplateSyntax {
        /// Template name
        template: String,
        /// Error message
        message: String,
    },

    /// Template rendering error.
    #[error("Template rendering failed for '{template}': {message}")]
    TemplateRender {
        /// Template name
        template: String,
        /// Error message
        message: String,
    },

    /// A plan needs a template the unit does not provide.
    #[error("Missing '{role}' template for '{unit}'")]
    MissingTemplate {
        /// Unit name
        unit: String,
        /// Template role (write, update, delete)
        role: String,
    },

    // ========================================================================
    // Planning Errors
    // ========================================================================
    /// A grammar invariant required by the target device is violated.
    #[error("Precondition '{invariant}' violated: {message}")]
    Precondition {
        /// Name of the violated invariant
        invariant: String,
        /// Error message
        message: String,
    },

    /// Invalid configuration data (duplicate list keys, missing identity).
    #[error("Invalid configuration data: {0}")]
    InvalidData(String),

    // ========================================================================
    // Translation Unit Errors
    // ========================================================================
    /// Translation unit not found.
    #[error("Translation unit '{0}' not found")]
    UnitNotFound(String),

    /// Translation unit definition is invalid.
    #[error("Invalid translation unit '{unit}': {message}")]
    InvalidUnit {
        /// Unit name
        unit: String,
        /// Error message
        message: String,
    },

    /// A parsed field could not be converted to its declared kind.
    #[error("Cannot convert field '{field}' value '{value}': {message}")]
    FieldConversion {
        /// Field name
        field: String,
        /// Raw captured text
        value: String,
        /// Error message
        message: String,
    },

    // ========================================================================
    // Session Errors
    // ========================================================================
    /// CLI session failure.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The overall deadline of a multi-step transaction elapsed.
    #[error("Transaction deadline of {timeout_ms} ms exceeded")]
    DeadlineExceeded {
        /// Deadline in milliseconds
        timeout_ms: u64,
    },

    /// Reading back after an apply did not yield the desired state.
    #[error("Verification of '{unit}' failed: {message}")]
    VerificationFailed {
        /// Unit name
        unit: String,
        /// What differed
        message: String,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// File not found.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ========================================================================
    // Serialization Errors
    // ========================================================================
    /// YAML parsing error.
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ========================================================================
    // Other Errors
    // ========================================================================
    /// Generic error with source.
    #[error("{message}")]
    Other {
        /// Error message
        message: String,
        /// Source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Creates a new pattern error.
    pub fn pattern(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Pattern {
            pattern: pattern.into(),
            message: message.into(),
        }
    }

    /// Creates a new template syntax error.
    pub fn template_syntax(template: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TemplateSyntax {
            template: template.into(),
            message: message.into(),
        }
    }

    /// Creates a new template render error.
    pub fn template_render(template: impl Into<String>, message: impl Into<String>) -> Self {
        Self::TemplateRender {
            template: template.into(),
            message: message.into(),
        }
    }

    /// Creates a new precondition error.
    pub fn precondition(invariant: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Precondition {
            invariant: invariant.into(),
            message: message.into(),
        }
    }

    /// Creates a new invalid unit error.
    pub fn invalid_unit(unit: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidUnit {
            unit: unit.into(),
            message: message.into(),
        }
    }

    /// Returns true for authoring defects (templates, patterns, unit
    /// definitions) as opposed to runtime failures.
    pub fn is_authoring_defect(&self) -> bool {
        matches!(
            self,
            Error::Pattern { .. }
                | Error::TemplateSyntax { .. }
                | Error::TemplateRender { .. }
                | Error::MissingTemplate { .. }
                | Error::InvalidUnit { .. }
        )
    }

    /// Returns the error code for CLI exit status.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Session(SessionError::Rejected { .. }) => 2,
            Error::Session(_) | Error::DeadlineExceeded { .. } => 3,
            Error::VerificationFailed { .. } => 7,
            Error::Precondition { .. } | Error::InvalidData(_) => 4,
            Error::TemplateSyntax { .. }
            | Error::TemplateRender { .. }
            | Error::MissingTemplate { .. }
            | Error::Pattern { .. }
            | Error::InvalidUnit { .. } => 5,
            Error::UnitNotFound(_) => 6,
            _ => 1,
        }
    }
}

/// Extension trait for adding context to errors.
pub trait ErrorContext<T> {
    /// Adds context to an error.
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Adds context with a closure that is only evaluated on error.
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Other {
            message: message.into(),
            source: Some(Box::new(e)),
        })
    }

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| Error::Other {
            message: f().into(),
            source: Some(Box::new(e)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let rejected = Error::Session(SessionError::Rejected {
            command: "foo".into(),
            response: "% Invalid input".into(),
        });
        assert_eq!(rejected.exit_code(), 2);
        assert_eq!(Error::precondition("x", "y").exit_code(), 4);
        assert_eq!(Error::template_syntax("t", "bad").exit_code(), 5);
        assert_eq!(Error::UnitNotFound("u".into()).exit_code(), 6);
    }

    #[test]
    fn test_authoring_defects() {
        assert!(Error::template_render("t", "m").is_authoring_defect());
        assert!(Error::pattern("(", "unclosed").is_authoring_defect());
        assert!(!Error::precondition("x", "y").is_authoring_defect());
    }

    #[test]
    fn test_error_context() {
        let res: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        let err = res.context("loading unit").unwrap_err();
        assert_eq!(err.to_string(), "loading unit");
    }
}
