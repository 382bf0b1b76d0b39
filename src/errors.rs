//! Error taxonomy for the tool boundary.
//!
//! Internally, fallible code returns `anyhow::Result` and attaches context
//! with `.context(...)` as it propagates. At the MCP/CLI boundary, errors are
//! classified into one of six kinds via [`ToolError`] so callers can branch
//! on `code()` rather than parsing message text.

use thiserror::Error;

/// The six error kinds every tool-facing failure is classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ValidationError,
    NotReady,
    NotAvailable,
    NotFound,
    ResourceExhausted,
    Internal,
}

impl ErrorKind {
    pub fn code(&self) -> &'static str {
        match self {
            Self::ValidationError => "validation_error",
            Self::NotReady => "not_ready",
            Self::NotAvailable => "not_available",
            Self::NotFound => "not_found",
            Self::ResourceExhausted => "resource_exhausted",
            Self::Internal => "internal",
        }
    }
}

/// A classified, tool-facing error.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("validation error{}: {message}", field.as_ref().map(|f| format!(" on `{f}`")).unwrap_or_default())]
    Validation {
        message: String,
        field: Option<String>,
        suggestions: Vec<String>,
        /// Literal slash-namespaced code for a specific boundary scenario
        /// (e.g. `VALIDATION/REQUIRED`, `VALIDATION/REGEX`), overriding the
        /// generic `ErrorKind::code()` fallback. `None` for validation
        /// failures with no scenario-specific code.
        code: Option<&'static str>,
    },

    #[error("not ready: {message}")]
    NotReady { message: String },

    #[error("not available: {message}")]
    NotAvailable { message: String },

    #[error("not found: {message}")]
    NotFound {
        message: String,
        suggestions: Vec<String>,
    },

    #[error("resource exhausted: {message}")]
    ResourceExhausted { message: String },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl ToolError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: None,
            suggestions: Vec::new(),
            code: None,
        }
    }

    pub fn validation_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
            suggestions: Vec::new(),
            code: None,
        }
    }

    /// A validation failure for a specific boundary scenario with a literal
    /// slash-namespaced code (e.g. `VALIDATION/REQUIRED`), rather than the
    /// generic `ErrorKind::code()` fallback.
    pub fn validation_coded(
        message: impl Into<String>,
        field: impl Into<String>,
        code: &'static str,
    ) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field.into()),
            suggestions: Vec::new(),
            code: Some(code),
        }
    }

    pub fn not_found(message: impl Into<String>, suggestions: Vec<String>) -> Self {
        Self::NotFound {
            message: message.into(),
            suggestions,
        }
    }

    pub fn not_ready(message: impl Into<String>) -> Self {
        Self::NotReady {
            message: message.into(),
        }
    }

    pub fn not_available(message: impl Into<String>) -> Self {
        Self::NotAvailable {
            message: message.into(),
        }
    }

    pub fn resource_exhausted(message: impl Into<String>) -> Self {
        Self::ResourceExhausted {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::ValidationError,
            Self::NotReady { .. } => ErrorKind::NotReady,
            Self::NotAvailable { .. } => ErrorKind::NotAvailable,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::ResourceExhausted { .. } => ErrorKind::ResourceExhausted,
            Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { code: Some(c), .. } => c,
            _ => self.kind().code(),
        }
    }

    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } => field.as_deref(),
            _ => None,
        }
    }

    pub fn suggestions(&self) -> &[String] {
        match self {
            Self::Validation { suggestions, .. } => suggestions,
            Self::NotFound { suggestions, .. } => suggestions,
            _ => &[],
        }
    }
}

/// Last-resort conversion: any unclassified `anyhow::Error` reaching the
/// tool boundary becomes `Internal` rather than leaking implementation
/// details as a validation error.
impl From<anyhow::Error> for ToolError {
    fn from(e: anyhow::Error) -> Self {
        Self::Internal {
            message: e.to_string(),
        }
    }
}
