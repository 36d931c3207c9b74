//! Template error types

use std::fmt;

use minijinja::ErrorKind;

/// Errors that can occur during template operations
#[derive(Debug)]
pub enum TemplateError {
    /// Template rendering failed
    Render(minijinja::Error),
    /// Template syntax is invalid
    Syntax(String),
    /// A referenced variable path is undefined
    Undefined(String),
}

impl TemplateError {
    /// Whether this error comes from a reference to data that does not exist
    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined(_))
    }
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Render(e) => write!(f, "template render error: {}", e),
            Self::Syntax(msg) => write!(f, "template syntax error: {}", msg),
            Self::Undefined(var) => write!(f, "undefined variable: {}", var),
        }
    }
}

impl std::error::Error for TemplateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Render(e) => Some(e),
            _ => None,
        }
    }
}

impl From<minijinja::Error> for TemplateError {
    fn from(err: minijinja::Error) -> Self {
        match err.kind() {
            ErrorKind::SyntaxError => Self::Syntax(err.to_string()),
            ErrorKind::UndefinedError => Self::Undefined(err.to_string()),
            _ => Self::Render(err),
        }
    }
}
