use std::error::Error;
use std::fmt;

use crate::api::HttpError;

/// Errors surfaced by hydration, URL mapping and the orchestrator.
///
/// Unresolved references are never errors; they come back as `None`.
#[derive(Debug)]
pub enum SpaError {
    /// The deployment configuration does not fit the URL being mapped.
    Configuration(String),
    /// A factory has no builder registered for the tag.
    UnsupportedType {
        kind: &'static str,
        type_name: String,
    },
    /// The operation does not exist for this Page Model API version.
    UnsupportedOperation {
        method: &'static str,
        version: &'static str,
    },
    /// A button builder received parameters of another button kind.
    InvalidButtonParams(String),
    /// The injected HTTP client failed.
    Http(HttpError),
    /// A fetched document could not be interpreted.
    Decode(String),
    /// The page aggregate was already destroyed.
    Destroyed,
}

impl SpaError {
    pub(crate) fn unsupported_type(kind: &'static str, type_name: impl Into<String>) -> Self {
        SpaError::UnsupportedType {
            kind,
            type_name: type_name.into(),
        }
    }
}

impl fmt::Display for SpaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpaError::Configuration(msg) => write!(f, "{}", msg),
            SpaError::UnsupportedType { kind, type_name } => {
                write!(f, "Unsupported {} type: '{}'.", kind, type_name)
            }
            SpaError::UnsupportedOperation { method, version } => write!(
                f,
                "The method \"{}\" is not supported by the Page Model API {}.",
                method, version
            ),
            SpaError::InvalidButtonParams(button) => {
                write!(f, "invalid parameters for button '{}'", button)
            }
            SpaError::Http(e) => write!(f, "http error: {}", e),
            SpaError::Decode(msg) => write!(f, "decode failed: {}", msg),
            SpaError::Destroyed => write!(f, "the page has been destroyed"),
        }
    }
}

impl Error for SpaError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SpaError::Http(e) => Some(e),
            _ => None,
        }
    }
}

impl From<HttpError> for SpaError {
    fn from(err: HttpError) -> Self {
        SpaError::Http(err)
    }
}

impl From<serde_json::Error> for SpaError {
    fn from(err: serde_json::Error) -> Self {
        SpaError::Decode(err.to_string())
    }
}
