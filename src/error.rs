use std::fmt;

use serde::Serialize;

/// Coarse classification of an [`AppError`], stable across message changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    NotFound,
    InvalidArgument,
    PermissionDenied,
    Internal,
    Io,
}

/// Structured error type for every fallible operation in the crate.
/// Serialized as `{ "code": ..., "detail": ... }` so callers across a process
/// boundary can match on the code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", content = "detail")]
pub enum AppError {
    NotFound { what: String },
    InvalidArgument { message: String },
    PermissionDenied { message: String },
    Internal { message: String },
    IoError { message: String },
    SettingsSaveError { message: String },
}

impl AppError {
    pub fn not_found(what: impl Into<String>) -> Self {
        AppError::NotFound { what: what.into() }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        AppError::InvalidArgument {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        AppError::Internal {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::NotFound { .. } => ErrorKind::NotFound,
            AppError::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            AppError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            AppError::Internal { .. } => ErrorKind::Internal,
            AppError::IoError { .. } | AppError::SettingsSaveError { .. } => ErrorKind::Io,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NotFound { what } => write!(f, "{what} not found"),
            AppError::InvalidArgument { message } => write!(f, "Invalid argument: {message}"),
            AppError::PermissionDenied { message } => write!(f, "Permission denied: {message}"),
            AppError::Internal { message } => write!(f, "Internal error: {message}"),
            AppError::IoError { message } => write!(f, "I/O error: {message}"),
            AppError::SettingsSaveError { message } => {
                write!(f, "Failed to save settings: {message}")
            }
        }
    }
}

impl std::error::Error for AppError {}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::IoError {
            message: e.to_string(),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::InvalidArgument {
            message: e.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(e: serde_yaml::Error) -> Self {
        AppError::InvalidArgument {
            message: format!("frontmatter: {e}"),
        }
    }
}

impl From<crate::persist::PersistError> for AppError {
    fn from(e: crate::persist::PersistError) -> Self {
        match e {
            crate::persist::PersistError::Io(io_err) => AppError::IoError {
                message: io_err.to_string(),
            },
            crate::persist::PersistError::Json(json_err) => AppError::InvalidArgument {
                message: json_err.to_string(),
            },
        }
    }
}

/// Allow converting AppError to String for CLI output.
impl From<AppError> for String {
    fn from(e: AppError) -> String {
        e.to_string()
    }
}
