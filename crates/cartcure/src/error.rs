use std::path::PathBuf;
use thiserror::Error;

use crate::db::DatabaseError;
use crate::notify::NotifyError;
use crate::secrets::SecretError;

#[derive(Error, Debug)]
pub enum CartcureError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("{0}")]
    Engine(#[from] EngineError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),

    #[error("Secret error: {0}")]
    Secret(#[from] SecretError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },
}

/// Machine-readable classification of engine failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidTransition,
    NotFound,
    PreconditionFailed,
    /// Informational: the requested work has already been done.
    AlreadySatisfied,
    ExternalDependencyFailed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidTransition => "invalid_transition",
            ErrorKind::NotFound => "not_found",
            ErrorKind::PreconditionFailed => "precondition_failed",
            ErrorKind::AlreadySatisfied => "already_satisfied",
            ErrorKind::ExternalDependencyFailed => "external_dependency_failed",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised by lifecycle transitions, billing decisions and scheduler runs.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid transition for {entity} '{key}': {from} -> {to}")]
    InvalidTransition {
        entity: &'static str,
        key: String,
        from: String,
        to: String,
    },

    #[error("{entity} '{key}' not found")]
    NotFound { entity: &'static str, key: String },

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Already satisfied: {0}")]
    AlreadySatisfied(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Notification failed: {0}")]
    Notify(#[from] NotifyError),
}

impl EngineError {
    pub fn job_not_found(job_number: &str) -> Self {
        EngineError::NotFound {
            entity: "Job",
            key: job_number.to_string(),
        }
    }

    pub fn invoice_not_found(invoice_number: &str) -> Self {
        EngineError::NotFound {
            entity: "Invoice",
            key: invoice_number.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            EngineError::NotFound { .. } => ErrorKind::NotFound,
            EngineError::PreconditionFailed(_) => ErrorKind::PreconditionFailed,
            EngineError::AlreadySatisfied(_) => ErrorKind::AlreadySatisfied,
            EngineError::Database(_) | EngineError::Notify(_) => {
                ErrorKind::ExternalDependencyFailed
            }
        }
    }

    /// Plain-language message suitable for showing to the operator.
    pub fn user_message(&self) -> String {
        match self {
            EngineError::InvalidTransition { entity, key, from, to } => format!(
                "{} {} is currently '{}' and cannot be moved to '{}'.",
                entity, key, from, to
            ),
            EngineError::NotFound { entity, key } => {
                format!("No {} with number {} could be found.", entity.to_lowercase(), key)
            }
            EngineError::PreconditionFailed(reason) => {
                format!("That can't be done yet: {}", reason)
            }
            EngineError::AlreadySatisfied(reason) => format!("Nothing to do: {}", reason),
            EngineError::Database(_) => {
                "The record store could not be updated. No changes were saved; please try again."
                    .to_string()
            }
            EngineError::Notify(_) => {
                "The email could not be sent. The change itself was saved.".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, CartcureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_map_from_variants() {
        assert_eq!(
            EngineError::job_not_found("J-1").kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            EngineError::PreconditionFailed("deposit unpaid".into()).kind(),
            ErrorKind::PreconditionFailed
        );
        assert_eq!(
            EngineError::Database(DatabaseError::LockPoisoned).kind(),
            ErrorKind::ExternalDependencyFailed
        );
    }

    #[test]
    fn test_user_message_differs_from_internal_kind() {
        let err = EngineError::InvalidTransition {
            entity: "Job",
            key: "J-0042".into(),
            from: "completed".into(),
            to: "in_progress".into(),
        };
        let message = err.user_message();
        assert!(message.contains("J-0042"));
        assert!(!message.contains("invalid_transition"));
        assert_eq!(err.kind().as_str(), "invalid_transition");
    }
}
