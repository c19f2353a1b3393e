use thiserror::Error;

use crate::message::MessageId;

/// Errors from message store operations (used by trait definitions in threadline-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Input rejected before anything was persisted.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("message is empty")]
    EmptyInput,

    #[error("credential is missing the expected '{expected_prefix}' prefix")]
    MalformedCredential { expected_prefix: String },

    #[error("message is {actual} characters; model '{model}' accepts at most {max}")]
    InputTooLong {
        model: String,
        max: usize,
        actual: usize,
    },

    #[error("user message {0} cannot be edited")]
    ImmutableMessage(MessageId),
}

/// Failures talking to the generation backend.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation request rejected (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("generation request failed: {0}")]
    Request(String),

    #[error("stream error: {0}")]
    Stream(String),

    #[error("could not persist generated message: {0}")]
    Persist(String),
}

/// Failures reading or writing the local transcript cache.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(String),

    #[error("cache encoding error: {0}")]
    Encoding(String),
}

/// Everything a chat session operation can fail with.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Transport(#[from] GenerationError),

    #[error("persistence error: {0}")]
    Persistence(#[from] RepositoryError),

    #[error("message {0} is not in the transcript")]
    UnknownMessage(MessageId),

    #[error("command failed: {0}")]
    Command(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::Query("syntax error".to_string());
        assert_eq!(err.to_string(), "query error: syntax error");
    }

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::InputTooLong {
            model: "gpt-3.5-turbo".to_string(),
            max: 60_000,
            actual: 60_001,
        };
        assert_eq!(
            err.to_string(),
            "message is 60001 characters; model 'gpt-3.5-turbo' accepts at most 60000"
        );
    }

    #[test]
    fn test_session_error_from_conversions() {
        let err: SessionError = ValidationError::EmptyInput.into();
        assert!(matches!(err, SessionError::Validation(ValidationError::EmptyInput)));
        assert_eq!(err.to_string(), "message is empty");

        let err: SessionError = RepositoryError::NotFound.into();
        assert_eq!(err.to_string(), "persistence error: entity not found");

        let err: SessionError = GenerationError::Rejected {
            status: 401,
            body: "bad key".to_string(),
        }
        .into();
        assert!(err.to_string().contains("HTTP 401"));
    }

    #[test]
    fn test_unknown_message_display() {
        let id = MessageId(Uuid::nil());
        let err = SessionError::UnknownMessage(id);
        assert!(err.to_string().contains(&Uuid::nil().to_string()));
    }
}
