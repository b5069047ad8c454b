use tumorboard_types::TextError;

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(#[from] TextError),

    /// The primary workflow store is configured but could not be queried.
    #[error("{source_name} is unavailable: {message}")]
    SourceUnavailable {
        source_name: &'static str,
        message: String,
    },

    #[error("failed to read workflow file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to write workflow file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to deserialize workflow document: {0}")]
    Deserialization(serde_json::Error),
    #[error("failed to serialize workflow document: {0}")]
    Serialization(serde_json::Error),

    #[error("database error: {0}")]
    Database(String),

    #[error("No evaluations found for this patient: {0}")]
    NoEvaluations(String),
    #[error("participant not found: {0}")]
    ParticipantNotFound(String),
    #[error("participant with this id already exists: {0}")]
    ParticipantExists(String),
    #[error("overallRating must be between 1 and 10 (got {0})")]
    InvalidRating(i64),
    #[error("implementationWillingness must be one of: yes, maybe, no (got {0})")]
    InvalidWillingness(String),
}

pub type RecordResult<T> = std::result::Result<T, RecordError>;
