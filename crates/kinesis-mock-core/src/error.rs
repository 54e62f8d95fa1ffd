//! Error Types for the Kinesis Emulator
//!
//! Every operation returns `Result<T>` aliased to `Result<T, KinesisError>`.
//! The variants map one-to-one onto the error codes the real service puts in
//! the `__type` field of its error body, so the wire layer renders them
//! without any further translation.
//!
//! ## Status mapping
//!
//! - 400: everything the client can fix (bad arguments, missing resources,
//!   busy resources, limits, expired tokens)
//! - 500: internal failures that should not happen
//! - 509: throughput overrun surfaced as the top-level result of an
//!   operation (inside `PutRecords` the same condition is reported
//!   per-record with a 200 response)

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KinesisError {
    #[error("{0}")]
    InvalidArgument(String),

    /// Shape-level validation. Individual field failures are collected and
    /// joined into one message so clients get full diagnostics in one round
    /// trip.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    ResourceNotFound(String),

    #[error("{0}")]
    ResourceInUse(String),

    #[error("{0}")]
    LimitExceeded(String),

    #[error("{0}")]
    ProvisionedThroughputExceeded(String),

    #[error("{0}")]
    ExpiredIterator(String),

    #[error("{0}")]
    ExpiredNextToken(String),

    #[error("{0}")]
    KmsAccessDenied(String),

    #[error("{0}")]
    InternalFailure(String),
}

impl KinesisError {
    /// The `__type` value in the AWS error body.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "InvalidArgumentException",
            Self::Validation(_) => "ValidationException",
            Self::ResourceNotFound(_) => "ResourceNotFoundException",
            Self::ResourceInUse(_) => "ResourceInUseException",
            Self::LimitExceeded(_) => "LimitExceededException",
            Self::ProvisionedThroughputExceeded(_) => "ProvisionedThroughputExceededException",
            Self::ExpiredIterator(_) => "ExpiredIteratorException",
            Self::ExpiredNextToken(_) => "ExpiredNextTokenException",
            Self::KmsAccessDenied(_) => "KMSAccessDeniedException",
            Self::InternalFailure(_) => "InternalFailure",
        }
    }

    /// HTTP status for the top-level error response.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InternalFailure(_) => 500,
            Self::ProvisionedThroughputExceeded(_) => 509,
            _ => 400,
        }
    }

    /// Standard not-found message for a stream addressed by name.
    pub fn stream_not_found(stream_name: &str, account_id: &str) -> Self {
        Self::ResourceNotFound(format!(
            "Stream {} under account {} not found.",
            stream_name, account_id
        ))
    }

    /// Standard busy message for a stream in a status that forbids mutation.
    pub fn stream_not_active(stream_name: &str, status: &str) -> Self {
        Self::ResourceInUse(format!(
            "Stream {} is in status {}, which does not allow this operation.",
            stream_name, status
        ))
    }

    pub fn shard_not_found(shard_id: &str, stream_name: &str) -> Self {
        Self::ResourceNotFound(format!(
            "Shard {} in stream {} does not exist.",
            shard_id, stream_name
        ))
    }

    pub fn consumer_not_found(consumer_name: &str, stream_name: &str) -> Self {
        Self::ResourceNotFound(format!(
            "Consumer {} on stream {} does not exist.",
            consumer_name, stream_name
        ))
    }
}

pub type Result<T> = std::result::Result<T, KinesisError>;
