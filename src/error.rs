//! Error types for the dubbing pipeline.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DubError {
    /// The collaborator could not be reached or answered with a server-side failure.
    #[error("{service} unavailable: {message}")]
    CollaboratorUnavailable {
        service: &'static str,
        message: String,
    },

    #[error("{service} timed out after {after:?}")]
    CollaboratorTimeout {
        service: &'static str,
        after: Duration,
    },

    /// Bad input or bad credentials. Retrying will not help.
    #[error("{service} rejected the request: {message}")]
    CollaboratorRejected {
        service: &'static str,
        message: String,
    },

    #[error("Invalid input: {0}")]
    InputValidation(String),

    /// Chunk results do not tile their segment's span.
    #[error("Reassembly gap in segment {segment_id}: expected coverage to {expected_ms}ms, covered to {covered_ms}ms")]
    ReassemblyGap {
        segment_id: String,
        expected_ms: u64,
        covered_ms: u64,
    },

    #[error("{operation} failed with exit code {exit_code:?}: {stderr}")]
    MediaTool {
        operation: &'static str,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DubError {
    pub fn unavailable(service: &'static str, message: impl Into<String>) -> Self {
        Self::CollaboratorUnavailable {
            service,
            message: message.into(),
        }
    }

    pub fn rejected(service: &'static str, message: impl Into<String>) -> Self {
        Self::CollaboratorRejected {
            service,
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InputValidation(message.into())
    }

    /// Whether another attempt at the same call could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::CollaboratorUnavailable { .. }
                | Self::CollaboratorTimeout { .. }
                | Self::MediaTool { .. }
                | Self::Io(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, DubError>;
