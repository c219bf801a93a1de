use shared::error::EnvelopeError;
use thiserror::Error;

/// A list or thread retrieval that did not produce usable data.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("request to {endpoint} failed: {reason}")]
    Transport { endpoint: String, reason: String },
    #[error("{endpoint} returned status {status}")]
    Status { endpoint: String, status: u16 },
    #[error("unexpected response format from {endpoint}: {source}")]
    UnexpectedFormat {
        endpoint: String,
        #[source]
        source: EnvelopeError,
    },
    #[error("could not decode response from {endpoint}: {reason}")]
    Decode { endpoint: String, reason: String },
}

impl FetchError {
    pub(crate) fn from_reqwest(endpoint: &str, err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            };
        }
        if err.is_decode() {
            return Self::Decode {
                endpoint: endpoint.to_string(),
                reason: err.to_string(),
            };
        }
        Self::Transport {
            endpoint: endpoint.to_string(),
            reason: err.to_string(),
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Rejected locally before any request is made.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("reply message cannot be empty")]
    EmptyMessage,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("invalid base url '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },
}
