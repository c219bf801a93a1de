use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error body the backend attaches to non-success responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("response is missing the `data` collection")]
    MissingData,
    #[error("response `data` field is not a collection")]
    NotACollection,
    #[error("malformed record in response: {0}")]
    MalformedRecord(String),
}
