//! Snapshot of the raw feedback collection.

use std::sync::Arc;

use shared::domain::FeedbackRecord;
use tokio::sync::RwLock;
use tracing::{error, info};

use crate::{FeedbackApi, FetchError, Session};

#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    pub records: Vec<FeedbackRecord>,
    pub error: Option<String>,
    pub loading: bool,
}

pub struct FeedbackStore {
    api: Arc<dyn FeedbackApi>,
    session: Session,
    state: RwLock<StoreSnapshot>,
}

impl FeedbackStore {
    pub fn new(api: Arc<dyn FeedbackApi>, session: Session) -> Self {
        Self {
            api,
            session,
            state: RwLock::new(StoreSnapshot::default()),
        }
    }

    /// Fetches the whole collection. On failure the snapshot holds no records
    /// and a user-facing error message.
    pub async fn load(&self) -> Result<Vec<FeedbackRecord>, FetchError> {
        self.state.write().await.loading = true;

        let result = self.api.list_feedback(&self.session).await;

        let mut state = self.state.write().await;
        state.loading = false;
        match result {
            Ok(mut records) => {
                for record in &mut records {
                    record.replies.clear();
                    record.error = None;
                }
                info!(count = records.len(), "feedback store: loaded");
                state.records = records.clone();
                state.error = None;
                Ok(records)
            }
            Err(err) => {
                error!(error = %err, "feedback store: load failed");
                state.records.clear();
                state.error = Some(match &err {
                    FetchError::UnexpectedFormat { .. } => "Unexpected response format.".to_string(),
                    _ => "Failed to fetch feedback".to_string(),
                });
                Err(err)
            }
        }
    }

    pub async fn is_loading(&self) -> bool {
        self.state.read().await.loading
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        self.state.read().await.clone()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
