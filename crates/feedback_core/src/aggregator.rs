//! Decorates feedback records with their reply threads.
//!
//! One fetch is spawned per distinct record identity and all of them are
//! joined before anything is published. Results are matched back by identity,
//! so the returned order is always the input order.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use shared::domain::{FeedbackId, FeedbackRecord, ReplyRecord};
use tokio::{sync::Semaphore, task::JoinSet};
use tracing::{info, warn};

use crate::{sort_thread, FeedbackApi, FetchError, Session};

const INCOMPLETE_FETCH_REASON: &str = "reply fetch did not complete";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregationReport {
    pub records: usize,
    pub replies: usize,
    /// Records whose thread could not be fetched, in input order.
    pub failed: Vec<FeedbackId>,
}

impl AggregationReport {
    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty()
    }
}

pub struct ReplyAggregator {
    api: Arc<dyn FeedbackApi>,
    session: Session,
    max_in_flight: Option<usize>,
}

impl ReplyAggregator {
    pub fn new(api: Arc<dyn FeedbackApi>, session: Session) -> Self {
        Self {
            api,
            session,
            max_in_flight: None,
        }
    }

    /// Caps how many thread fetches run at once. Unbounded by default.
    pub fn with_max_in_flight(mut self, limit: usize) -> Self {
        self.max_in_flight = Some(limit.max(1));
        self
    }

    pub fn max_in_flight(&self) -> Option<usize> {
        self.max_in_flight
    }

    pub async fn aggregate(&self, records: Vec<FeedbackRecord>) -> Vec<FeedbackRecord> {
        self.aggregate_with_report(records).await.0
    }

    pub async fn aggregate_with_report(
        &self,
        records: Vec<FeedbackRecord>,
    ) -> (Vec<FeedbackRecord>, AggregationReport) {
        let threads = self.fetch_threads(&records).await;

        let mut report = AggregationReport {
            records: records.len(),
            ..AggregationReport::default()
        };
        let merged = records
            .into_iter()
            .map(|mut record| {
                let outcome = threads
                    .get(&record.id)
                    .cloned()
                    .unwrap_or_else(|| Err(INCOMPLETE_FETCH_REASON.to_string()));
                match outcome {
                    Ok(replies) => {
                        report.replies += replies.len();
                        record.replies = replies;
                        record.error = None;
                    }
                    Err(reason) => {
                        report.failed.push(record.id.clone());
                        record.replies = Vec::new();
                        record.error = Some(reason);
                    }
                }
                record
            })
            .collect::<Vec<_>>();

        info!(
            records = report.records,
            replies = report.replies,
            failed = report.failed.len(),
            "reply aggregation complete"
        );
        (merged, report)
    }

    async fn fetch_threads(
        &self,
        records: &[FeedbackRecord],
    ) -> HashMap<FeedbackId, Result<Vec<ReplyRecord>, String>> {
        let limiter = self.max_in_flight.map(|limit| Arc::new(Semaphore::new(limit)));
        let mut seen = HashSet::new();
        let mut tasks = JoinSet::new();

        for record in records {
            if !seen.insert(record.id.clone()) {
                continue;
            }
            let api = Arc::clone(&self.api);
            let session = self.session.clone();
            let limiter = limiter.clone();
            let feedback_id = record.id.clone();
            tasks.spawn(async move {
                let _permit = match limiter {
                    Some(limiter) => limiter.acquire_owned().await.ok(),
                    None => None,
                };
                let result = fetch_thread(api.as_ref(), &session, &feedback_id).await;
                (feedback_id, result)
            });
        }

        let mut threads = HashMap::with_capacity(seen.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((feedback_id, Ok(replies))) => {
                    threads.insert(feedback_id, Ok(replies));
                }
                Ok((feedback_id, Err(err))) => {
                    warn!(feedback_id = %feedback_id, error = %err, "reply fetch failed");
                    threads.insert(feedback_id, Err(err.to_string()));
                }
                Err(err) => warn!(error = %err, "reply fetch task aborted"),
            }
        }
        threads
    }
}

async fn fetch_thread(
    api: &dyn FeedbackApi,
    session: &Session,
    feedback_id: &FeedbackId,
) -> Result<Vec<ReplyRecord>, FetchError> {
    let envelope = api.replies_by_feedback(session, feedback_id).await?;
    if !envelope.success && !envelope.data.is_empty() {
        warn!(
            feedback_id = %feedback_id,
            "reply lookup reported no success but returned data"
        );
    }
    Ok(attach_thread(feedback_id, envelope.data))
}

/// Binds a fetched thread to its record: unstamped replies take the record's
/// id, replies naming another record are dropped.
pub(crate) fn attach_thread(
    feedback_id: &FeedbackId,
    replies: Vec<ReplyRecord>,
) -> Vec<ReplyRecord> {
    let mut thread = replies
        .into_iter()
        .filter_map(|mut reply| {
            if let Some(owner) = reply.feedback_id.as_ref().filter(|owner| *owner != feedback_id) {
                warn!(
                    feedback_id = %feedback_id,
                    owner = %owner,
                    "dropping reply that belongs to another record"
                );
                return None;
            }
            reply.feedback_id.get_or_insert_with(|| feedback_id.clone());
            Some(reply)
        })
        .collect::<Vec<_>>();
    sort_thread(&mut thread);
    thread
}

#[cfg(test)]
#[path = "tests/aggregator_tests.rs"]
mod tests;
