//! Load, aggregate and publish feedback into the table in one pass.

use std::sync::Arc;

use shared::domain::FeedbackRecord;
use tracing::{info, warn};

use crate::{
    AggregationReport, FeedbackApi, FeedbackStore, FeedbackTable, FetchError, ReplyAggregator,
    ReplyLookup, ReplyWorkflow, Session,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardView {
    /// Table published. The report lists rows whose threads failed.
    Ready(AggregationReport),
    /// The list itself could not be fetched; no table is shown.
    Failed(String),
}

pub struct Dashboard {
    api: Arc<dyn FeedbackApi>,
    session: Session,
    store: FeedbackStore,
    aggregator: ReplyAggregator,
    lookup: ReplyLookup,
    table: FeedbackTable,
}

impl Dashboard {
    pub fn new(api: Arc<dyn FeedbackApi>, session: Session) -> Self {
        Self {
            store: FeedbackStore::new(Arc::clone(&api), session.clone()),
            aggregator: ReplyAggregator::new(Arc::clone(&api), session.clone()),
            api,
            session,
            lookup: ReplyLookup::default(),
            table: FeedbackTable::default(),
        }
    }

    pub fn with_max_in_flight(mut self, limit: Option<usize>) -> Self {
        if let Some(limit) = limit {
            self.aggregator = self.aggregator.with_max_in_flight(limit);
        }
        self
    }

    pub fn with_reply_lookup(mut self, lookup: ReplyLookup) -> Self {
        self.lookup = lookup;
        self
    }

    /// Fails only when the feedback list could not be fetched; per-record
    /// thread failures are carried on the records.
    pub async fn load_aggregated(
        &self,
    ) -> Result<(Vec<FeedbackRecord>, AggregationReport), FetchError> {
        let records = self.store.load().await?;
        Ok(self.aggregator.aggregate_with_report(records).await)
    }

    pub async fn refresh(&mut self) -> DashboardView {
        match self.load_aggregated().await {
            Ok((records, report)) => {
                if report.is_partial() {
                    warn!(failed = report.failed.len(), "dashboard: some reply threads missing");
                }
                self.table.replace_source(records);
                DashboardView::Ready(report)
            }
            Err(err) => {
                self.table.replace_source(Vec::new());
                let message = self
                    .store
                    .snapshot()
                    .await
                    .error
                    .unwrap_or_else(|| err.to_string());
                DashboardView::Failed(message)
            }
        }
    }

    /// Limits the table to the apps assigned to `email`.
    pub async fn scope_to_assigned_apps(&mut self, email: &str) -> Result<Vec<String>, FetchError> {
        let apps = self.api.assigned_apps(&self.session, email).await?;
        info!(email, apps = apps.len(), "dashboard: scoped to assigned apps");
        self.table.set_app_scope(Some(apps.clone()));
        Ok(apps)
    }

    pub fn reply_workflow(&self) -> ReplyWorkflow {
        ReplyWorkflow::new(Arc::clone(&self.api), self.session.clone()).with_lookup(self.lookup)
    }

    pub fn store(&self) -> &FeedbackStore {
        &self.store
    }

    pub fn table(&self) -> &FeedbackTable {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut FeedbackTable {
        &mut self.table
    }
}

#[cfg(test)]
#[path = "tests/dashboard_tests.rs"]
mod tests;
