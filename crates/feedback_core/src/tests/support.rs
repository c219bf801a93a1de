use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use shared::{
    domain::{FeedbackId, FeedbackRecord, ReplyRecord},
    protocol::{ReplyListEnvelope, SendReplyRequest, SendReplyResponse},
};
use tokio::sync::Mutex;

use crate::{FeedbackApi, FetchError, Session};

pub(crate) fn session() -> Session {
    Session::new("http://feedback.test/api")
        .expect("session")
        .with_bearer_token("test-token")
}

pub(crate) fn record(id: &str, app_name: &str, email: &str) -> FeedbackRecord {
    let mut record = FeedbackRecord::new(id);
    record.app_name = app_name.to_string();
    record.email = email.to_string();
    record
}

pub(crate) fn reply(message: &str, timestamp: &str) -> ReplyRecord {
    ReplyRecord {
        feedback_id: None,
        email: String::new(),
        subject: String::new(),
        message: message.to_string(),
        timestamp: Some(timestamp.parse().expect("timestamp")),
    }
}

pub(crate) fn fetch_failure(status: u16) -> FetchError {
    FetchError::Status {
        endpoint: "/api/reply/replies-by-feedback".to_string(),
        status,
    }
}

/// In-memory backend with per-record thread responses and latency.
pub(crate) struct FakeApi {
    pub feedback: Result<Vec<FeedbackRecord>, FetchError>,
    pub threads: HashMap<FeedbackId, Result<ReplyListEnvelope, FetchError>>,
    pub email_threads: HashMap<String, Result<ReplyListEnvelope, FetchError>>,
    pub delays: HashMap<FeedbackId, Duration>,
    pub send_response: Result<SendReplyResponse, FetchError>,
    pub assigned: Vec<String>,
    pub list_delay: Duration,
    pub send_delay: Duration,
    pub sent: Arc<Mutex<Vec<SendReplyRequest>>>,
    pub thread_calls: Arc<Mutex<Vec<FeedbackId>>>,
    pub seen_tokens: Arc<Mutex<Vec<Option<String>>>>,
    in_flight: AtomicUsize,
    pub max_in_flight: Arc<AtomicUsize>,
}

impl FakeApi {
    pub(crate) fn new(feedback: Vec<FeedbackRecord>) -> Self {
        Self {
            feedback: Ok(feedback),
            threads: HashMap::new(),
            email_threads: HashMap::new(),
            delays: HashMap::new(),
            send_response: Ok(SendReplyResponse {
                message: Some("Reply sent".to_string()),
            }),
            assigned: Vec::new(),
            list_delay: Duration::ZERO,
            send_delay: Duration::ZERO,
            sent: Arc::new(Mutex::new(Vec::new())),
            thread_calls: Arc::new(Mutex::new(Vec::new())),
            seen_tokens: Arc::new(Mutex::new(Vec::new())),
            in_flight: AtomicUsize::new(0),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn failing_list(err: FetchError) -> Self {
        let mut api = Self::new(Vec::new());
        api.feedback = Err(err);
        api
    }

    pub(crate) fn with_thread(mut self, id: &str, replies: Vec<ReplyRecord>) -> Self {
        self.threads.insert(
            FeedbackId::new(id),
            Ok(ReplyListEnvelope {
                success: true,
                data: replies,
            }),
        );
        self
    }

    pub(crate) fn with_thread_error(mut self, id: &str, err: FetchError) -> Self {
        self.threads.insert(FeedbackId::new(id), Err(err));
        self
    }

    pub(crate) fn with_email_thread(mut self, email: &str, envelope: ReplyListEnvelope) -> Self {
        self.email_threads.insert(email.to_string(), Ok(envelope));
        self
    }

    pub(crate) fn with_delay(mut self, id: &str, delay: Duration) -> Self {
        self.delays.insert(FeedbackId::new(id), delay);
        self
    }

    pub(crate) fn with_send_response(
        mut self,
        response: Result<SendReplyResponse, FetchError>,
    ) -> Self {
        self.send_response = response;
        self
    }
}

#[async_trait]
impl FeedbackApi for FakeApi {
    async fn list_feedback(&self, session: &Session) -> Result<Vec<FeedbackRecord>, FetchError> {
        self.seen_tokens
            .lock()
            .await
            .push(session.bearer_token().map(ToString::to_string));
        if !self.list_delay.is_zero() {
            tokio::time::sleep(self.list_delay).await;
        }
        self.feedback.clone()
    }

    async fn replies_by_feedback(
        &self,
        _session: &Session,
        feedback_id: &FeedbackId,
    ) -> Result<ReplyListEnvelope, FetchError> {
        self.thread_calls.lock().await.push(feedback_id.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delays.get(feedback_id) {
            tokio::time::sleep(*delay).await;
        } else {
            tokio::task::yield_now().await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.threads
            .get(feedback_id)
            .cloned()
            .unwrap_or_else(|| Ok(ReplyListEnvelope::default()))
    }

    async fn replies_by_email(
        &self,
        _session: &Session,
        email: &str,
    ) -> Result<ReplyListEnvelope, FetchError> {
        self.email_threads
            .get(email)
            .cloned()
            .unwrap_or_else(|| Ok(ReplyListEnvelope::default()))
    }

    async fn send_reply(
        &self,
        _session: &Session,
        request: &SendReplyRequest,
    ) -> Result<SendReplyResponse, FetchError> {
        self.sent.lock().await.push(request.clone());
        if !self.send_delay.is_zero() {
            tokio::time::sleep(self.send_delay).await;
        }
        self.send_response.clone()
    }

    async fn assigned_apps(
        &self,
        _session: &Session,
        _email: &str,
    ) -> Result<Vec<String>, FetchError> {
        Ok(self.assigned.clone())
    }
}
