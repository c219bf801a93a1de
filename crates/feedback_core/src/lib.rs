use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use shared::{
    domain::{FeedbackId, FeedbackRecord},
    protocol::{
        AssignedAppsResponse, FeedbackListEnvelope, ReplyListEnvelope, SendReplyRequest,
        SendReplyResponse,
    },
};
use tracing::debug;
use url::Url;

pub mod aggregator;
pub mod dashboard;
pub mod error;
pub mod store;
pub mod view;
pub mod workflow;

pub use aggregator::{AggregationReport, ReplyAggregator};
pub use dashboard::{Dashboard, DashboardView};
pub use error::{FetchError, SessionError, ValidationError, WorkflowError};
pub use store::FeedbackStore;
pub use view::{FeedbackField, FeedbackTable, FieldValue, SortDirection};
pub use workflow::{Notification, ReplyLookup, ReplyWorkflow, WorkflowEvent, WorkflowState};

const FEEDBACK_LIST_PATH: &[&str] = &["notepad", "get_feedback"];
const REPLIES_BY_FEEDBACK_PATH: &[&str] = &["reply", "replies-by-feedback"];
const REPLIES_BY_EMAIL_PATH: &[&str] = &["reply", "replies-by-email"];
const SEND_REPLY_PATH: &[&str] = &["reply", "send-reply"];
const ASSIGNED_APPS_PATH: &[&str] = &["admin", "check-assigned-apps"];

/// Backend location and credentials, handed to every component explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    base_url: Url,
    bearer_token: Option<String>,
}

impl Session {
    pub fn new(base_url: &str) -> Result<Self, SessionError> {
        let parsed = Url::parse(base_url.trim()).map_err(|err| SessionError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: err.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") || parsed.cannot_be_a_base() {
            return Err(SessionError::InvalidBaseUrl {
                url: base_url.to_string(),
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }
        Ok(Self {
            base_url: parsed,
            bearer_token: None,
        })
    }

    /// Blank tokens are treated as no token.
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.bearer_token = (!token.trim().is_empty()).then_some(token);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn bearer_token(&self) -> Option<&str> {
        self.bearer_token.as_deref()
    }

    /// Appends percent-encoded path segments to the base URL.
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        url.set_query(None);
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty();
            path.extend(segments);
        }
        url
    }
}

/// HTTP contract the feedback dashboard consumes.
#[async_trait]
pub trait FeedbackApi: Send + Sync {
    async fn list_feedback(&self, session: &Session) -> Result<Vec<FeedbackRecord>, FetchError>;
    async fn replies_by_feedback(
        &self,
        session: &Session,
        feedback_id: &FeedbackId,
    ) -> Result<ReplyListEnvelope, FetchError>;
    async fn replies_by_email(
        &self,
        session: &Session,
        email: &str,
    ) -> Result<ReplyListEnvelope, FetchError>;
    async fn send_reply(
        &self,
        session: &Session,
        request: &SendReplyRequest,
    ) -> Result<SendReplyResponse, FetchError>;
    async fn assigned_apps(&self, session: &Session, email: &str)
        -> Result<Vec<String>, FetchError>;
}

#[derive(Debug, Clone, Default)]
pub struct HttpFeedbackApi {
    http: Client,
}

impl HttpFeedbackApi {
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    pub fn with_client(http: Client) -> Self {
        Self { http }
    }

    fn authorized(&self, builder: RequestBuilder, session: &Session) -> RequestBuilder {
        match session.bearer_token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        session: &Session,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<T, FetchError> {
        let url = session.endpoint(segments);
        let endpoint = url.path().to_string();
        debug!(endpoint = %endpoint, "feedback api: GET");
        let request = self.authorized(self.http.get(url), session).query(query);
        let response = request
            .send()
            .await
            .map_err(|err| FetchError::from_reqwest(&endpoint, err))?
            .error_for_status()
            .map_err(|err| FetchError::from_reqwest(&endpoint, err))?;
        response
            .json()
            .await
            .map_err(|err| FetchError::from_reqwest(&endpoint, err))
    }
}

#[async_trait]
impl FeedbackApi for HttpFeedbackApi {
    async fn list_feedback(&self, session: &Session) -> Result<Vec<FeedbackRecord>, FetchError> {
        let envelope: FeedbackListEnvelope = self.get_json(session, FEEDBACK_LIST_PATH, &[]).await?;
        envelope
            .into_records()
            .map_err(|source| FetchError::UnexpectedFormat {
                endpoint: session.endpoint(FEEDBACK_LIST_PATH).path().to_string(),
                source,
            })
    }

    async fn replies_by_feedback(
        &self,
        session: &Session,
        feedback_id: &FeedbackId,
    ) -> Result<ReplyListEnvelope, FetchError> {
        self.get_json(
            session,
            REPLIES_BY_FEEDBACK_PATH,
            &[("feedbackId", feedback_id.as_str())],
        )
        .await
    }

    async fn replies_by_email(
        &self,
        session: &Session,
        email: &str,
    ) -> Result<ReplyListEnvelope, FetchError> {
        self.get_json(session, REPLIES_BY_EMAIL_PATH, &[("email", email)])
            .await
    }

    async fn send_reply(
        &self,
        session: &Session,
        request: &SendReplyRequest,
    ) -> Result<SendReplyResponse, FetchError> {
        let url = session.endpoint(SEND_REPLY_PATH);
        let endpoint = url.path().to_string();
        debug!(
            endpoint = %endpoint,
            feedback_id = %request.feedback_id,
            "feedback api: POST reply"
        );
        self.authorized(self.http.post(url), session)
            .json(request)
            .send()
            .await
            .map_err(|err| FetchError::from_reqwest(&endpoint, err))?
            .error_for_status()
            .map_err(|err| FetchError::from_reqwest(&endpoint, err))?
            .json()
            .await
            .map_err(|err| FetchError::from_reqwest(&endpoint, err))
    }

    async fn assigned_apps(
        &self,
        session: &Session,
        email: &str,
    ) -> Result<Vec<String>, FetchError> {
        let mut segments = ASSIGNED_APPS_PATH.to_vec();
        segments.push(email);
        let response: AssignedAppsResponse = self.get_json(session, &segments, &[]).await?;
        Ok(response.assigned_apps)
    }
}

/// Sorts a reply thread ascending by timestamp, keeping arrival order for ties.
pub(crate) fn sort_thread(replies: &mut [shared::domain::ReplyRecord]) {
    replies.sort_by_key(|reply| reply.timestamp);
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
