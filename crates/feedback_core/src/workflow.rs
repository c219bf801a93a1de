//! Reply composition and thread browsing for one record at a time.

use std::sync::Arc;

use shared::{
    domain::{FeedbackRecord, ReplyRecord},
    protocol::{SendReplyRequest, REPLY_SUBJECT},
};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::{
    aggregator::attach_thread, sort_thread, FeedbackApi, Session, ValidationError, WorkflowError,
};

pub const REPLY_SENT: &str = "Reply sent successfully!";
pub const REPLY_NOT_ACCEPTED: &str = "Failed to send reply.";
pub const REPLY_SEND_ERROR: &str = "Error sending reply.";
pub const NO_REPLIES_FOUND: &str = "No replies found for this user.";
pub const REPLY_FETCH_ERROR: &str = "Error fetching replies.";

/// Which endpoint `view_replies` reads a thread from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplyLookup {
    #[default]
    ByFeedback,
    /// Older endpoint keyed by the submitter's email.
    ByEmail,
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowState {
    Idle,
    Composing {
        record: FeedbackRecord,
        message: String,
    },
    Submitting {
        record: FeedbackRecord,
    },
    ViewingReplies {
        record: FeedbackRecord,
        replies: Vec<ReplyRecord>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowPhase {
    Idle,
    Composing,
    Submitting,
    ViewingReplies,
}

impl WorkflowPhase {
    fn describe(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Composing => "composing",
            Self::Submitting => "submitting",
            Self::ViewingReplies => "viewing replies",
        }
    }
}

impl WorkflowState {
    pub fn phase(&self) -> WorkflowPhase {
        match self {
            Self::Idle => WorkflowPhase::Idle,
            Self::Composing { .. } => WorkflowPhase::Composing,
            Self::Submitting { .. } => WorkflowPhase::Submitting,
            Self::ViewingReplies { .. } => WorkflowPhase::ViewingReplies,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Failure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub text: String,
}

impl Notification {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Success,
            text: text.into(),
        }
    }

    pub fn failure(text: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Failure,
            text: text.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.kind == NotificationKind::Success
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowEvent {
    StateChanged(WorkflowPhase),
    Notification(Notification),
}

pub struct ReplyWorkflow {
    api: Arc<dyn FeedbackApi>,
    session: Session,
    lookup: ReplyLookup,
    state: WorkflowState,
    events: broadcast::Sender<WorkflowEvent>,
}

impl ReplyWorkflow {
    pub fn new(api: Arc<dyn FeedbackApi>, session: Session) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            api,
            session,
            lookup: ReplyLookup::default(),
            state: WorkflowState::Idle,
            events,
        }
    }

    pub fn with_lookup(mut self, lookup: ReplyLookup) -> Self {
        self.lookup = lookup;
        self
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.events.subscribe()
    }

    pub fn open_reply(&mut self, record: FeedbackRecord) -> Result<(), WorkflowError> {
        self.require(
            "open a reply",
            &[WorkflowPhase::Idle, WorkflowPhase::ViewingReplies],
        )?;
        self.transition(WorkflowState::Composing {
            record,
            message: String::new(),
        });
        Ok(())
    }

    pub fn edit_message(&mut self, text: impl Into<String>) -> Result<(), WorkflowError> {
        match &mut self.state {
            WorkflowState::Composing { message, .. } => {
                *message = text.into();
                Ok(())
            }
            other => Err(WorkflowError::InvalidTransition {
                action: "edit the reply",
                state: other.phase().describe(),
            }),
        }
    }

    /// Sends the composed reply. Blank messages are rejected without a
    /// request and leave the draft open; any other outcome returns to idle,
    /// including dropping the future while the request is in flight.
    pub async fn submit(&mut self) -> Result<Notification, WorkflowError> {
        let (record, message) = match &self.state {
            WorkflowState::Composing { record, message } => (record.clone(), message.clone()),
            other => {
                return Err(WorkflowError::InvalidTransition {
                    action: "submit a reply",
                    state: other.phase().describe(),
                })
            }
        };
        if message.trim().is_empty() {
            return Err(ValidationError::EmptyMessage.into());
        }

        let request = SendReplyRequest {
            email: record.email.clone(),
            subject: REPLY_SUBJECT.to_string(),
            message,
            feedback_id: record.id.clone(),
        };
        self.transition(WorkflowState::Submitting { record });

        let sent = {
            let _submitting = SubmittingGuard {
                state: &mut self.state,
                events: &self.events,
            };
            self.api.send_reply(&self.session, &request).await
        };

        let notification = match sent {
            Ok(response) if response.message.as_deref().is_some_and(|m| !m.is_empty()) => {
                info!(feedback_id = %request.feedback_id, "reply sent");
                Notification::success(REPLY_SENT)
            }
            Ok(_) => {
                warn!(feedback_id = %request.feedback_id, "reply not acknowledged");
                Notification::failure(REPLY_NOT_ACCEPTED)
            }
            Err(err) => {
                warn!(feedback_id = %request.feedback_id, error = %err, "reply send failed");
                Notification::failure(REPLY_SEND_ERROR)
            }
        };

        self.notify(notification.clone());
        Ok(notification)
    }

    /// Loads a record's thread. Returns the notification raised when the
    /// thread could not be shown.
    pub async fn view_replies(
        &mut self,
        record: FeedbackRecord,
    ) -> Result<Option<Notification>, WorkflowError> {
        self.require(
            "view replies",
            &[WorkflowPhase::Idle, WorkflowPhase::ViewingReplies],
        )?;

        let fetched = match self.lookup {
            ReplyLookup::ByFeedback => self.api.replies_by_feedback(&self.session, &record.id).await,
            ReplyLookup::ByEmail => self.api.replies_by_email(&self.session, &record.email).await,
        };

        let failure = match fetched {
            Ok(envelope) if envelope.success => {
                let replies = match self.lookup {
                    ReplyLookup::ByFeedback => attach_thread(&record.id, envelope.data),
                    ReplyLookup::ByEmail => {
                        let mut replies = envelope.data;
                        sort_thread(&mut replies);
                        replies
                    }
                };
                self.transition(WorkflowState::ViewingReplies { record, replies });
                return Ok(None);
            }
            Ok(_) => Notification::failure(NO_REPLIES_FOUND),
            Err(err) => {
                warn!(feedback_id = %record.id, error = %err, "reply thread fetch failed");
                Notification::failure(REPLY_FETCH_ERROR)
            }
        };

        self.transition(WorkflowState::Idle);
        self.notify(failure.clone());
        Ok(Some(failure))
    }

    /// Returns to idle from any state, discarding an unsent draft.
    pub fn close(&mut self) {
        if self.state != WorkflowState::Idle {
            self.transition(WorkflowState::Idle);
        }
    }

    fn require(
        &self,
        action: &'static str,
        allowed: &[WorkflowPhase],
    ) -> Result<(), WorkflowError> {
        let phase = self.state.phase();
        if allowed.contains(&phase) {
            Ok(())
        } else {
            Err(WorkflowError::InvalidTransition {
                action,
                state: phase.describe(),
            })
        }
    }

    fn transition(&mut self, next: WorkflowState) {
        let phase = next.phase();
        self.state = next;
        let _ = self.events.send(WorkflowEvent::StateChanged(phase));
    }

    fn notify(&self, notification: Notification) {
        let _ = self.events.send(WorkflowEvent::Notification(notification));
    }
}

/// Leaves `Submitting` for `Idle` when the send settles or is abandoned.
struct SubmittingGuard<'a> {
    state: &'a mut WorkflowState,
    events: &'a broadcast::Sender<WorkflowEvent>,
}

impl Drop for SubmittingGuard<'_> {
    fn drop(&mut self) {
        if self.state.phase() == WorkflowPhase::Submitting {
            *self.state = WorkflowState::Idle;
            let _ = self
                .events
                .send(WorkflowEvent::StateChanged(WorkflowPhase::Idle));
        }
    }
}

#[cfg(test)]
#[path = "tests/workflow_tests.rs"]
mod tests;
