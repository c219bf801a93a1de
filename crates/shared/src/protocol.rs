use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    domain::{FeedbackId, FeedbackRecord, ReplyRecord},
    error::EnvelopeError,
};

/// Subject line every admin reply is sent with.
pub const REPLY_SUBJECT: &str = "Feedback Reply";

/// `GET /notepad/get_feedback` body. `data` is kept raw so a missing or
/// non-array collection can be told apart from a malformed record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedbackListEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl FeedbackListEnvelope {
    pub fn from_records(records: &[FeedbackRecord]) -> Self {
        Self {
            data: serde_json::to_value(records).ok(),
        }
    }

    pub fn into_records(self) -> Result<Vec<FeedbackRecord>, EnvelopeError> {
        match self.data {
            None | Some(Value::Null) => Err(EnvelopeError::MissingData),
            Some(data @ Value::Array(_)) => serde_json::from_value(data)
                .map_err(|err| EnvelopeError::MalformedRecord(err.to_string())),
            Some(_) => Err(EnvelopeError::NotACollection),
        }
    }
}

/// Body of both reply lookups (`replies-by-feedback` and `replies-by-email`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplyListEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Vec<ReplyRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReplyRequest {
    pub email: String,
    pub subject: String,
    pub message: String,
    #[serde(rename = "feedbackId")]
    pub feedback_id: FeedbackId,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendReplyResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// `GET /admin/check-assigned-apps/<email>` body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssignedAppsResponse {
    #[serde(rename = "assignedApps", default)]
    pub assigned_apps: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn list_envelope_requires_data_collection() {
        let missing: FeedbackListEnvelope = serde_json::from_value(json!({})).expect("decode");
        assert_eq!(missing.into_records(), Err(EnvelopeError::MissingData));

        let object: FeedbackListEnvelope =
            serde_json::from_value(json!({"data": {"_id": "1"}})).expect("decode");
        assert_eq!(object.into_records(), Err(EnvelopeError::NotACollection));

        let records: FeedbackListEnvelope =
            serde_json::from_value(json!({"data": [{"_id": "1"}, {"_id": "2"}]}))
                .expect("decode");
        let records = records.into_records().expect("records");
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].id, FeedbackId::new("2"));
    }

    #[test]
    fn record_without_identity_is_malformed() {
        let envelope: FeedbackListEnvelope =
            serde_json::from_value(json!({"data": [{"app_name": "x"}]})).expect("decode");
        assert!(matches!(
            envelope.into_records(),
            Err(EnvelopeError::MalformedRecord(_))
        ));
    }

    #[test]
    fn unusual_records_do_not_sink_the_list() {
        let envelope: FeedbackListEnvelope = serde_json::from_value(json!({"data": [
            {"_id": "1"},
            {"_id": "2", "faq": null},
            {"_id": "3", "id": "3", "app_version": 2.1},
            {"id": 4, "like_dislike": true}
        ]}))
        .expect("decode");

        let records = envelope.into_records().expect("records");
        let ids = records.iter().map(|r| r.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["1", "2", "3", "4"]);
        assert_eq!(records[2].app_version, "2.1");
    }

    #[test]
    fn reply_thread_keeps_replies_without_timestamp() {
        let envelope: ReplyListEnvelope = serde_json::from_value(json!({
            "success": true,
            "data": [
                {"feedbackId": "1", "message": "dated", "timestamp": "2024-03-01T10:00:00Z"},
                {"feedbackId": "1", "message": "undated"}
            ]
        }))
        .expect("decode");

        assert_eq!(envelope.data.len(), 2);
        assert!(envelope.data[1].timestamp.is_none());
    }

    #[test]
    fn send_reply_request_uses_camel_case_feedback_id() {
        let request = SendReplyRequest {
            email: "a@x.com".into(),
            subject: REPLY_SUBJECT.into(),
            message: "thanks".into(),
            feedback_id: FeedbackId::new("42"),
        };
        let value = serde_json::to_value(&request).expect("encode");
        assert_eq!(
            value,
            json!({
                "email": "a@x.com",
                "subject": "Feedback Reply",
                "message": "thanks",
                "feedbackId": "42"
            })
        );
    }
}
