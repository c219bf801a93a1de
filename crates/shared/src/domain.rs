use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Record identity. The backend sends it as a string, older exports as a number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct FeedbackId(pub String);

impl FeedbackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FeedbackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for FeedbackId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(id) => Ok(Self(id)),
            Value::Number(id) => Ok(Self(id.to_string())),
            other => Err(de::Error::invalid_type(
                unexpected(&other),
                &"a string or numeric id",
            )),
        }
    }
}

fn unexpected(value: &Value) -> de::Unexpected<'_> {
    match value {
        Value::Null => de::Unexpected::Unit,
        Value::Bool(b) => de::Unexpected::Bool(*b),
        Value::Number(_) => de::Unexpected::Other("number"),
        Value::String(s) => de::Unexpected::Str(s),
        Value::Array(_) => de::Unexpected::Seq,
        Value::Object(_) => de::Unexpected::Map,
    }
}

/// Free-text field as the submitting clients send it: `null` reads as empty,
/// numbers and booleans as their literal text.
fn lenient_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(text) => text,
        other => other.to_string(),
    })
}

/// RFC 3339 text or epoch milliseconds; anything else reads as absent.
fn lenient_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(raw) => raw.parse().ok(),
        Value::Number(millis) => millis.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    })
}

fn lenient_rating<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<StarRating>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::Number(value) => value.as_f64().map(StarRating::Number),
        Value::String(text) => Some(StarRating::Text(text)),
        other => Some(StarRating::Text(other.to_string())),
    })
}

/// Star rating as submitted. The feedback form posts it as text, older
/// records carry a JSON number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StarRating {
    Number(f64),
    Text(String),
}

impl StarRating {
    /// Numeric value when the rating is a number or a numeric string.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(value) => Some(*value),
            Self::Text(raw) => raw.trim().parse::<f64>().ok(),
        }
    }
}

impl fmt::Display for StarRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(value) => write!(f, "{value}"),
            Self::Text(raw) => f.write_str(raw),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyRecord {
    #[serde(
        rename = "feedbackId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub feedback_id: Option<FeedbackId>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub email: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub subject: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub message: String,
    /// Absent when the backend stored none; such replies sort first.
    #[serde(
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireFeedbackRecord")]
pub struct FeedbackRecord {
    #[serde(rename = "_id")]
    pub id: FeedbackId,
    pub app_name: String,
    pub app_version: String,
    pub date: String,
    pub description: String,
    pub device_model: String,
    pub device_token: String,
    pub email: String,
    pub from_screen: String,
    pub like_dislike: String,
    pub os_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_star: Option<StarRating>,
    pub report: String,
    pub faq: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Reply thread, ascending by timestamp. Written only by aggregation.
    pub replies: Vec<ReplyRecord>,
    /// Reason the reply thread could not be fetched, if it failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Record as it arrives. Identity may come as `_id`, `id` or both (virtuals
/// enabled); `_id` wins. Replies and errors are never read from the wire.
#[derive(Deserialize)]
struct WireFeedbackRecord {
    #[serde(rename = "_id", default)]
    underscore_id: Option<FeedbackId>,
    #[serde(default)]
    id: Option<FeedbackId>,
    #[serde(default, deserialize_with = "lenient_text")]
    app_name: String,
    #[serde(default, deserialize_with = "lenient_text")]
    app_version: String,
    #[serde(default, deserialize_with = "lenient_text")]
    date: String,
    #[serde(default, deserialize_with = "lenient_text")]
    description: String,
    #[serde(default, deserialize_with = "lenient_text")]
    device_model: String,
    #[serde(default, deserialize_with = "lenient_text")]
    device_token: String,
    #[serde(default, deserialize_with = "lenient_text")]
    email: String,
    #[serde(default, deserialize_with = "lenient_text")]
    from_screen: String,
    #[serde(default, deserialize_with = "lenient_text")]
    like_dislike: String,
    #[serde(default, deserialize_with = "lenient_text")]
    os_version: String,
    #[serde(default, deserialize_with = "lenient_rating")]
    rate_star: Option<StarRating>,
    #[serde(default, deserialize_with = "lenient_text")]
    report: String,
    #[serde(default, deserialize_with = "lenient_text")]
    faq: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    timestamp: Option<DateTime<Utc>>,
}

impl TryFrom<WireFeedbackRecord> for FeedbackRecord {
    type Error = String;

    fn try_from(wire: WireFeedbackRecord) -> Result<Self, Self::Error> {
        let id = wire
            .underscore_id
            .or(wire.id)
            .ok_or_else(|| "missing field `_id`".to_string())?;
        Ok(Self {
            id,
            app_name: wire.app_name,
            app_version: wire.app_version,
            date: wire.date,
            description: wire.description,
            device_model: wire.device_model,
            device_token: wire.device_token,
            email: wire.email,
            from_screen: wire.from_screen,
            like_dislike: wire.like_dislike,
            os_version: wire.os_version,
            rate_star: wire.rate_star,
            report: wire.report,
            faq: wire.faq,
            timestamp: wire.timestamp,
            replies: Vec::new(),
            error: None,
        })
    }
}

impl FeedbackRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: FeedbackId::new(id),
            app_name: String::new(),
            app_version: String::new(),
            date: String::new(),
            description: String::new(),
            device_model: String::new(),
            device_token: String::new(),
            email: String::new(),
            from_screen: String::new(),
            like_dislike: String::new(),
            os_version: String::new(),
            rate_star: None,
            report: String::new(),
            faq: String::new(),
            timestamp: None,
            replies: Vec::new(),
            error: None,
        }
    }

    pub fn has_reply_error(&self) -> bool {
        self.error.is_some()
    }

    /// Labelled fields for a single-record detail view.
    pub fn detail_rows(&self) -> Vec<(&'static str, String)> {
        vec![
            ("Id", self.id.to_string()),
            ("App Version", self.app_version.clone()),
            ("App Name", self.app_name.clone()),
            ("Date", self.date.clone()),
            ("Description", self.description.clone()),
            ("Device Model", self.device_model.clone()),
            ("Device Token", self.device_token.clone()),
            ("Email", self.email.clone()),
            ("From Screen", self.from_screen.clone()),
            ("Like/Dislike", self.like_dislike.clone()),
            ("OS Version", self.os_version.clone()),
            (
                "Rate Star",
                self.rate_star
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_default(),
            ),
            ("Report", self.report.clone()),
            ("FAQ", self.faq.clone()),
            (
                "Timestamp",
                self.timestamp.map(format_timestamp).unwrap_or_default(),
            ),
        ]
    }
}

/// Renders a timestamp the way the backend serializes it (`...T..:..:..sssZ`).
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_backend_record_with_underscore_id_and_text_rating() {
        let record: FeedbackRecord = serde_json::from_value(serde_json::json!({
            "_id": "65f0",
            "app_name": "Notes",
            "rate_star": "4",
            "timestamp": "2024-03-01T10:00:00.000Z",
            "__v": 0
        }))
        .expect("decode");

        assert_eq!(record.id, FeedbackId::new("65f0"));
        assert_eq!(record.rate_star.as_ref().and_then(StarRating::as_number), Some(4.0));
        assert!(record.replies.is_empty());
        assert!(record.error.is_none());
        assert_eq!(record.email, "");
    }

    #[test]
    fn wire_replies_and_error_are_ignored() {
        let record: FeedbackRecord = serde_json::from_value(serde_json::json!({
            "id": "1",
            "replies": [{"message": "x", "timestamp": "2024-03-01T10:00:00Z"}],
            "error": "nope"
        }))
        .expect("decode");

        assert!(record.replies.is_empty());
        assert!(record.error.is_none());
    }

    #[test]
    fn non_numeric_text_rating_has_no_number() {
        assert_eq!(StarRating::Text("great".into()).as_number(), None);
        assert_eq!(StarRating::Number(3.0).to_string(), "3");
    }

    #[test]
    fn detail_rows_render_backend_timestamp_format() {
        let mut record = FeedbackRecord::new("abc");
        record.timestamp = Some("2024-03-01T10:00:00Z".parse().expect("timestamp"));
        let rows = record.detail_rows();
        assert_eq!(rows.first(), Some(&("Id", "abc".to_string())));
        assert_eq!(
            rows.last(),
            Some(&("Timestamp", "2024-03-01T10:00:00.000Z".to_string()))
        );
    }

    #[test]
    fn numeric_identity_and_non_string_fields_are_read_as_text() {
        let record: FeedbackRecord = serde_json::from_value(serde_json::json!({
            "id": 1,
            "app_version": 2.1,
            "like_dislike": true,
            "faq": null,
            "rate_star": 5
        }))
        .expect("decode");

        assert_eq!(record.id, FeedbackId::new("1"));
        assert_eq!(record.app_version, "2.1");
        assert_eq!(record.like_dislike, "true");
        assert_eq!(record.faq, "");
        assert_eq!(record.rate_star, Some(StarRating::Number(5.0)));
    }

    #[test]
    fn underscore_id_wins_when_both_identities_are_present() {
        let record: FeedbackRecord = serde_json::from_value(serde_json::json!({
            "_id": "65f0",
            "id": "virtual"
        }))
        .expect("decode");
        assert_eq!(record.id, FeedbackId::new("65f0"));

        let same: FeedbackRecord =
            serde_json::from_value(serde_json::json!({"_id": "a", "id": "a"})).expect("decode");
        assert_eq!(same.id, FeedbackId::new("a"));
    }

    #[test]
    fn record_without_any_identity_is_rejected() {
        let err = serde_json::from_value::<FeedbackRecord>(serde_json::json!({"app_name": "x"}))
            .expect_err("must fail");
        assert!(err.to_string().contains("_id"));
        assert!(
            serde_json::from_value::<FeedbackRecord>(serde_json::json!({"_id": true})).is_err()
        );
    }

    #[test]
    fn reply_without_timestamp_still_decodes() {
        let reply: ReplyRecord = serde_json::from_value(serde_json::json!({
            "feedbackId": 7,
            "message": "no clock"
        }))
        .expect("decode");

        assert_eq!(reply.feedback_id, Some(FeedbackId::new("7")));
        assert_eq!(reply.timestamp, None);

        let stamped: ReplyRecord = serde_json::from_value(serde_json::json!({
            "message": "epoch",
            "timestamp": 1_709_287_200_000_i64
        }))
        .expect("decode");
        assert_eq!(
            stamped.timestamp.map(format_timestamp).as_deref(),
            Some("2024-03-01T10:00:00.000Z")
        );
    }
}
