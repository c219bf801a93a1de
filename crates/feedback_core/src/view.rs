//! Searchable, sortable projection over aggregated feedback.

use std::{borrow::Cow, cmp::Ordering, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use shared::domain::{format_timestamp, FeedbackRecord, StarRating};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedbackField {
    Id,
    AppName,
    AppVersion,
    Date,
    Description,
    DeviceModel,
    DeviceToken,
    Email,
    FromScreen,
    LikeDislike,
    OsVersion,
    RateStar,
    Report,
    Faq,
    Timestamp,
}

/// A field's value as seen by sort. Kinds order `Absent < Number < Time < Text`.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue<'a> {
    Absent,
    Number(f64),
    Time(DateTime<Utc>),
    Text(&'a str),
}

impl FieldValue<'_> {
    fn rank(&self) -> u8 {
        match self {
            Self::Absent => 0,
            Self::Number(_) => 1,
            Self::Time(_) => 2,
            Self::Text(_) => 3,
        }
    }

    pub fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::Time(a), Self::Time(b)) => a.cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl FeedbackField {
    pub const ALL: [FeedbackField; 15] = [
        Self::Id,
        Self::AppName,
        Self::AppVersion,
        Self::Date,
        Self::Description,
        Self::DeviceModel,
        Self::DeviceToken,
        Self::Email,
        Self::FromScreen,
        Self::LikeDislike,
        Self::OsVersion,
        Self::RateStar,
        Self::Report,
        Self::Faq,
        Self::Timestamp,
    ];

    /// Columns the feedback table offers for sorting.
    pub const SORTABLE_COLUMNS: [FeedbackField; 6] = [
        Self::AppVersion,
        Self::AppName,
        Self::Date,
        Self::Description,
        Self::Email,
        Self::RateStar,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Id => "_id",
            Self::AppName => "app_name",
            Self::AppVersion => "app_version",
            Self::Date => "date",
            Self::Description => "description",
            Self::DeviceModel => "device_model",
            Self::DeviceToken => "device_token",
            Self::Email => "email",
            Self::FromScreen => "from_screen",
            Self::LikeDislike => "like_dislike",
            Self::OsVersion => "os_version",
            Self::RateStar => "rate_star",
            Self::Report => "report",
            Self::Faq => "faq",
            Self::Timestamp => "timestamp",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Id => "Id",
            Self::AppName => "App Name",
            Self::AppVersion => "App Version",
            Self::Date => "Date",
            Self::Description => "Description",
            Self::DeviceModel => "Device Model",
            Self::DeviceToken => "Device Token",
            Self::Email => "Email",
            Self::FromScreen => "From Screen",
            Self::LikeDislike => "Like/Dislike",
            Self::OsVersion => "OS Version",
            Self::RateStar => "Rate Star",
            Self::Report => "Report",
            Self::Faq => "FAQ",
            Self::Timestamp => "Timestamp",
        }
    }

    pub fn value(self, record: &FeedbackRecord) -> FieldValue<'_> {
        match self {
            Self::RateStar => match &record.rate_star {
                None => FieldValue::Absent,
                Some(StarRating::Number(value)) => FieldValue::Number(*value),
                Some(rating @ StarRating::Text(raw)) => rating
                    .as_number()
                    .map_or(FieldValue::Text(raw), FieldValue::Number),
            },
            Self::Timestamp => record
                .timestamp
                .map_or(FieldValue::Absent, FieldValue::Time),
            text => FieldValue::Text(text.text(record).unwrap_or_default()),
        }
    }

    /// The field rendered the way search sees it.
    pub fn search_text(self, record: &FeedbackRecord) -> Option<Cow<'_, str>> {
        match self {
            Self::RateStar => record
                .rate_star
                .as_ref()
                .map(|rating| Cow::Owned(rating.to_string())),
            Self::Timestamp => record
                .timestamp
                .map(|timestamp| Cow::Owned(format_timestamp(timestamp))),
            text => text.text(record).map(Cow::Borrowed),
        }
    }

    fn text(self, record: &FeedbackRecord) -> Option<&str> {
        let text = match self {
            Self::Id => record.id.as_str(),
            Self::AppName => &record.app_name,
            Self::AppVersion => &record.app_version,
            Self::Date => &record.date,
            Self::Description => &record.description,
            Self::DeviceModel => &record.device_model,
            Self::DeviceToken => &record.device_token,
            Self::Email => &record.email,
            Self::FromScreen => &record.from_screen,
            Self::LikeDislike => &record.like_dislike,
            Self::OsVersion => &record.os_version,
            Self::Report => &record.report,
            Self::Faq => &record.faq,
            Self::RateStar | Self::Timestamp => return None,
        };
        Some(text)
    }

    pub fn compare(self, a: &FeedbackRecord, b: &FeedbackRecord) -> Ordering {
        self.value(a).compare(&self.value(b))
    }
}

impl fmt::Display for FeedbackField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownField(pub String);

impl fmt::Display for UnknownField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown feedback field '{}'", self.0)
    }
}

impl std::error::Error for UnknownField {}

impl FromStr for FeedbackField {
    type Err = UnknownField;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let wanted = raw.trim();
        Self::ALL
            .into_iter()
            .find(|field| field.name() == wanted || (wanted == "id" && *field == Self::Id))
            .ok_or_else(|| UnknownField(raw.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }
}

pub fn matches_query(record: &FeedbackRecord, lowered_query: &str) -> bool {
    FeedbackField::ALL.into_iter().any(|field| {
        field
            .search_text(record)
            .is_some_and(|text| text.to_lowercase().contains(lowered_query))
    })
}

/// Case-insensitive substring filter over top-level fields. Reply text is not
/// searched. Relative order of `records` is kept.
pub fn search(records: &[FeedbackRecord], query: &str) -> Vec<FeedbackRecord> {
    let lowered = query.to_lowercase();
    records
        .iter()
        .filter(|record| matches_query(record, &lowered))
        .cloned()
        .collect()
}

/// Stable sort on one field.
pub fn sort(
    records: &[FeedbackRecord],
    field: FeedbackField,
    direction: SortDirection,
) -> Vec<FeedbackRecord> {
    let mut sorted = records.to_vec();
    match direction {
        SortDirection::Ascending => sorted.sort_by(|a, b| field.compare(a, b)),
        SortDirection::Descending => sorted.sort_by(|a, b| field.compare(b, a)),
    }
    sorted
}

/// Table state: the canonical source plus the snapshot currently shown.
///
/// Search always starts again from the canonical source, so a search issued
/// after a sort drops the sorted order. Sort works on whatever is shown.
#[derive(Debug, Clone, Default)]
pub struct FeedbackTable {
    source: Vec<FeedbackRecord>,
    displayed: Vec<FeedbackRecord>,
    sort_state: Option<(FeedbackField, SortDirection)>,
    query: String,
    app_scope: Option<Vec<String>>,
}

impl FeedbackTable {
    pub fn new(source: Vec<FeedbackRecord>) -> Self {
        let mut table = Self {
            source,
            ..Self::default()
        };
        table.recompute();
        table
    }

    /// Restricts the table to feedback for the given apps. `None` shows all.
    pub fn with_app_scope(mut self, apps: Option<Vec<String>>) -> Self {
        self.set_app_scope(apps);
        self
    }

    pub fn set_app_scope(&mut self, apps: Option<Vec<String>>) {
        self.app_scope = apps;
        self.recompute();
    }

    /// Swaps in a fresh source, keeping the query and dropping sort state.
    pub fn replace_source(&mut self, source: Vec<FeedbackRecord>) {
        self.source = source;
        self.sort_state = None;
        self.recompute();
    }

    pub fn search(&mut self, query: &str) -> &[FeedbackRecord] {
        self.query = query.to_string();
        self.recompute();
        &self.displayed
    }

    /// Same field toggles ascending/descending, a new field starts ascending.
    pub fn sort_by(&mut self, field: FeedbackField) -> &[FeedbackRecord] {
        let direction = match self.sort_state {
            Some((current, SortDirection::Ascending)) if current == field => {
                SortDirection::Descending
            }
            _ => SortDirection::Ascending,
        };
        self.sort_state = Some((field, direction));
        self.displayed = sort(&self.displayed, field, direction);
        &self.displayed
    }

    pub fn displayed(&self) -> &[FeedbackRecord] {
        &self.displayed
    }

    pub fn source(&self) -> &[FeedbackRecord] {
        &self.source
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn sort_state(&self) -> Option<(FeedbackField, SortDirection)> {
        self.sort_state
    }

    /// Looks up a record by id among those the app scope allows, ignoring
    /// the current search.
    pub fn find(&self, id: &str) -> Option<&FeedbackRecord> {
        self.source
            .iter()
            .find(|record| record.id.as_str() == id && self.in_scope(record))
    }

    fn in_scope(&self, record: &FeedbackRecord) -> bool {
        self.app_scope
            .as_ref()
            .map_or(true, |apps| apps.iter().any(|app| *app == record.app_name))
    }

    fn recompute(&mut self) {
        let lowered = self.query.to_lowercase();
        self.displayed = self
            .source
            .iter()
            .filter(|record| self.in_scope(record) && matches_query(record, &lowered))
            .cloned()
            .collect();
    }
}

#[cfg(test)]
#[path = "tests/view_tests.rs"]
mod tests;
