use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// One tracked session, keyed by user id.
///
/// Timestamps are stored as ISO-8601 text rather than parsed dates: the
/// persisted file may contain values written by other tooling, and an
/// unparseable timestamp must survive a load/save round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub user_id: String,
    pub session_start: String,
    #[serde(default)]
    pub session_end: Option<String>,
    #[serde(default)]
    pub age: Option<f64>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub cancer_type: Option<String>,
    #[serde(default)]
    pub cancer_stage: Option<String>,
    #[serde(default)]
    pub comorbidities: Vec<String>,
    #[serde(default)]
    pub prior_treatments: Vec<String>,
    #[serde(default)]
    pub messages_sent: u64,
    #[serde(default)]
    pub trials_found: u64,
    /// Derived on session end: `session_end - session_start` when both parse.
    #[serde(default)]
    pub total_duration_seconds: Option<f64>,
}

impl SessionRecord {
    /// Create a fresh record with all optional fields unset and counters at zero.
    pub fn new(user_id: impl Into<String>, session_start: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            session_start: session_start.into(),
            session_end: None,
            age: None,
            gender: None,
            location: None,
            cancer_type: None,
            cancer_stage: None,
            comorbidities: Vec::new(),
            prior_treatments: Vec::new(),
            messages_sent: 0,
            trials_found: 0,
            total_duration_seconds: None,
        }
    }

    /// Whether the session has ended.
    pub fn is_completed(&self) -> bool {
        self.session_end.is_some()
    }
}

/// Demographic and clinical details submitted through the intake form.
///
/// Values are recorded as given; no range or vocabulary validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntakeForm {
    #[serde(default)]
    pub age: Option<f64>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub cancer_type: Option<String>,
    #[serde(default)]
    pub cancer_stage: Option<String>,
    #[serde(default)]
    pub comorbidities: Vec<String>,
    #[serde(default)]
    pub prior_treatments: Vec<String>,
}

/// Parse a stored ISO-8601 timestamp, with or without a UTC offset.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").ok()
}
