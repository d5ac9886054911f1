//! Shared data model: ground-truth records, predictions, and persisted runs.
//!
//! The analysis endpoint returns loosely-typed JSON, and the ground-truth CSV
//! stores labels as strings. Both are read into the same tagged shapes here
//! ([`FieldValue`], [`Availability`]) so normalization is an exhaustive match.

use std::borrow::Borrow;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Stable identifier of a ground-truth record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for RecordId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A single label value as received from JSON or CSV.
///
/// `null`, a missing key, and the empty string all read as [`Absent`](Self::Absent).
/// Anything that is not a boolean is kept as text and handled by the normalizer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum FieldValue {
    Bool(bool),
    #[default]
    Absent,
    Text(String),
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Absent,
            Value::Bool(b) => Self::Bool(b),
            Value::String(s) if s.is_empty() => Self::Absent,
            Value::String(s) => Self::Text(s),
            other => Self::Text(other.to_string()),
        }
    }
}

impl From<FieldValue> for Value {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::Bool(b) => Value::Bool(b),
            FieldValue::Absent => Value::Null,
            FieldValue::Text(s) => Value::String(s),
        }
    }
}

impl From<Option<bool>> for FieldValue {
    fn from(value: Option<bool>) -> Self {
        value.map_or(Self::Absent, Self::Bool)
    }
}

/// One availability period suggested for a patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

/// The `availability_periods` label.
///
/// Ground-truth CSV cells hold the list as a JSON string, so a string value is
/// parsed before being interpreted. `"null"`, `"none"` and `""` read as absent.
/// Reading never fails: a value that is not a well-formed period list is kept
/// as [`Availability::Unparsed`] and still counts for presence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum Availability {
    #[default]
    Absent,
    Periods(Vec<DateRange>),
    /// Anything else the source produced, verbatim.
    Unparsed(Value),
}

impl Availability {
    /// True when at least one period is present.
    ///
    /// Unparsed values follow JSON truthiness: non-empty lists, objects and
    /// strings, `true`, and non-zero numbers are present.
    pub fn is_present(&self) -> bool {
        match self {
            Self::Absent => false,
            Self::Periods(periods) => !periods.is_empty(),
            Self::Unparsed(value) => match value {
                Value::Null => false,
                Value::Bool(b) => *b,
                Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
                Value::String(s) => !s.trim().is_empty(),
                Value::Array(items) => !items.is_empty(),
                Value::Object(fields) => !fields.is_empty(),
            },
        }
    }
}

impl From<Value> for Availability {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Absent,
            Value::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty()
                    || trimmed.eq_ignore_ascii_case("null")
                    || trimmed.eq_ignore_ascii_case("none")
                {
                    return Self::Absent;
                }
                match serde_json::from_str::<Value>(trimmed) {
                    Ok(parsed) if !parsed.is_string() => Self::from(parsed),
                    _ => Self::Unparsed(Value::String(s)),
                }
            }
            Value::Array(items) => {
                match serde_json::from_value::<Vec<DateRange>>(Value::Array(items.clone())) {
                    Ok(periods) => Self::Periods(periods),
                    Err(_) => Self::Unparsed(Value::Array(items)),
                }
            }
            other => Self::Unparsed(other),
        }
    }
}

impl From<Availability> for Value {
    fn from(value: Availability) -> Self {
        match value {
            Availability::Absent => Value::Null,
            Availability::Periods(periods) => {
                serde_json::to_value(periods).unwrap_or(Value::Array(Vec::new()))
            }
            Availability::Unparsed(value) => value,
        }
    }
}

/// The four labels that are both annotated in ground truth and predicted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Labels {
    #[serde(default)]
    pub patient_prioritized: FieldValue,
    #[serde(default)]
    pub patient_ready: FieldValue,
    #[serde(default)]
    pub patient_short_notice: FieldValue,
    #[serde(default)]
    pub availability_periods: Availability,
}

/// A human-reviewed record: the comment plus its authoritative labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundTruthRecord {
    pub id: RecordId,
    pub comment_text: String,
    pub truth: Labels,
}

/// Output of one invocation of the analysis endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    #[serde(flatten)]
    pub labels: Labels,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// One persisted invocation attempt against one record.
///
/// `attempt` is 1-based and gapless within a record's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub record_id: RecordId,
    pub attempt: u32,
    pub prediction: Prediction,
    /// `None` when the latency could not be measured or was not a finite number.
    pub latency_ms: Option<f64>,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

/// Fields scored for agreement, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackedField {
    PatientPrioritized,
    PatientReady,
    PatientShortNotice,
    Availability,
}

impl TrackedField {
    pub const ALL: [TrackedField; 4] = [
        Self::PatientPrioritized,
        Self::PatientReady,
        Self::PatientShortNotice,
        Self::Availability,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PatientPrioritized => "patient_prioritized",
            Self::PatientReady => "patient_ready",
            Self::PatientShortNotice => "patient_short_notice",
            Self::Availability => "availability",
        }
    }

    /// Position in [`ALL`](Self::ALL).
    pub fn index(&self) -> usize {
        match self {
            Self::PatientPrioritized => 0,
            Self::PatientReady => 1,
            Self::PatientShortNotice => 2,
            Self::Availability => 3,
        }
    }

    pub fn is_boolean(&self) -> bool {
        !matches!(self, Self::Availability)
    }
}
