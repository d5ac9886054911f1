//! Value normalization shared by truth and predictions.
//!
//! Every label is reduced to a canonical [`Symbol`] before comparison:
//!
//! - `true` / `false` booleans → [`Symbol::True`] / [`Symbol::False`]
//! - `null`, missing, or empty string → [`Symbol::Null`]
//! - anything else → its trimmed lowercase text, so `"True"` still reads as
//!   `true` and unexpected values surface as [`Symbol::Other`]
//!
//! Availability is judged on presence only: a non-empty period list becomes
//! `"list"`, everything else `"null"`. Date-range content is never compared.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::model::{Availability, FieldValue, Labels, TrackedField};

/// Canonical normalized label value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Symbol {
    True,
    False,
    Null,
    /// Availability presence flag: at least one period was given.
    List,
    Other(String),
}

impl Symbol {
    pub fn as_str(&self) -> &str {
        match self {
            Self::True => "true",
            Self::False => "false",
            Self::Null => "null",
            Self::List => "list",
            Self::Other(s) => s,
        }
    }

    /// Parse text the same way a non-boolean label is normalized.
    pub fn from_text(text: &str) -> Self {
        let lowered = text.trim().to_lowercase();
        match lowered.as_str() {
            "true" => Self::True,
            "false" => Self::False,
            "" | "null" => Self::Null,
            "list" => Self::List,
            _ => Self::Other(lowered),
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl Serialize for Symbol {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Normalize a single label value. Total over every input.
pub fn normalize(value: &FieldValue) -> Symbol {
    match value {
        FieldValue::Bool(true) => Symbol::True,
        FieldValue::Bool(false) => Symbol::False,
        FieldValue::Absent => Symbol::Null,
        FieldValue::Text(text) => Symbol::from_text(text),
    }
}

/// Reduce availability to its presence flag (`"list"` or absent).
pub fn presence(availability: &Availability) -> FieldValue {
    if availability.is_present() {
        FieldValue::Text("list".to_string())
    } else {
        FieldValue::Absent
    }
}

/// Presence flag passed through the same normalizer as the boolean labels.
pub fn normalize_availability(availability: &Availability) -> Symbol {
    normalize(&presence(availability))
}

impl Labels {
    /// Normalized value of one tracked field.
    pub fn symbol(&self, field: TrackedField) -> Symbol {
        match field {
            TrackedField::PatientPrioritized => normalize(&self.patient_prioritized),
            TrackedField::PatientReady => normalize(&self.patient_ready),
            TrackedField::PatientShortNotice => normalize(&self.patient_short_notice),
            TrackedField::Availability => normalize_availability(&self.availability_periods),
        }
    }

    /// All four normalized values, in [`TrackedField::ALL`] order.
    pub fn outcome(&self) -> [Symbol; 4] {
        TrackedField::ALL.map(|field| self.symbol(field))
    }
}
