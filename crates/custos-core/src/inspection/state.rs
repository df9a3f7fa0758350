//! Component and inspection-record data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::schedule::Frequency;
use crate::names;

/// Outcome of an inspection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InspectionStatus {
    /// Inspection passed.
    Pass,

    /// Inspection failed.
    Fail,

    /// No conclusive result recorded.
    #[default]
    Pending,
}

impl InspectionStatus {
    /// Maps loose status text to a status.
    ///
    /// `pass`/`yes`/`ok`/`passed` map to pass, `fail`/`no`/`failed` to
    /// fail, anything else to pending.
    #[must_use]
    pub fn normalize(raw: &str) -> Self {
        match names::normalized(raw).as_str() {
            "pass" | "yes" | "ok" | "passed" => Self::Pass,
            "fail" | "no" | "failed" => Self::Fail,
            _ => Self::Pending,
        }
    }

    /// The wire/display form of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Pending => "pending",
        }
    }
}

/// An inspectable sub-part of an asset.
///
/// `next_due` is derived state: it is recomputed from the frequency every
/// time an inspection is logged, never edited directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    /// The parent asset.
    pub asset_id: String,

    /// Inspection recurrence. Loose stored values normalize on read.
    #[serde(default, deserialize_with = "Frequency::deserialize_lenient")]
    pub frequency: Frequency,

    /// When the component was last inspected; `None` if never.
    #[serde(default)]
    pub last_checked: Option<DateTime<Utc>>,

    /// When the next inspection falls due; `None` if never inspected.
    #[serde(default)]
    pub next_due: Option<DateTime<Utc>>,

    /// Latest inspection outcome.
    #[serde(default)]
    pub status: InspectionStatus,
}

impl Component {
    /// Creates a never-inspected component.
    #[must_use]
    pub fn new(asset_id: impl Into<String>, frequency: Frequency) -> Self {
        Self {
            asset_id: asset_id.into(),
            frequency,
            last_checked: None,
            next_due: None,
            status: InspectionStatus::Pending,
        }
    }
}

/// Immutable record of one inspection event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectionRecord {
    /// The inspected component.
    pub component_id: String,

    /// The component's parent asset.
    pub asset_id: String,

    /// When the inspection happened.
    pub date: DateTime<Utc>,

    /// Audit name of the inspector.
    pub inspector: String,

    /// Normalized outcome.
    pub status: InspectionStatus,

    /// Free-text notes.
    pub notes: String,

    /// The frequency in effect when the inspection was logged.
    pub frequency: Frequency,
}
