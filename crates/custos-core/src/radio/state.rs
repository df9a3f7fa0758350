//! Radio and assignment-history data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RadioStatus {
    /// On the shelf, ready to be signed out.
    Available,
    /// Signed out to one person.
    Assigned,
}

impl RadioStatus {
    /// The wire/display form of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Assigned => "assigned",
        }
    }
}

/// A tracked radio.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Radio {
    /// Radio callsign.
    pub callsign: String,

    /// Fleet number.
    pub radio_number: String,

    /// Manufacturer serial number.
    pub serial_number: String,

    /// Current lifecycle state.
    pub status: RadioStatus,

    /// Person the radio is assigned to, when `status == Assigned`.
    #[serde(default)]
    pub assigned_to: Option<String>,

    /// When the current assignment started, when `status == Assigned`.
    #[serde(default)]
    pub assigned_at: Option<DateTime<Utc>>,
}

impl Radio {
    /// Creates a radio in the available state.
    #[must_use]
    pub fn new(
        callsign: impl Into<String>,
        radio_number: impl Into<String>,
        serial_number: impl Into<String>,
    ) -> Self {
        Self {
            callsign: callsign.into(),
            radio_number: radio_number.into(),
            serial_number: serial_number.into(),
            status: RadioStatus::Available,
            assigned_to: None,
            assigned_at: None,
        }
    }
}

/// A replacement part fitted to a radio during an assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplacementPart {
    /// Part description.
    pub part: String,

    /// When the part was recorded.
    pub added_at: DateTime<Utc>,
}

/// Append-only history record of one radio assignment.
///
/// Open while `returned_at` is `None`; closed by sign-in. Snapshots the
/// radio's identifying fields so history survives later edits to the
/// radio document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RadioAssignment {
    /// Id of the radio document.
    pub radio_id: String,

    /// Callsign at assignment time.
    pub radio_callsign: String,

    /// Fleet number at assignment time.
    pub radio_number: String,

    /// Serial number at assignment time.
    pub serial_number: String,

    /// Person the radio was assigned to.
    pub person_name: String,

    /// When the assignment started.
    pub assigned_at: DateTime<Utc>,

    /// When the radio came back; `None` while the assignment is open.
    #[serde(default)]
    pub returned_at: Option<DateTime<Utc>>,

    /// Accessories issued with the radio.
    #[serde(default)]
    pub accessories: Vec<String>,

    /// Parts fitted during the assignment.
    #[serde(default)]
    pub replacement_parts: Vec<ReplacementPart>,
}

/// Accessory name recorded when the surveillance kit is issued.
pub(super) const ACCESSORY_SURVEILLANCE_KIT: &str = "Surveillance Kit";

/// Accessory name recorded for the earpiece add-on.
pub(super) const ACCESSORY_EARPIECE: &str = "Earpiece";
