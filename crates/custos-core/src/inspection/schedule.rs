//! Frequency normalization, due-date arithmetic, and classification.

use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::state::Component;
use crate::names;

/// Width of the "upcoming" and "recently checked" windows.
pub const DUE_SOON_WINDOW_DAYS: i64 = 30;

/// Inspection recurrence frequency.
///
/// The wire forms are `monthly`, `quarterly`, `annually`, and `5-years`;
/// anything else read from a stored document normalizes to annually.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frequency {
    /// Every month.
    #[serde(rename = "monthly")]
    Monthly,

    /// Every three months.
    #[serde(rename = "quarterly")]
    Quarterly,

    /// Every year. Also the fail-safe for unrecognized input.
    #[default]
    #[serde(rename = "annually")]
    Annually,

    /// Every five years.
    #[serde(rename = "5-years")]
    FiveYears,
}

impl Frequency {
    /// Maps loose frequency text to a frequency.
    ///
    /// Unrecognized input defaults to [`Frequency::Annually`]: a component
    /// that gets inspected too rarely is recoverable, a crash on a legacy
    /// document is not.
    #[must_use]
    pub fn normalize(raw: &str) -> Self {
        match names::normalized(raw).as_str() {
            "monthly" | "month" => Self::Monthly,
            "quarterly" | "quarter" => Self::Quarterly,
            "5-years" | "5 years" | "five-years" | "five years" | "5yr" => Self::FiveYears,
            _ => Self::Annually,
        }
    }

    /// Lenient deserializer for component documents: accepts any string
    /// (or a missing/null field) and normalizes it.
    pub(super) fn deserialize_lenient<'de, D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map_or_else(Self::default, Self::normalize))
    }

    /// The recurrence interval in months.
    #[must_use]
    pub const fn months(self) -> u32 {
        match self {
            Self::Monthly => 1,
            Self::Quarterly => 3,
            Self::Annually => 12,
            Self::FiveYears => 60,
        }
    }

    /// Computes the next due timestamp from a reference date.
    ///
    /// Calendar-aware: the day of month clamps to the last valid day of
    /// the target month (chrono `checked_add_months` semantics), so
    /// 2024-01-31 plus one month is 2024-02-29. The add only fails at the
    /// edge of chrono's representable range; there it saturates to `from`.
    #[must_use]
    pub fn next_due(self, from: DateTime<Utc>) -> DateTime<Utc> {
        from.checked_add_months(Months::new(self.months()))
            .unwrap_or(from)
    }

    /// The wire/display form of the frequency.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Annually => "annually",
            Self::FiveYears => "5-years",
        }
    }
}

/// Where a component stands relative to its schedule.
///
/// Upcoming and recent are independent windows and can both be set;
/// overdue and upcoming are mutually exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DueClassification {
    /// Never inspected, or past due.
    pub overdue: bool,

    /// Due within the next [`DUE_SOON_WINDOW_DAYS`] days.
    pub upcoming: bool,

    /// Checked within the last [`DUE_SOON_WINDOW_DAYS`] days.
    pub recent: bool,
}

/// Classifies a component relative to `now`.
///
/// - Overdue: `next_due` is unset (never inspected) or in the past.
/// - Upcoming: `next_due` is set and falls within the next 30 days.
/// - Recent: `last_checked` is set and within the last 30 days.
#[must_use]
pub fn classify(component: &Component, now: DateTime<Utc>) -> DueClassification {
    let window = Duration::days(DUE_SOON_WINDOW_DAYS);

    let (overdue, upcoming) = match component.next_due {
        None => (true, false),
        Some(due) => {
            let until = due.signed_duration_since(now);
            (
                due < now,
                until > Duration::zero() && until <= window,
            )
        },
    };

    let recent = component
        .last_checked
        .is_some_and(|checked| now.signed_duration_since(checked) <= window);

    DueClassification {
        overdue,
        upcoming,
        recent,
    }
}
