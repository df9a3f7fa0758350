//! Recurring inspection scheduling.
//!
//! Asset components carry a recurrence frequency; logging an inspection
//! stamps `lastChecked` and recomputes `nextDue` from it. Components are
//! classified relative to "now" into overdue / upcoming / recently-checked
//! views for the due-work screens.
//!
//! # Calendar policy
//!
//! Due dates are advanced with chrono's month arithmetic: the day of month
//! clamps to the last valid day of the target month, so a monthly check
//! logged on Jan 31 falls due Feb 29 in a leap year. Pinned by tests in
//! this module.
//!
//! Unrecognized frequency text normalizes to annually - under-scheduling
//! is preferred over refusing the document.

mod engine;
mod error;
mod schedule;
mod state;


pub use engine::{ComponentSnapshot, InspectionBuckets, InspectionEngine, InspectionOutcome};
pub use error::InspectionError;
pub use schedule::{DUE_SOON_WINDOW_DAYS, DueClassification, Frequency, classify};
pub use state::{Component, InspectionRecord, InspectionStatus};
