//! Turnaround (SLA) clock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::days_between;

/// Days remaining at or below which a job is flagged as at risk.
pub const AT_RISK_DAYS: i64 = 2;

crate::model::text_enum! {
    /// Derived turnaround status of an accepted job.
    SlaStatus {
        OnTrack => "on_track",
        AtRisk => "at_risk",
        Overdue => "overdue",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaSnapshot {
    pub days_since_accepted: i64,
    pub days_remaining: i64,
    pub status: SlaStatus,
}

impl SlaStatus {
    pub fn from_days_remaining(days_remaining: i64) -> Self {
        if days_remaining < 0 {
            SlaStatus::Overdue
        } else if days_remaining <= AT_RISK_DAYS {
            SlaStatus::AtRisk
        } else {
            SlaStatus::OnTrack
        }
    }
}

/// Computes the turnaround position of a job accepted at `accepted_at`.
///
/// `accepted_at` is the SLA baseline, which moves forward when a job comes
/// back from hold.
pub fn compute_sla_status(
    accepted_at: DateTime<Utc>,
    turnaround_days: u32,
    now: DateTime<Utc>,
) -> SlaSnapshot {
    let days_since_accepted = days_between(accepted_at, now).max(0);
    let days_remaining = i64::from(turnaround_days) - days_since_accepted;
    SlaSnapshot {
        days_since_accepted,
        days_remaining,
        status: SlaStatus::from_days_remaining(days_remaining),
    }
}
