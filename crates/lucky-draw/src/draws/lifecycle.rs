//! Time-derived phase of a draw and the eligibility rules built on it.
//!
//! Nothing here is stored: the phase is recomputed from the wall clock on every call.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::DrawStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawPhase {
    Upcoming,
    Active,
    Closed,
}

impl DrawPhase {
    pub const fn label(self) -> &'static str {
        match self {
            DrawPhase::Upcoming => "upcoming",
            DrawPhase::Active => "active",
            DrawPhase::Closed => "closed",
        }
    }
}

impl fmt::Display for DrawPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Both window bounds are inclusive: a draw is active at exactly `opens_at` and `closes_at`.
pub fn phase(now: DateTime<Utc>, opens_at: DateTime<Utc>, closes_at: DateTime<Utc>) -> DrawPhase {
    if now < opens_at {
        DrawPhase::Upcoming
    } else if now > closes_at {
        DrawPhase::Closed
    } else {
        DrawPhase::Active
    }
}

/// Detail behind a `NotEligible` selection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum IneligibleReason {
    #[error("registration window is still {phase}")]
    RegistrationNotClosed { phase: DrawPhase },
    #[error("draw already completed")]
    AlreadyCompleted,
    #[error("winner already selected")]
    WinnerAlreadySet,
    #[error("draw was cancelled")]
    Cancelled,
}

/// Status-based causes take precedence over the window so a repeat call on a completed draw
/// always reports `AlreadyCompleted`.
pub fn selection_blocker(
    phase: DrawPhase,
    status: DrawStatus,
    has_winner: bool,
) -> Option<IneligibleReason> {
    match status {
        DrawStatus::Completed => return Some(IneligibleReason::AlreadyCompleted),
        DrawStatus::Cancelled => return Some(IneligibleReason::Cancelled),
        DrawStatus::Active => {}
    }
    if has_winner {
        return Some(IneligibleReason::WinnerAlreadySet);
    }
    match phase {
        DrawPhase::Closed => None,
        open => Some(IneligibleReason::RegistrationNotClosed { phase: open }),
    }
}
