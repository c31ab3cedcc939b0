//! Status enums and state machines for queries, assets, and jobs.
//!
//! This module lives in `core` (zero internal deps) so the same transition
//! rules are enforced by the engine, the HTTP layer, and any future worker
//! or CLI tooling. Each machine exposes `valid_transitions` /
//! `can_transition` / `validate_transition` plus string conversions for
//! wire formats.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Query status
// ---------------------------------------------------------------------------

/// Lifecycle of one creative request.
///
/// `Completed` and `Failed` are terminal. Cancellation is represented as
/// `Failed` with a cancellation reason; there is no separate query state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStatus {
    Pending,
    Analyzing,
    Merging,
    Completed,
    Failed,
}

impl QueryStatus {
    /// Returns the set of valid target states reachable from `self`.
    ///
    /// Terminal states return an empty slice.
    pub fn valid_transitions(self) -> &'static [QueryStatus] {
        match self {
            // Pending -> Analyzing, Failed (cancelled before analysis starts)
            Self::Pending => &[Self::Analyzing, Self::Failed],
            // Analyzing -> Merging, Failed
            Self::Analyzing => &[Self::Merging, Self::Failed],
            // Merging -> Completed, Failed
            Self::Merging => &[Self::Completed, Self::Failed],
            // Terminal
            Self::Completed | Self::Failed => &[],
        }
    }

    /// Check whether a transition from `self` to `to` is valid.
    pub fn can_transition(self, to: QueryStatus) -> bool {
        self.valid_transitions().contains(&to)
    }

    /// Validate a transition, returning a descriptive message for invalid ones.
    pub fn validate_transition(self, to: QueryStatus) -> Result<(), String> {
        if self.can_transition(to) {
            Ok(())
        } else {
            Err(format!(
                "Invalid query transition: {} -> {}",
                self.as_str(),
                to.as_str()
            ))
        }
    }

    /// Wire/string form (snake_case, matches the serde representation).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Analyzing => "analyzing",
            Self::Merging => "merging",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// `true` once no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        self.valid_transitions().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Asset analysis status
// ---------------------------------------------------------------------------

/// Per-asset analysis lifecycle, nested inside a query.
///
/// `Cancelled` is the terminal variant applied when the owning query is
/// cancelled while the asset is queued or in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl AssetStatus {
    /// Returns the set of valid target states reachable from `self`.
    pub fn valid_transitions(self) -> &'static [AssetStatus] {
        match self {
            // Queued -> Running, Cancelled
            Self::Queued => &[Self::Running, Self::Cancelled],
            // Running -> Completed, Failed, Cancelled
            Self::Running => &[Self::Completed, Self::Failed, Self::Cancelled],
            // Terminal
            Self::Completed | Self::Failed | Self::Cancelled => &[],
        }
    }

    /// Check whether a transition from `self` to `to` is valid.
    pub fn can_transition(self, to: AssetStatus) -> bool {
        self.valid_transitions().contains(&to)
    }

    /// Validate a transition, returning a descriptive message for invalid ones.
    pub fn validate_transition(self, to: AssetStatus) -> Result<(), String> {
        if self.can_transition(to) {
            Ok(())
        } else {
            Err(format!(
                "Invalid asset transition: {} -> {}",
                self.as_str(),
                to.as_str()
            ))
        }
    }

    /// Wire/string form (snake_case, matches the serde representation).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// `true` once no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        self.valid_transitions().is_empty()
    }

    /// `true` for the failure-class terminals (`Failed`, `Cancelled`).
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Failed | Self::Cancelled)
    }
}

// ---------------------------------------------------------------------------
// Job status
// ---------------------------------------------------------------------------

/// Scheduler-side lifecycle of one generation job.
///
/// `Blocked` is terminal and non-dispatchable: it marks jobs whose
/// transitive dependencies include a failed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Ready,
    Dispatched,
    Succeeded,
    Failed,
    Blocked,
}

impl JobStatus {
    /// Returns the set of valid target states reachable from `self`.
    ///
    /// `Ready -> Succeeded/Failed` is allowed without an intervening
    /// `Dispatched`: external dispatchers may report a terminal outcome
    /// without ever claiming the job through the scheduler.
    pub fn valid_transitions(self) -> &'static [JobStatus] {
        match self {
            // Pending -> Ready, Blocked
            Self::Pending => &[Self::Ready, Self::Blocked],
            // Ready -> Dispatched, Succeeded, Failed
            Self::Ready => &[Self::Dispatched, Self::Succeeded, Self::Failed],
            // Dispatched -> Succeeded, Failed
            Self::Dispatched => &[Self::Succeeded, Self::Failed],
            // Terminal
            Self::Succeeded | Self::Failed | Self::Blocked => &[],
        }
    }

    /// Check whether a transition from `self` to `to` is valid.
    pub fn can_transition(self, to: JobStatus) -> bool {
        self.valid_transitions().contains(&to)
    }

    /// Validate a transition, returning a descriptive message for invalid ones.
    pub fn validate_transition(self, to: JobStatus) -> Result<(), String> {
        if self.can_transition(to) {
            Ok(())
        } else {
            Err(format!(
                "Invalid job transition: {} -> {}",
                self.as_str(),
                to.as_str()
            ))
        }
    }

    /// Convert from a wire string value.
    pub fn from_str_value(s: &str) -> Result<Self, String> {
        match s {
            "pending" => Ok(Self::Pending),
            "ready" => Ok(Self::Ready),
            "dispatched" => Ok(Self::Dispatched),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            "blocked" => Ok(Self::Blocked),
            _ => Err(format!(
                "Invalid job status '{s}'. Must be one of: pending, ready, dispatched, succeeded, failed, blocked"
            )),
        }
    }

    /// Wire/string form (snake_case, matches the serde representation).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Dispatched => "dispatched",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Blocked => "blocked",
        }
    }

    /// `true` once no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        self.valid_transitions().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
