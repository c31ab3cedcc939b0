//! Creative request (query) model and submission validation.
//!
//! A query is one request to turn a text prompt plus input assets into a
//! production manifest. The engine owns the mutable lifecycle; this module
//! defines the data shapes and the ingestion checks applied before any
//! analysis work is spawned.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::manifest::{validate_aspect_ratio, validate_entity_id, validate_platform};
use crate::manifest::{AssetSource, MediaType};
use crate::status::{AssetStatus, QueryStatus};
use crate::types::{QueryId, Timestamp};

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Maximum prompt length in characters.
pub const MAX_PROMPT_LENGTH: usize = 2000;

/// Maximum declared production duration.
pub const MAX_DURATION_SECONDS: i64 = 3600;

/// Maximum number of input assets per query.
pub const MAX_INPUT_ASSETS: usize = 64;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Declared production constraints supplied at submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryConstraints {
    pub duration_seconds: i64,
    pub aspect_ratio: String,
    pub platform: String,
    pub language: String,
}

/// One input asset reference supplied at submission.
///
/// `source` is a closed enum, so unknown provenance values (`"stock"`,
/// etc.) never get past deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputAsset {
    pub id: String,
    pub media_type: MediaType,
    pub source: AssetSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Required assets fail the query when their analysis fails.
    /// Defaults to required; callers opt assets out explicitly.
    #[serde(default = "default_true")]
    pub required: bool,
}

fn default_true() -> bool {
    true
}

/// Live analysis state of one input asset, owned by the progress tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetState {
    pub id: String,
    pub status: AssetStatus,
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AssetState {
    /// Initial state for a freshly ingested asset.
    pub fn queued(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: AssetStatus::Queued,
            progress: 0,
            quality_score: None,
            error: None,
        }
    }
}

/// Machine-readable reason class for a failed query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCode {
    /// A required asset's analysis failed or timed out.
    RequiredAssetFailed,
    /// The assembled draft violated timeline/reference/graph invariants.
    ValidationFailed,
    /// The planner could not synthesize a draft.
    PlanningFailed,
    /// The query was cancelled by the caller.
    Cancelled,
    Internal,
}

impl FailureCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RequiredAssetFailed => "required_asset_failed",
            Self::ValidationFailed => "validation_failed",
            Self::PlanningFailed => "planning_failed",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal",
        }
    }
}

/// Why a query reached `failed`. Never a bare "failed": the code is
/// enumerable and `details` carries the full violation list where one exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureReason {
    pub code: FailureCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub details: serde_json::Value,
}

impl FailureReason {
    pub fn new(code: FailureCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: serde_json::Value::Null,
        }
    }

    /// Attach structured details (e.g. a violation list).
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// One creative request and its lifecycle state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    pub id: QueryId,
    pub prompt: String,
    pub constraints: QueryConstraints,
    pub status: QueryStatus,
    /// Overall progress 0-100, monotonically non-decreasing while active.
    pub progress: u8,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
}

impl Query {
    /// Create a pending query with a fresh id.
    pub fn new(prompt: impl Into<String>, constraints: QueryConstraints) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: uuid::Uuid::new_v4(),
            prompt: prompt.into(),
            constraints,
            status: QueryStatus::Pending,
            progress: 0,
            created_at: now,
            updated_at: now,
            failure: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Submission validation
// ---------------------------------------------------------------------------

/// Validate a submission before any work is spawned.
///
/// Checks the prompt, the declared constraints, and the asset list
/// (id format, uniqueness, count). Asset `source`/`mediaType` vocabulary
/// is already enforced by the closed enums at deserialization.
pub fn validate_submission(
    prompt: &str,
    constraints: &QueryConstraints,
    assets: &[InputAsset],
) -> Result<(), CoreError> {
    if prompt.trim().is_empty() {
        return Err(CoreError::Validation("Prompt must not be empty".to_string()));
    }
    if prompt.len() > MAX_PROMPT_LENGTH {
        return Err(CoreError::Validation(format!(
            "Prompt exceeds {MAX_PROMPT_LENGTH} characters"
        )));
    }
    if constraints.duration_seconds <= 0 {
        return Err(CoreError::Validation(format!(
            "Duration must be > 0 seconds, got {}",
            constraints.duration_seconds
        )));
    }
    if constraints.duration_seconds > MAX_DURATION_SECONDS {
        return Err(CoreError::Validation(format!(
            "Duration must be <= {MAX_DURATION_SECONDS} seconds, got {}",
            constraints.duration_seconds
        )));
    }
    validate_aspect_ratio(&constraints.aspect_ratio)?;
    validate_platform(&constraints.platform)?;
    if constraints.language.trim().is_empty() {
        return Err(CoreError::Validation(
            "Language must not be empty".to_string(),
        ));
    }

    if assets.len() > MAX_INPUT_ASSETS {
        return Err(CoreError::Validation(format!(
            "At most {MAX_INPUT_ASSETS} input assets per query, got {}",
            assets.len()
        )));
    }
    let mut seen = std::collections::HashSet::new();
    for asset in assets {
        validate_entity_id(&asset.id)?;
        if !seen.insert(asset.id.as_str()) {
            return Err(CoreError::Validation(format!(
                "Duplicate asset id '{}'",
                asset.id
            )));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
