//! The progress message envelope.
//!
//! One [`ProgressMessage`] describes one query/asset state change. Messages
//! are immutable once appended to a log; the per-query sequence id is
//! assigned by the log itself at append time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use showrun_core::types::QueryId;

// ---------------------------------------------------------------------------
// ProgressKind
// ---------------------------------------------------------------------------

/// Classification of a progress message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressKind {
    /// Query-level status transition.
    Status,
    /// An asset's analysis started.
    AssetStart,
    /// Incremental progress for one asset.
    AssetProgress,
    /// An asset's analysis reached a terminal state.
    AssetComplete,
    /// The query entered the merge phase.
    Merge,
    /// Terminal success: the manifest is available.
    Final,
    /// Terminal failure, carrying the failure reason.
    Error,
}

impl ProgressKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::AssetStart => "asset_start",
            Self::AssetProgress => "asset_progress",
            Self::AssetComplete => "asset_complete",
            Self::Merge => "merge",
            Self::Final => "final",
            Self::Error => "error",
        }
    }
}

// ---------------------------------------------------------------------------
// ProgressMessage
// ---------------------------------------------------------------------------

/// One immutable progress event for a query.
///
/// Constructed via [`ProgressMessage::new`] and enriched with
/// [`with_asset`](ProgressMessage::with_asset) and
/// [`with_payload`](ProgressMessage::with_payload).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressMessage {
    /// Per-query sequence number, dense from 0, assigned on append.
    pub id: u64,

    pub query_id: QueryId,

    #[serde(rename = "type")]
    pub kind: ProgressKind,

    /// The asset this message concerns, for the asset-scoped kinds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,

    /// Human-readable description of the change.
    pub content: String,

    /// Free-form JSON carrying message-specific data.
    pub payload: serde_json::Value,

    /// When the message was emitted (UTC).
    pub timestamp: DateTime<Utc>,
}

impl ProgressMessage {
    /// Create a message with the required fields.
    ///
    /// The sequence id is a placeholder until the log assigns it.
    pub fn new(query_id: QueryId, kind: ProgressKind, content: impl Into<String>) -> Self {
        Self {
            id: 0,
            query_id,
            kind,
            asset_id: None,
            content: content.into(),
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    /// Scope the message to one asset.
    pub fn with_asset(mut self, asset_id: impl Into<String>) -> Self {
        self.asset_id = Some(asset_id.into());
        self
    }

    /// Set the JSON payload for the message.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
