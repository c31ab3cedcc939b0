//! External collaborator contracts.
//!
//! The engine never performs media inference itself; it calls an
//! [`AnalysisProvider`] per asset and a [`ManifestPlanner`] once per query.
//! Both are object-safe async traits so hosts can plug in vendor-backed
//! implementations; deterministic built-ins live in [`crate::builtin`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use showrun_core::manifest::ManifestDraft;
use showrun_core::query::{InputAsset, Query};

// ---------------------------------------------------------------------------
// Provider errors
// ---------------------------------------------------------------------------

/// Failure of one provider call. Always scoped to the call: an analysis
/// error fails its asset, a planning error fails its query, never the
/// process.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    /// The provider rejected the input (unreadable URI, unsupported media).
    #[error("Invalid provider input: {0}")]
    InvalidInput(String),

    /// The provider ran and failed.
    #[error("Provider call failed: {0}")]
    Failed(String),
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Handle a provider uses to report incremental progress (0-100) for the
/// asset it is analyzing. Reports are forwarded to the progress tracker;
/// dropped receivers are ignored.
#[derive(Clone)]
pub struct ProgressReporter {
    tx: mpsc::UnboundedSender<u8>,
}

impl ProgressReporter {
    /// Create a reporter and the receiving end the analysis runner drains.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<u8>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Report progress for the current asset, clamped to 100.
    pub fn report(&self, percent: u8) {
        let _ = self.tx.send(percent.min(100));
    }
}

// ---------------------------------------------------------------------------
// Analysis result
// ---------------------------------------------------------------------------

/// Structured result of one asset analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetAnalysis {
    pub asset_id: String,
    /// Normalized quality score in `0.0..=1.0`.
    pub quality_score: f64,
    pub summary: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Intrinsic media duration, when the asset has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<i64>,
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Analyzes one input asset.
///
/// Calls are independent and may run concurrently up to the engine's pool
/// bound; the runner applies the per-call timeout, so implementations do
/// not need their own.
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    async fn analyze(
        &self,
        asset: &InputAsset,
        progress: &ProgressReporter,
    ) -> Result<AssetAnalysis, ProviderError>;
}

/// Synthesizes a manifest draft from the query and its analysis results.
///
/// The draft is a candidate only; the assembler validates it before
/// anything reaches a dispatcher.
#[async_trait]
pub trait ManifestPlanner: Send + Sync {
    async fn plan(
        &self,
        query: &Query,
        user_id: &str,
        assets: &[InputAsset],
        analyses: &[AssetAnalysis],
    ) -> Result<ManifestDraft, ProviderError>;
}
