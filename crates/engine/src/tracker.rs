//! Query lifecycle and multi-stage progress tracking.
//!
//! [`ProgressTracker`] owns the mutable [`Query`] and its per-asset
//! states, and is the single writer for the query's progress log. Every
//! mutation validates the state machine first, applies the change, then
//! appends exactly one message, so subscribers always observe changes in
//! the order they took effect.
//!
//! Overall progress is derived, never reported from outside: during
//! analysis it is the terminal-asset share scaled into `0..=90`, merging
//! pins it at `95`, and `100` appears only on completion. Per-asset and
//! query progress are both monotonically non-decreasing.
//!
//! Asset-level terminal outcomes (including failures) are emitted as
//! `asset_complete` messages; the `error` kind is reserved for the
//! query-level failure record.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::json;
use tracing::debug;

use showrun_core::error::CoreError;
use showrun_core::query::{AssetState, FailureCode, FailureReason, InputAsset, Query};
use showrun_core::status::{AssetStatus, QueryStatus};
use showrun_events::{ProgressKind, ProgressLog, ProgressMessage};

/// Overall progress never exceeds this while analyses are running.
pub const ANALYSIS_PROGRESS_CEILING: u8 = 90;

/// Overall progress while the manifest is being merged.
pub const MERGING_PROGRESS: u8 = 95;

// ---------------------------------------------------------------------------
// ProgressTracker
// ---------------------------------------------------------------------------

/// Single-writer lifecycle tracker for one query.
pub struct ProgressTracker {
    query: Query,
    assets: Vec<AssetState>,
    required: HashSet<String>,
    log: Arc<ProgressLog>,
}

impl ProgressTracker {
    pub fn new(query: Query, input_assets: &[InputAsset], log: Arc<ProgressLog>) -> Self {
        let assets = input_assets
            .iter()
            .map(|a| AssetState::queued(&a.id))
            .collect();
        let required = input_assets
            .iter()
            .filter(|a| a.required)
            .map(|a| a.id.clone())
            .collect();
        Self {
            query,
            assets,
            required,
            log,
        }
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn assets(&self) -> &[AssetState] {
        &self.assets
    }

    pub fn is_terminal(&self) -> bool {
        self.query.status.is_terminal()
    }

    /// `true` once every asset analysis reached a terminal state.
    pub fn all_assets_terminal(&self) -> bool {
        self.assets.iter().all(|a| a.status.is_terminal())
    }

    /// Ids of required assets whose analysis failed or was cancelled.
    pub fn failed_required_assets(&self) -> Vec<String> {
        self.assets
            .iter()
            .filter(|a| a.status.is_failure() && self.required.contains(&a.id))
            .map(|a| a.id.clone())
            .collect()
    }

    fn guard_active(&self) -> Result<(), CoreError> {
        if self.query.status.is_terminal() {
            return Err(CoreError::Conflict(format!(
                "Query {} is already {}",
                self.query.id,
                self.query.status.as_str()
            )));
        }
        Ok(())
    }

    fn asset_mut(&mut self, asset_id: &str) -> Result<&mut AssetState, CoreError> {
        self.assets
            .iter_mut()
            .find(|a| a.id == asset_id)
            .ok_or(CoreError::NotFound {
                entity: "asset",
                id: asset_id.to_string(),
            })
    }

    fn touch(&mut self) {
        self.query.updated_at = chrono::Utc::now();
    }

    /// Fold terminal-asset share into overall progress, capped at the
    /// analysis ceiling and never decreasing.
    fn recompute_progress(&mut self) {
        if self.query.status != QueryStatus::Analyzing {
            return;
        }
        let total = self.assets.len();
        let pct = if total == 0 {
            ANALYSIS_PROGRESS_CEILING
        } else {
            let terminal = self.assets.iter().filter(|a| a.status.is_terminal()).count();
            (terminal * usize::from(ANALYSIS_PROGRESS_CEILING) / total) as u8
        };
        self.query.progress = self.query.progress.max(pct);
    }

    // -----------------------------------------------------------------------
    // Query-level transitions
    // -----------------------------------------------------------------------

    /// `pending -> analyzing`: analysis work is about to be spawned.
    pub async fn begin_analysis(&mut self) -> Result<(), CoreError> {
        self.query
            .status
            .validate_transition(QueryStatus::Analyzing)
            .map_err(CoreError::Conflict)?;
        self.query.status = QueryStatus::Analyzing;
        self.touch();

        let total = self.assets.len();
        self.log
            .append(
                ProgressMessage::new(
                    self.query.id,
                    ProgressKind::Status,
                    format!("Analyzing {total} input asset(s)"),
                )
                .with_payload(json!({"status": "analyzing", "totalAssets": total})),
            )
            .await;
        Ok(())
    }

    /// `analyzing -> merging`: requires every asset analysis to be settled.
    pub async fn begin_merging(&mut self) -> Result<(), CoreError> {
        self.guard_active()?;
        if !self.all_assets_terminal() {
            return Err(CoreError::Conflict(
                "Cannot merge while asset analyses are in flight".to_string(),
            ));
        }
        self.query
            .status
            .validate_transition(QueryStatus::Merging)
            .map_err(CoreError::Conflict)?;
        self.query.status = QueryStatus::Merging;
        self.query.progress = self.query.progress.max(MERGING_PROGRESS);
        self.touch();

        let progress = self.query.progress;
        self.log
            .append(
                ProgressMessage::new(
                    self.query.id,
                    ProgressKind::Merge,
                    "Merging analysis results into manifest",
                )
                .with_payload(json!({"status": "merging", "progress": progress})),
            )
            .await;
        Ok(())
    }

    /// `merging -> completed`: the manifest is assembled and validated.
    pub async fn complete(&mut self) -> Result<(), CoreError> {
        self.query
            .status
            .validate_transition(QueryStatus::Completed)
            .map_err(CoreError::Conflict)?;
        self.query.status = QueryStatus::Completed;
        self.query.progress = 100;
        self.touch();

        self.log
            .append(
                ProgressMessage::new(self.query.id, ProgressKind::Final, "Manifest ready")
                    .with_payload(json!({"status": "completed", "progress": 100})),
            )
            .await;
        Ok(())
    }

    /// Terminal failure from any active state, with a structured reason.
    pub async fn fail(&mut self, reason: FailureReason) -> Result<(), CoreError> {
        self.query
            .status
            .validate_transition(QueryStatus::Failed)
            .map_err(CoreError::Conflict)?;
        debug!(query_id = %self.query.id, code = reason.code.as_str(), "query failed");
        self.query.status = QueryStatus::Failed;
        self.query.failure = Some(reason.clone());
        self.touch();

        self.log
            .append(
                ProgressMessage::new(self.query.id, ProgressKind::Error, reason.message.clone())
                    .with_payload(json!({"status": "failed", "reason": reason})),
            )
            .await;
        Ok(())
    }

    /// Cancel the query: settle every live asset as cancelled, then fail
    /// with a cancellation reason.
    pub async fn cancel(&mut self) -> Result<(), CoreError> {
        self.guard_active()?;
        let live: Vec<String> = self
            .assets
            .iter()
            .filter(|a| !a.status.is_terminal())
            .map(|a| a.id.clone())
            .collect();
        for asset_id in live {
            self.asset_cancelled(&asset_id).await?;
        }
        self.fail(FailureReason::new(
            FailureCode::Cancelled,
            "Query cancelled by caller",
        ))
        .await
    }

    // -----------------------------------------------------------------------
    // Asset-level transitions
    // -----------------------------------------------------------------------

    /// `queued -> running` for one asset.
    pub async fn asset_started(&mut self, asset_id: &str) -> Result<(), CoreError> {
        self.guard_active()?;
        {
            let asset = self.asset_mut(asset_id)?;
            asset
                .status
                .validate_transition(AssetStatus::Running)
                .map_err(CoreError::Conflict)?;
            asset.status = AssetStatus::Running;
        }
        self.touch();

        self.log
            .append(
                ProgressMessage::new(self.query.id, ProgressKind::AssetStart, "analysis started")
                    .with_asset(asset_id)
                    .with_payload(json!({"status": "running"})),
            )
            .await;
        Ok(())
    }

    /// Incremental progress for a running asset, clamped to 100 and
    /// monotone per asset.
    pub async fn asset_progress(&mut self, asset_id: &str, percent: u8) -> Result<(), CoreError> {
        self.guard_active()?;
        let progress = {
            let asset = self.asset_mut(asset_id)?;
            if asset.status != AssetStatus::Running {
                return Err(CoreError::Conflict(format!(
                    "Asset '{asset_id}' is not running"
                )));
            }
            asset.progress = asset.progress.max(percent.min(100));
            asset.progress
        };
        self.touch();

        self.log
            .append(
                ProgressMessage::new(
                    self.query.id,
                    ProgressKind::AssetProgress,
                    format!("analysis {progress}%"),
                )
                .with_asset(asset_id)
                .with_payload(json!({"progress": progress})),
            )
            .await;
        Ok(())
    }

    /// `running -> completed` for one asset, recording its quality score.
    pub async fn asset_completed(
        &mut self,
        asset_id: &str,
        quality_score: Option<f64>,
    ) -> Result<(), CoreError> {
        self.guard_active()?;
        {
            let asset = self.asset_mut(asset_id)?;
            asset
                .status
                .validate_transition(AssetStatus::Completed)
                .map_err(CoreError::Conflict)?;
            asset.status = AssetStatus::Completed;
            asset.progress = 100;
            asset.quality_score = quality_score;
        }
        self.recompute_progress();
        self.touch();

        self.log
            .append(
                ProgressMessage::new(
                    self.query.id,
                    ProgressKind::AssetComplete,
                    "analysis completed",
                )
                .with_asset(asset_id)
                .with_payload(json!({
                    "status": "completed",
                    "progress": 100,
                    "qualityScore": quality_score,
                })),
            )
            .await;
        Ok(())
    }

    /// `running -> failed` for one asset, recording the error.
    pub async fn asset_failed(
        &mut self,
        asset_id: &str,
        error: impl Into<String>,
    ) -> Result<(), CoreError> {
        self.guard_active()?;
        let error = error.into();
        let progress = {
            let asset = self.asset_mut(asset_id)?;
            asset
                .status
                .validate_transition(AssetStatus::Failed)
                .map_err(CoreError::Conflict)?;
            asset.status = AssetStatus::Failed;
            asset.error = Some(error.clone());
            asset.progress
        };
        self.recompute_progress();
        self.touch();

        self.log
            .append(
                ProgressMessage::new(
                    self.query.id,
                    ProgressKind::AssetComplete,
                    format!("analysis failed: {error}"),
                )
                .with_asset(asset_id)
                .with_payload(json!({
                    "status": "failed",
                    "error": error,
                    "progress": progress,
                })),
            )
            .await;
        Ok(())
    }

    /// `queued|running -> cancelled` for one asset.
    pub async fn asset_cancelled(&mut self, asset_id: &str) -> Result<(), CoreError> {
        self.guard_active()?;
        {
            let asset = self.asset_mut(asset_id)?;
            asset
                .status
                .validate_transition(AssetStatus::Cancelled)
                .map_err(CoreError::Conflict)?;
            asset.status = AssetStatus::Cancelled;
        }
        self.recompute_progress();
        self.touch();

        self.log
            .append(
                ProgressMessage::new(
                    self.query.id,
                    ProgressKind::AssetComplete,
                    "analysis cancelled",
                )
                .with_asset(asset_id)
                .with_payload(json!({"status": "cancelled"})),
            )
            .await;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
