//! Concurrent asset analysis fan-out.
//!
//! [`run_analyses`] spawns one task per input asset, bounded by a
//! semaphore, and funnels every provider-side event through the shared
//! [`ProgressTracker`]. Each task settles its asset exactly once:
//! completed, failed (provider error or timeout), or cancelled. The
//! call returns only after every spawned task has finished, so the
//! caller can inspect the tracker without racing it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use showrun_core::query::InputAsset;

use crate::config::EngineConfig;
use crate::providers::{AnalysisProvider, AssetAnalysis, ProgressReporter};
use crate::tracker::ProgressTracker;

/// Run every asset analysis to a terminal state.
///
/// Returns the successful analyses in asset declaration order. Failures
/// and cancellations are recorded on the tracker, not returned; the
/// caller decides afterwards whether required-asset failures sink the
/// query.
pub async fn run_analyses(
    analyzer: Arc<dyn AnalysisProvider>,
    tracker: Arc<Mutex<ProgressTracker>>,
    assets: Vec<InputAsset>,
    config: EngineConfig,
    cancel: CancellationToken,
) -> Vec<AssetAnalysis> {
    let semaphore = Arc::new(Semaphore::new(config.max_concurrent_analyses.max(1)));
    let mut handles = Vec::with_capacity(assets.len());
    for asset in assets {
        handles.push(tokio::spawn(analyze_one(
            Arc::clone(&analyzer),
            Arc::clone(&tracker),
            asset,
            Arc::clone(&semaphore),
            config.provider_timeout,
            cancel.clone(),
        )));
    }

    let mut analyses = Vec::new();
    for handle in handles {
        if let Ok(Some(analysis)) = handle.await {
            analyses.push(analysis);
        }
    }
    analyses
}

/// Drive one asset to a terminal state. Returns the analysis on success.
async fn analyze_one(
    analyzer: Arc<dyn AnalysisProvider>,
    tracker: Arc<Mutex<ProgressTracker>>,
    asset: InputAsset,
    semaphore: Arc<Semaphore>,
    provider_timeout: Duration,
    cancel: CancellationToken,
) -> Option<AssetAnalysis> {
    // Closed only when the whole run is torn down.
    let _permit = semaphore.acquire_owned().await.ok()?;

    if cancel.is_cancelled() {
        settle_cancelled(&tracker, &asset.id).await;
        return None;
    }

    if let Err(err) = tracker.lock().await.asset_started(&asset.id).await {
        debug!(asset_id = %asset.id, %err, "asset could not start");
        return None;
    }

    let (reporter, mut progress_rx) = ProgressReporter::channel();
    let analyze = timeout(provider_timeout, analyzer.analyze(&asset, &reporter));
    tokio::pin!(analyze);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                settle_cancelled(&tracker, &asset.id).await;
                return None;
            }
            Some(percent) = progress_rx.recv() => {
                if let Err(err) = tracker.lock().await.asset_progress(&asset.id, percent).await {
                    debug!(asset_id = %asset.id, %err, "dropping late progress report");
                }
            }
            result = &mut analyze => {
                return match result {
                    Ok(Ok(analysis)) => {
                        let settled = tracker
                            .lock()
                            .await
                            .asset_completed(&asset.id, Some(analysis.quality_score))
                            .await;
                        match settled {
                            Ok(()) => Some(analysis),
                            Err(err) => {
                                debug!(asset_id = %asset.id, %err, "dropping completion for settled asset");
                                None
                            }
                        }
                    }
                    Ok(Err(err)) => {
                        settle_failed(&tracker, &asset.id, err.to_string()).await;
                        None
                    }
                    Err(_) => {
                        settle_failed(
                            &tracker,
                            &asset.id,
                            format!("analysis timed out after {provider_timeout:?}"),
                        )
                        .await;
                        None
                    }
                };
            }
        }
    }
}

async fn settle_cancelled(tracker: &Arc<Mutex<ProgressTracker>>, asset_id: &str) {
    if let Err(err) = tracker.lock().await.asset_cancelled(asset_id).await {
        debug!(asset_id, %err, "dropping cancellation for settled asset");
    }
}

async fn settle_failed(tracker: &Arc<Mutex<ProgressTracker>>, asset_id: &str, error: String) {
    if let Err(err) = tracker.lock().await.asset_failed(asset_id, error).await {
        debug!(asset_id, %err, "dropping failure for settled asset");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use showrun_core::manifest::{AssetSource, MediaType};
    use showrun_core::query::{Query, QueryConstraints};
    use showrun_core::status::AssetStatus;
    use showrun_events::ProgressLog;

    use crate::builtin::HeuristicAnalyzer;
    use crate::providers::ProviderError;

    fn input(id: &str) -> InputAsset {
        InputAsset {
            id: id.to_string(),
            media_type: MediaType::Image,
            source: AssetSource::User,
            uri: None,
            label: None,
            required: true,
        }
    }

    async fn tracker_for(inputs: &[InputAsset]) -> (Arc<Mutex<ProgressTracker>>, Arc<ProgressLog>) {
        let query = Query::new(
            "prompt",
            QueryConstraints {
                duration_seconds: 60,
                aspect_ratio: "16:9".to_string(),
                platform: "youtube".to_string(),
                language: "en".to_string(),
            },
        );
        let log = Arc::new(ProgressLog::new(query.id));
        let mut tracker = ProgressTracker::new(query, inputs, Arc::clone(&log));
        tracker.begin_analysis().await.unwrap();
        (Arc::new(Mutex::new(tracker)), log)
    }

    fn config(timeout: Duration) -> EngineConfig {
        EngineConfig {
            max_concurrent_analyses: 4,
            provider_timeout: timeout,
        }
    }

    struct SlowProvider;

    #[async_trait]
    impl AnalysisProvider for SlowProvider {
        async fn analyze(
            &self,
            _asset: &InputAsset,
            _progress: &ProgressReporter,
        ) -> Result<AssetAnalysis, ProviderError> {
            tokio::time::sleep(Duration::from_millis(500)).await;
            Err(ProviderError::Failed("should not get here".to_string()))
        }
    }

    struct FailingProvider;

    #[async_trait]
    impl AnalysisProvider for FailingProvider {
        async fn analyze(
            &self,
            _asset: &InputAsset,
            _progress: &ProgressReporter,
        ) -> Result<AssetAnalysis, ProviderError> {
            Err(ProviderError::Failed("corrupt container".to_string()))
        }
    }

    struct ConcurrencyProbe {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl AnalysisProvider for ConcurrencyProbe {
        async fn analyze(
            &self,
            asset: &InputAsset,
            _progress: &ProgressReporter,
        ) -> Result<AssetAnalysis, ProviderError> {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
            Ok(AssetAnalysis {
                asset_id: asset.id.clone(),
                quality_score: 0.7,
                summary: "probe".to_string(),
                tags: vec![],
                duration_seconds: None,
            })
        }
    }

    // -- Outcomes -------------------------------------------------------------

    #[tokio::test]
    async fn all_assets_complete_with_builtin_analyzer() {
        let inputs = vec![input("a1"), input("a2")];
        let (tracker, _log) = tracker_for(&inputs).await;
        let analyses = run_analyses(
            Arc::new(HeuristicAnalyzer),
            Arc::clone(&tracker),
            inputs,
            config(Duration::from_secs(5)),
            CancellationToken::new(),
        )
        .await;

        assert_eq!(analyses.len(), 2);
        assert_eq!(analyses[0].asset_id, "a1");
        assert_eq!(analyses[1].asset_id, "a2");

        let guard = tracker.lock().await;
        assert!(guard.all_assets_terminal());
        for state in guard.assets() {
            assert_eq!(state.status, AssetStatus::Completed);
            assert_eq!(state.progress, 100);
            assert!(state.quality_score.is_some());
        }
        assert_eq!(guard.query().progress, 90);
    }

    #[tokio::test]
    async fn provider_error_fails_the_asset() {
        let inputs = vec![input("a1")];
        let (tracker, _log) = tracker_for(&inputs).await;
        let analyses = run_analyses(
            Arc::new(FailingProvider),
            Arc::clone(&tracker),
            inputs,
            config(Duration::from_secs(5)),
            CancellationToken::new(),
        )
        .await;

        assert!(analyses.is_empty());
        let guard = tracker.lock().await;
        let state = &guard.assets()[0];
        assert_eq!(state.status, AssetStatus::Failed);
        assert!(state.error.as_ref().unwrap().contains("corrupt container"));
    }

    #[tokio::test]
    async fn slow_provider_times_out_as_failure() {
        let inputs = vec![input("a1")];
        let (tracker, _log) = tracker_for(&inputs).await;
        let analyses = run_analyses(
            Arc::new(SlowProvider),
            Arc::clone(&tracker),
            inputs,
            config(Duration::from_millis(50)),
            CancellationToken::new(),
        )
        .await;

        assert!(analyses.is_empty());
        let guard = tracker.lock().await;
        let state = &guard.assets()[0];
        assert_eq!(state.status, AssetStatus::Failed);
        assert!(state.error.as_ref().unwrap().contains("timed out"));
    }

    // -- Cancellation ---------------------------------------------------------

    #[tokio::test]
    async fn pre_cancelled_token_cancels_all_assets() {
        let inputs = vec![input("a1"), input("a2")];
        let (tracker, _log) = tracker_for(&inputs).await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let analyses = run_analyses(
            Arc::new(HeuristicAnalyzer),
            Arc::clone(&tracker),
            inputs,
            config(Duration::from_secs(5)),
            cancel,
        )
        .await;

        assert!(analyses.is_empty());
        let guard = tracker.lock().await;
        for state in guard.assets() {
            assert_eq!(state.status, AssetStatus::Cancelled);
        }
    }

    #[tokio::test]
    async fn cancel_mid_flight_settles_running_assets() {
        let inputs = vec![input("a1")];
        let (tracker, _log) = tracker_for(&inputs).await;
        let cancel = CancellationToken::new();

        let run = tokio::spawn(run_analyses(
            Arc::new(SlowProvider),
            Arc::clone(&tracker),
            inputs,
            config(Duration::from_secs(5)),
            cancel.clone(),
        ));
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        let analyses = run.await.unwrap();
        assert!(analyses.is_empty());
        let guard = tracker.lock().await;
        assert_eq!(guard.assets()[0].status, AssetStatus::Cancelled);
    }

    // -- Concurrency and progress ---------------------------------------------

    #[tokio::test]
    async fn concurrency_stays_within_the_configured_bound() {
        let inputs: Vec<InputAsset> = (1..=6).map(|i| input(&format!("a{i}"))).collect();
        let (tracker, _log) = tracker_for(&inputs).await;
        let probe = Arc::new(ConcurrencyProbe {
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });

        let analyses = run_analyses(
            Arc::clone(&probe) as Arc<dyn AnalysisProvider>,
            Arc::clone(&tracker),
            inputs,
            EngineConfig {
                max_concurrent_analyses: 2,
                provider_timeout: Duration::from_secs(5),
            },
            CancellationToken::new(),
        )
        .await;

        assert_eq!(analyses.len(), 6);
        assert!(probe.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn provider_progress_reports_reach_the_log() {
        let inputs = vec![input("a1")];
        let (tracker, log) = tracker_for(&inputs).await;
        run_analyses(
            Arc::new(HeuristicAnalyzer),
            Arc::clone(&tracker),
            inputs,
            config(Duration::from_secs(5)),
            CancellationToken::new(),
        )
        .await;

        let progress_values: Vec<u64> = log
            .snapshot()
            .await
            .iter()
            .filter(|m| m.kind == showrun_events::ProgressKind::AssetProgress)
            .map(|m| m.payload["progress"].as_u64().unwrap())
            .collect();
        assert!(!progress_values.is_empty());
        assert!(progress_values.windows(2).all(|w| w[0] <= w[1]));
    }
}
