//! The query engine: submission, orchestration, and job plan access.
//!
//! [`QueryEngine`] owns every live query. `submit` validates the request,
//! registers the progress log, and spawns the background run: analyze all
//! assets, gate on required failures, plan, assemble, and either complete
//! with a job plan or fail with a structured reason. The progress log is
//! closed exactly once, when the query settles.
//!
//! Completed queries expose their manifest and a claim/report surface
//! over the job scheduler; everything else answers with a conflict.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use showrun_core::error::CoreError;
use showrun_core::manifest::Manifest;
use showrun_core::query::{
    validate_submission, AssetState, FailureCode, FailureReason, InputAsset, Query,
    QueryConstraints,
};
use showrun_core::status::QueryStatus;
use showrun_core::types::QueryId;
use showrun_events::{ProgressBroadcaster, ProgressMessage, ProgressStream};

use crate::analysis::run_analyses;
use crate::assembler::assemble;
use crate::builtin::{HeuristicAnalyzer, TemplatePlanner};
use crate::config::EngineConfig;
use crate::providers::{AnalysisProvider, ManifestPlanner};
use crate::scheduler::{JobScheduler, JobSnapshot, MarkOutcome, PlanSummary, ReadyJob};
use crate::tracker::ProgressTracker;

// ---------------------------------------------------------------------------
// Requests and views
// ---------------------------------------------------------------------------

/// A creative request as submitted by the caller.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitRequest {
    pub prompt: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub constraints: QueryConstraints,
    #[serde(default)]
    pub assets: Vec<InputAsset>,
}

/// Point-in-time view of one query: lifecycle state, per-asset states,
/// and the full progress history.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySnapshot {
    pub query: Query,
    pub assets: Vec<AssetState>,
    pub messages: Vec<ProgressMessage>,
}

// ---------------------------------------------------------------------------
// Internal state
// ---------------------------------------------------------------------------

/// The executable side of a completed query.
struct PlanHandle {
    manifest: Arc<Manifest>,
    scheduler: Mutex<JobScheduler>,
    ready_rx: Mutex<mpsc::UnboundedReceiver<ReadyJob>>,
}

struct QueryEntry {
    user_id: String,
    assets: Vec<InputAsset>,
    tracker: Arc<Mutex<ProgressTracker>>,
    cancel: CancellationToken,
    /// Set exactly once, after the query transitions to completed.
    plan: RwLock<Option<Arc<PlanHandle>>>,
}

// ---------------------------------------------------------------------------
// QueryEngine
// ---------------------------------------------------------------------------

/// In-process engine hosting all live queries.
pub struct QueryEngine {
    config: EngineConfig,
    broadcaster: Arc<ProgressBroadcaster>,
    analyzer: Arc<dyn AnalysisProvider>,
    planner: Arc<dyn ManifestPlanner>,
    queries: RwLock<HashMap<QueryId, Arc<QueryEntry>>>,
}

impl QueryEngine {
    pub fn new(
        config: EngineConfig,
        analyzer: Arc<dyn AnalysisProvider>,
        planner: Arc<dyn ManifestPlanner>,
    ) -> Self {
        Self {
            config,
            broadcaster: Arc::new(ProgressBroadcaster::default()),
            analyzer,
            planner,
            queries: RwLock::new(HashMap::new()),
        }
    }

    /// Engine backed by the deterministic built-in providers.
    pub fn with_builtins(config: EngineConfig) -> Self {
        Self::new(config, Arc::new(HeuristicAnalyzer), Arc::new(TemplatePlanner))
    }

    async fn entry(&self, query_id: QueryId) -> Result<Arc<QueryEntry>, CoreError> {
        self.queries
            .read()
            .await
            .get(&query_id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound {
                entity: "query",
                id: query_id.to_string(),
            })
    }

    async fn plan_handle(&self, query_id: QueryId) -> Result<Arc<PlanHandle>, CoreError> {
        let entry = self.entry(query_id).await?;
        let plan = entry.plan.read().await.clone();
        plan.ok_or_else(|| {
            CoreError::Conflict(format!(
                "Query {query_id} has no job plan; it is available once the query completes"
            ))
        })
    }

    /// Number of queries currently held (any state).
    pub async fn query_count(&self) -> usize {
        self.queries.read().await.len()
    }

    /// Number of held queries that have not reached a terminal status.
    ///
    /// Used by hosts to report load and to drain before shutdown.
    pub async fn active_query_count(&self) -> usize {
        let entries: Vec<_> = self.queries.read().await.values().cloned().collect();
        let mut active = 0;
        for entry in entries {
            if !entry.tracker.lock().await.is_terminal() {
                active += 1;
            }
        }
        active
    }

    // -----------------------------------------------------------------------
    // Submission and lifecycle
    // -----------------------------------------------------------------------

    /// Validate and accept a request, spawning its background run.
    pub async fn submit(self: &Arc<Self>, request: SubmitRequest) -> Result<QueryId, CoreError> {
        validate_submission(&request.prompt, &request.constraints, &request.assets)?;

        let query = Query::new(request.prompt, request.constraints);
        let query_id = query.id;
        let log = self.broadcaster.register(query_id).await;
        let tracker = ProgressTracker::new(query, &request.assets, log);

        let asset_count = request.assets.len();
        let entry = Arc::new(QueryEntry {
            user_id: request.user_id.unwrap_or_else(|| "anonymous".to_string()),
            assets: request.assets,
            tracker: Arc::new(Mutex::new(tracker)),
            cancel: CancellationToken::new(),
            plan: RwLock::new(None),
        });
        self.queries.write().await.insert(query_id, entry);

        let engine = Arc::clone(self);
        tokio::spawn(async move {
            engine.run_query(query_id).await;
        });

        info!(%query_id, assets = asset_count, "query submitted");
        Ok(query_id)
    }

    /// Drive one query from pending to a terminal state.
    async fn run_query(&self, query_id: QueryId) {
        let Ok(entry) = self.entry(query_id).await else {
            return;
        };

        {
            let mut tracker = entry.tracker.lock().await;
            if let Err(err) = tracker.begin_analysis().await {
                debug!(%query_id, %err, "query no longer pending");
                self.broadcaster.close(query_id).await;
                return;
            }
        }

        let analyses = run_analyses(
            Arc::clone(&self.analyzer),
            Arc::clone(&entry.tracker),
            entry.assets.clone(),
            self.config.clone(),
            entry.cancel.clone(),
        )
        .await;

        // Settle the analysis phase: bail on cancellation, fail on required
        // losses, otherwise move to merging.
        let (query, states) = {
            let mut tracker = entry.tracker.lock().await;
            if tracker.is_terminal() {
                self.broadcaster.close(query_id).await;
                return;
            }
            let failed = tracker.failed_required_assets();
            if !failed.is_empty() {
                let reason = FailureReason::new(
                    FailureCode::RequiredAssetFailed,
                    format!("{} required asset(s) failed analysis", failed.len()),
                )
                .with_details(json!({"assetIds": failed}));
                if let Err(err) = tracker.fail(reason).await {
                    debug!(%query_id, %err, "failure raced terminal state");
                }
                self.broadcaster.close(query_id).await;
                return;
            }
            if let Err(err) = tracker.begin_merging().await {
                debug!(%query_id, %err, "merge raced terminal state");
                self.broadcaster.close(query_id).await;
                return;
            }
            (tracker.query().clone(), tracker.assets().to_vec())
        };

        match self
            .planner
            .plan(&query, &entry.user_id, &entry.assets, &analyses)
            .await
        {
            Ok(draft) => match assemble(draft, &states) {
                Ok(plan) => {
                    let job_count = plan.manifest.jobs.len();
                    let (scheduler, ready_rx) = JobScheduler::new(plan.graph, &plan.manifest.jobs);
                    let handle = Arc::new(PlanHandle {
                        manifest: Arc::new(plan.manifest),
                        scheduler: Mutex::new(scheduler),
                        ready_rx: Mutex::new(ready_rx),
                    });

                    let mut tracker = entry.tracker.lock().await;
                    match tracker.complete().await {
                        Ok(()) => {
                            *entry.plan.write().await = Some(handle);
                            info!(%query_id, jobs = job_count, "query completed; job plan ready");
                        }
                        Err(err) => debug!(%query_id, %err, "completion raced terminal state"),
                    }
                }
                Err(failure) => {
                    let reason =
                        FailureReason::new(FailureCode::ValidationFailed, failure.summary())
                            .with_details(failure.to_details());
                    let mut tracker = entry.tracker.lock().await;
                    if let Err(err) = tracker.fail(reason).await {
                        debug!(%query_id, %err, "failure raced terminal state");
                    }
                }
            },
            Err(err) => {
                let reason = FailureReason::new(FailureCode::PlanningFailed, err.to_string());
                let mut tracker = entry.tracker.lock().await;
                if let Err(err) = tracker.fail(reason).await {
                    debug!(%query_id, %err, "failure raced terminal state");
                }
            }
        }

        self.broadcaster.close(query_id).await;
    }

    /// Cancel an active query. Conflicts once it is terminal.
    pub async fn cancel(&self, query_id: QueryId) -> Result<(), CoreError> {
        let entry = self.entry(query_id).await?;
        entry.cancel.cancel();
        {
            let mut tracker = entry.tracker.lock().await;
            tracker.cancel().await?;
        }
        self.broadcaster.close(query_id).await;
        info!(%query_id, "query cancelled");
        Ok(())
    }

    /// Drop a settled query and its progress history.
    pub async fn retire(&self, query_id: QueryId) -> Result<(), CoreError> {
        let entry = self.entry(query_id).await?;
        {
            let tracker = entry.tracker.lock().await;
            if !tracker.is_terminal() {
                return Err(CoreError::Conflict(format!(
                    "Query {query_id} is still active"
                )));
            }
        }
        self.queries.write().await.remove(&query_id);
        self.broadcaster.retire(query_id).await;
        info!(%query_id, "query retired");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Read access
    // -----------------------------------------------------------------------

    pub async fn snapshot(&self, query_id: QueryId) -> Result<QuerySnapshot, CoreError> {
        let entry = self.entry(query_id).await?;
        let (query, assets) = {
            let tracker = entry.tracker.lock().await;
            (tracker.query().clone(), tracker.assets().to_vec())
        };
        let messages = match self.broadcaster.get(query_id).await {
            Some(log) => log
                .snapshot()
                .await
                .iter()
                .map(|m| (**m).clone())
                .collect(),
            None => Vec::new(),
        };
        Ok(QuerySnapshot {
            query,
            assets,
            messages,
        })
    }

    /// Subscribe to the query's progress: full replay, then live messages.
    pub async fn subscribe(&self, query_id: QueryId) -> Result<ProgressStream, CoreError> {
        self.broadcaster
            .subscribe(query_id)
            .await
            .ok_or_else(|| CoreError::NotFound {
                entity: "query",
                id: query_id.to_string(),
            })
    }

    /// The sealed manifest of a completed query.
    pub async fn manifest(&self, query_id: QueryId) -> Result<Arc<Manifest>, CoreError> {
        let entry = self.entry(query_id).await?;
        if let Some(plan) = entry.plan.read().await.as_ref() {
            return Ok(Arc::clone(&plan.manifest));
        }
        let tracker = entry.tracker.lock().await;
        match tracker.query().status {
            QueryStatus::Failed => Err(CoreError::Conflict(format!(
                "Query {query_id} failed; no manifest was produced"
            ))),
            _ => Err(CoreError::Conflict(format!(
                "Query {query_id} has not completed; manifest not yet available"
            ))),
        }
    }

    // -----------------------------------------------------------------------
    // Job plan surface
    // -----------------------------------------------------------------------

    /// Claim the next ready job, marking it dispatched.
    ///
    /// With `wait`, blocks up to that long for a job to become ready.
    /// Jobs settled out of band before being claimed are skipped.
    pub async fn claim_ready(
        &self,
        query_id: QueryId,
        wait: Option<Duration>,
    ) -> Result<Option<ReadyJob>, CoreError> {
        let plan = self.plan_handle(query_id).await?;
        let mut rx = plan.ready_rx.lock().await;
        loop {
            let candidate = match rx.try_recv() {
                Ok(job) => Some(job),
                Err(mpsc::error::TryRecvError::Empty) => match wait {
                    Some(d) => timeout(d, rx.recv()).await.ok().flatten(),
                    None => None,
                },
                Err(mpsc::error::TryRecvError::Disconnected) => None,
            };
            let Some(job) = candidate else {
                return Ok(None);
            };
            let mut scheduler = plan.scheduler.lock().await;
            match scheduler.mark_dispatched(&job.id) {
                Ok(()) => return Ok(Some(job)),
                Err(err) => {
                    debug!(job_id = %job.id, %err, "skipping stale ready entry");
                }
            }
        }
    }

    /// Report a job success, promoting any dependents it unblocks.
    pub async fn mark_job_succeeded(
        &self,
        query_id: QueryId,
        job_id: &str,
    ) -> Result<MarkOutcome, CoreError> {
        let plan = self.plan_handle(query_id).await?;
        let outcome = plan.scheduler.lock().await.mark_succeeded(job_id)?;
        if outcome.changed {
            info!(%query_id, job_id, newly_ready = outcome.newly_ready.len(), "job succeeded");
        }
        Ok(outcome)
    }

    /// Report a job failure, blocking its transitive dependents.
    pub async fn mark_job_failed(
        &self,
        query_id: QueryId,
        job_id: &str,
    ) -> Result<MarkOutcome, CoreError> {
        let plan = self.plan_handle(query_id).await?;
        let outcome = plan.scheduler.lock().await.mark_failed(job_id)?;
        if outcome.changed {
            info!(%query_id, job_id, newly_blocked = outcome.newly_blocked.len(), "job failed");
        }
        Ok(outcome)
    }

    pub async fn job_statuses(&self, query_id: QueryId) -> Result<Vec<JobSnapshot>, CoreError> {
        let plan = self.plan_handle(query_id).await?;
        let snapshot = plan.scheduler.lock().await.snapshot();
        Ok(snapshot)
    }

    pub async fn plan_summary(&self, query_id: QueryId) -> Result<PlanSummary, CoreError> {
        let plan = self.plan_handle(query_id).await?;
        let summary = plan.scheduler.lock().await.summary();
        Ok(summary)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
