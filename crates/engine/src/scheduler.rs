//! Dependency-driven job scheduling.
//!
//! [`JobScheduler`] tracks one status per job in a validated [`JobGraph`]
//! and vends jobs whose dependencies have all succeeded through an
//! unbounded ready channel, each exactly once. A failure marks every
//! transitive dependent `Blocked`; unrelated branches keep flowing.

use std::collections::VecDeque;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

use showrun_core::error::CoreError;
use showrun_core::graph::JobGraph;
use showrun_core::manifest::Job;
use showrun_core::status::JobStatus;

// ---------------------------------------------------------------------------
// Outputs
// ---------------------------------------------------------------------------

/// A job whose dependencies are satisfied, ready for dispatch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReadyJob {
    pub id: String,
    #[serde(rename = "type")]
    pub job_type: String,
    pub payload: Value,
}

/// Effect of reporting a job outcome.
///
/// `changed` is `false` for an idempotent repeat of the same terminal
/// outcome. The vectors list downstream jobs whose status flipped as a
/// direct consequence of this report.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkOutcome {
    pub changed: bool,
    pub newly_ready: Vec<String>,
    pub newly_blocked: Vec<String>,
}

/// Aggregate state of the whole plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanState {
    InProgress,
    Succeeded,
    Failed,
}

impl PlanState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

/// Status counts plus the derived plan state.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanSummary {
    pub total: usize,
    pub pending: usize,
    pub ready: usize,
    pub dispatched: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub blocked: usize,
    pub state: PlanState,
}

/// Point-in-time view of one job for status listings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSnapshot {
    pub id: String,
    #[serde(rename = "type")]
    pub job_type: String,
    pub status: JobStatus,
    pub depends_on: Vec<String>,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Readiness and outcome tracking for one job plan.
///
/// Construction promotes every dependency-free job to `Ready` and vends
/// it on the returned receiver. Subsequent promotions happen inside
/// `mark_succeeded` when a job's last outstanding dependency succeeds.
/// The vend is at-most-once per job: only the `Pending -> Ready` edge
/// sends.
pub struct JobScheduler {
    graph: JobGraph,
    statuses: Vec<JobStatus>,
    /// Outstanding (not yet succeeded) dependency count per node.
    remaining: Vec<usize>,
    job_types: Vec<String>,
    payloads: Vec<Value>,
    ready_tx: mpsc::UnboundedSender<ReadyJob>,
}

impl JobScheduler {
    /// Build a scheduler over a validated graph and its source job list.
    ///
    /// The graph must have been built from `jobs`; payloads are matched
    /// back onto nodes by id. Roots are promoted immediately.
    pub fn new(graph: JobGraph, jobs: &[Job]) -> (Self, mpsc::UnboundedReceiver<ReadyJob>) {
        let (ready_tx, ready_rx) = mpsc::unbounded_channel();
        let n = graph.len();

        let mut job_types = vec![String::new(); n];
        let mut payloads = vec![Value::Null; n];
        for job in jobs {
            if let Some(node) = graph.index_of(&job.id) {
                job_types[node] = job.job_type.clone();
                payloads[node] = job.payload.clone();
            }
        }

        let remaining: Vec<usize> = (0..n).map(|i| graph.dependency_indices(i).len()).collect();
        let mut scheduler = JobScheduler {
            graph,
            statuses: vec![JobStatus::Pending; n],
            remaining,
            job_types,
            payloads,
            ready_tx,
        };
        for node in 0..n {
            if scheduler.remaining[node] == 0 {
                scheduler.promote(node);
            }
        }
        (scheduler, ready_rx)
    }

    fn node_of(&self, job_id: &str) -> Result<usize, CoreError> {
        self.graph.index_of(job_id).ok_or(CoreError::NotFound {
            entity: "job",
            id: job_id.to_string(),
        })
    }

    /// `Pending -> Ready` plus the one-time vend. No-op otherwise.
    fn promote(&mut self, node: usize) -> bool {
        if self.statuses[node] != JobStatus::Pending {
            return false;
        }
        self.statuses[node] = JobStatus::Ready;
        debug!(job_id = self.graph.id(node), "job ready");
        // The host may poll snapshots instead of draining the channel.
        let _ = self.ready_tx.send(ReadyJob {
            id: self.graph.id(node).to_string(),
            job_type: self.job_types[node].clone(),
            payload: self.payloads[node].clone(),
        });
        true
    }

    /// Record that a ready job has been handed to a dispatcher.
    pub fn mark_dispatched(&mut self, job_id: &str) -> Result<(), CoreError> {
        let node = self.node_of(job_id)?;
        self.statuses[node]
            .validate_transition(JobStatus::Dispatched)
            .map_err(CoreError::Conflict)?;
        self.statuses[node] = JobStatus::Dispatched;
        Ok(())
    }

    /// Record a success and promote any dependents it unblocks.
    ///
    /// Repeating a success for an already-succeeded job is an idempotent
    /// no-op (`changed: false`); any other terminal state conflicts.
    pub fn mark_succeeded(&mut self, job_id: &str) -> Result<MarkOutcome, CoreError> {
        let node = self.node_of(job_id)?;
        if self.statuses[node] == JobStatus::Succeeded {
            return Ok(MarkOutcome::default());
        }
        self.statuses[node]
            .validate_transition(JobStatus::Succeeded)
            .map_err(CoreError::Conflict)?;
        self.statuses[node] = JobStatus::Succeeded;

        let mut newly_ready = Vec::new();
        for i in 0..self.graph.dependent_indices(node).len() {
            let dependent = self.graph.dependent_indices(node)[i];
            self.remaining[dependent] -= 1;
            if self.remaining[dependent] == 0 && self.promote(dependent) {
                newly_ready.push(self.graph.id(dependent).to_string());
            }
        }
        Ok(MarkOutcome {
            changed: true,
            newly_ready,
            newly_blocked: Vec::new(),
        })
    }

    /// Record a failure and block every transitive dependent.
    ///
    /// Only `Pending` dependents flip to `Blocked`; a dependent already
    /// blocked by an earlier failure is left as is.
    pub fn mark_failed(&mut self, job_id: &str) -> Result<MarkOutcome, CoreError> {
        let node = self.node_of(job_id)?;
        if self.statuses[node] == JobStatus::Failed {
            return Ok(MarkOutcome::default());
        }
        self.statuses[node]
            .validate_transition(JobStatus::Failed)
            .map_err(CoreError::Conflict)?;
        self.statuses[node] = JobStatus::Failed;

        let mut newly_blocked = Vec::new();
        let mut queue: VecDeque<usize> = self.graph.dependent_indices(node).iter().copied().collect();
        while let Some(dependent) = queue.pop_front() {
            if self.statuses[dependent] != JobStatus::Pending {
                continue;
            }
            self.statuses[dependent] = JobStatus::Blocked;
            newly_blocked.push(self.graph.id(dependent).to_string());
            queue.extend(self.graph.dependent_indices(dependent).iter().copied());
        }
        debug!(
            job_id,
            blocked = newly_blocked.len(),
            "job failed, dependents blocked"
        );
        Ok(MarkOutcome {
            changed: true,
            newly_ready: Vec::new(),
            newly_blocked,
        })
    }

    pub fn status_of(&self, job_id: &str) -> Result<JobStatus, CoreError> {
        Ok(self.statuses[self.node_of(job_id)?])
    }

    /// All jobs in declared order.
    pub fn snapshot(&self) -> Vec<JobSnapshot> {
        (0..self.graph.len())
            .map(|node| JobSnapshot {
                id: self.graph.id(node).to_string(),
                job_type: self.job_types[node].clone(),
                status: self.statuses[node],
                depends_on: self
                    .graph
                    .dependency_indices(node)
                    .iter()
                    .map(|&d| self.graph.id(d).to_string())
                    .collect(),
            })
            .collect()
    }

    /// Status counts and the derived plan state.
    ///
    /// Any failed job makes the plan `Failed`; all jobs succeeded makes
    /// it `Succeeded`; otherwise it is still in progress.
    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary {
            total: self.statuses.len(),
            pending: 0,
            ready: 0,
            dispatched: 0,
            succeeded: 0,
            failed: 0,
            blocked: 0,
            state: PlanState::InProgress,
        };
        for status in &self.statuses {
            match status {
                JobStatus::Pending => summary.pending += 1,
                JobStatus::Ready => summary.ready += 1,
                JobStatus::Dispatched => summary.dispatched += 1,
                JobStatus::Succeeded => summary.succeeded += 1,
                JobStatus::Failed => summary.failed += 1,
                JobStatus::Blocked => summary.blocked += 1,
            }
        }
        summary.state = if summary.failed > 0 {
            PlanState::Failed
        } else if summary.succeeded == summary.total {
            PlanState::Succeeded
        } else {
            PlanState::InProgress
        };
        summary
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
