//! Query orchestration engine.
//!
//! Turns a validated creative request into a sealed production manifest
//! and an executable job plan. [`QueryEngine`] is the entry point:
//! `submit` spawns the full background run (concurrent asset analysis,
//! required-asset gating, planning, assembly) and every intermediate
//! state change is published through the per-query progress log from
//! `showrun-events`.
//!
//! Provider seams ([`AnalysisProvider`], [`ManifestPlanner`]) keep the
//! engine independent of any concrete analysis or generation backend;
//! deterministic built-ins make it fully runnable on its own.

pub mod analysis;
pub mod assembler;
pub mod builtin;
pub mod config;
pub mod providers;
pub mod scheduler;
pub mod service;
pub mod tracker;

pub use assembler::{assemble, AssembledPlan, AssemblyFailure};
pub use config::EngineConfig;
pub use providers::{
    AnalysisProvider, AssetAnalysis, ManifestPlanner, ProgressReporter, ProviderError,
};
pub use scheduler::{JobScheduler, JobSnapshot, MarkOutcome, PlanState, PlanSummary, ReadyJob};
pub use service::{QueryEngine, QuerySnapshot, SubmitRequest};
pub use tracker::ProgressTracker;
