//! Pure domain logic for the showrun planning engine.
//!
//! Everything here is synchronous and side-effect free. The same rules
//! serve the engine, the HTTP layer, and any future worker tooling:
//!
//! - [`timeline`]: scene timing validation (overlaps, gaps, exact
//!   duration-sum equality).
//! - [`references`]: referential integrity over a manifest draft.
//! - [`graph`]: job dependency graph construction and cycle detection.
//! - [`status`]: query/asset/job state machines.
//! - [`quality_gate`]: manifest gate evaluation.
//! - [`manifest`] / [`query`]: the document and request data model.

pub mod error;
pub mod graph;
pub mod manifest;
pub mod quality_gate;
pub mod query;
pub mod references;
pub mod status;
pub mod timeline;
pub mod types;

pub use error::CoreError;
pub use graph::{JobGraph, JobGraphError};
pub use manifest::{Manifest, ManifestDraft};
pub use query::{InputAsset, Query, QueryConstraints};
pub use references::DanglingReference;
pub use status::{AssetStatus, JobStatus, QueryStatus};
pub use timeline::{TimelineReport, TimelineViolation};
pub use types::{QueryId, Timestamp};
