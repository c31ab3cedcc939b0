//! Progress event infrastructure for the showrun engine.
//!
//! This crate provides the building blocks for ordered, replayable
//! progress delivery:
//!
//! - [`ProgressMessage`]: the immutable per-query event envelope.
//! - [`ProgressLog`]: per-query append-only log; the single ordering
//!   authority for a query's messages.
//! - [`ProgressStream`]: cursor-based consumption with
//!   replay-from-start, then live delivery, no duplicates and no gaps.
//! - [`ProgressBroadcaster`]: registry of logs keyed by query id.

pub mod broadcaster;
pub mod log;
pub mod message;

pub use broadcaster::ProgressBroadcaster;
pub use log::{ProgressLog, ProgressStream};
pub use message::{ProgressKind, ProgressMessage};
