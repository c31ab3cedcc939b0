//! Request handlers for the query API.
//!
//! Each submodule provides async handler functions for one resource.
//! Handlers delegate to the query engine and map errors via [`AppError`].
//!
//! [`AppError`]: crate::error::AppError

pub mod jobs;
pub mod queries;
