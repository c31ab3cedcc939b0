//! Success-response envelope.
//!
//! Every 2xx body this service returns wraps its payload as
//! `{ "data": ... }`, mirroring the `{ "error", "code" }` envelope on the
//! failure path. Handlers build the wrapper through [`DataResponse`] so
//! the shape is typed rather than assembled ad hoc per endpoint.

use serde::Serialize;

/// The `{ "data": T }` wrapper used by every successful JSON response.
///
/// ```ignore
/// Ok(Json(DataResponse { data: snapshot }))
/// ```
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}
