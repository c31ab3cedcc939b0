/// Queries are identified by a UUIDv4 minted at submission.
pub type QueryId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
