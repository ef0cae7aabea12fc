use thiserror::Error;

/// Failures raised while loading credentials, fetching trade pages and
/// persisting records.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to retrieve secret '{name}' ({region}): {reason}")]
    SecretRetrieval {
        name: String,
        region: String,
        reason: String,
    },
    #[error("failed to load trade page {trade_id}: HTTP {status}")]
    Fetch {
        trade_id: i64,
        status: reqwest::StatusCode,
    },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("trade page {trade_id}: {reason}")]
    Parse { trade_id: i64, reason: String },
    #[error("description did not match the trade pattern: {0:?}")]
    NoMatch(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error("trade id window after {start_id} (+{max_to_check}) overflows")]
    WindowOverflow { start_id: i64, max_to_check: u32 },
    #[error("progress store {path}: {reason}")]
    Progress { path: String, reason: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, IngestError>;
