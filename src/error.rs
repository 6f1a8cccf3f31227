use thiserror::Error;

/// Failures that abort a run. Anything else (a single block failing to fetch, a block
/// without a base fee) degrades the sample set instead of surfacing here.
#[derive(Debug, Error)]
pub enum HealthError {
    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("endpoint unreachable: {endpoint}: {reason}")]
    EndpointUnreachable { endpoint: String, reason: String },

    #[error(
        "no block data available: all {attempted} fetches at or below head {head} failed ({requested} requested)"
    )]
    NoDataAvailable {
        requested: u32,
        attempted: u32,
        head: u64,
    },
}

impl HealthError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
