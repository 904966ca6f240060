use std::time::Duration;
use thiserror::Error;

/// Failures at the chain-data boundary. All variants are transient from the
/// pipeline's point of view: the tracker leaves the cursor untouched and the
/// next scheduled pass retries the same range.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("chain source request failed: {0}")]
    Remote(String),
    #[error("chain source request timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}
