// Error type shared by the fetch, extract, reconcile and persistence stages.
// main.rs sticks to anyhow; everything below it returns TrackerError.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    // A single page could not be fetched (timeout, non-2xx, connection failure)
    #[error("network error fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    // The persisted snapshot exists but could not be read
    #[error("failed to parse snapshot {}: {reason}", .path.display())]
    Parse { path: PathBuf, reason: String },

    // The prior snapshot cannot be indexed by product name
    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(String),

    // Nothing was scraped across all pages
    #[error("no products were found on any catalog page")]
    NoData,

    #[error("failed to write snapshot {}: {reason}", .path.display())]
    Report { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl TrackerError {
    pub fn parse(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        TrackerError::Parse {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn report(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        TrackerError::Report {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

pub type TrackerResult<T> = Result<T, TrackerError>;
