use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request for {location} failed: {source}")]
    Fetch {
        location: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{location} answered with HTTP {status}")]
    Status { location: String, status: u16 },

    #[error("{location} did not answer within {timeout:?}")]
    Timeout { location: String, timeout: Duration },

    #[error("gzip body of {location} could not be decompressed: {source}")]
    Decode {
        location: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("{0} references itself through its ancestors")]
    CycleDetected(String),

    #[error("expansion cancelled before {0} was fetched")]
    Cancelled(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Task join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),

    #[error("Other error: {0}")]
    Other(String),
}

impl From<quick_xml::Error> for ScanError {
    fn from(e: quick_xml::Error) -> Self {
        ScanError::Parse(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
