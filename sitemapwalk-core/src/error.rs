use sitemapwalk_scanner::ScanError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unusable SQL statement: {0}")]
    Statement(String),
}

#[derive(Error, Debug)]
pub enum RunError {
    #[error("could not read root document {path}: {source}")]
    RootRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse root document {path}: {source}")]
    RootParse {
        path: PathBuf,
        #[source]
        source: ScanError,
    },

    #[error("sink failed: {0}")]
    Sink(#[from] SinkError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("could not write tree dump to {path}: {source}")]
    TreeDump {
        path: PathBuf,
        #[source]
        source: SinkError,
    },

    #[error("Task join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, RunError>;
