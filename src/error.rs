use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Why a single request counted as failed. Recorded, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail")]
pub enum RequestError {
    #[error("network error: {0}")]
    Network(String),

    #[error("timeout after {0}ms")]
    Timeout(u64),

    #[error("HTTP {code} {reason}")]
    HttpStatus { code: u16, reason: String },
}

impl RequestError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            RequestError::HttpStatus { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Key used in the status breakdown for requests that produced no status.
    pub fn label(&self) -> String {
        match self {
            RequestError::Network(_) => "REQUEST_ERROR".to_string(),
            RequestError::Timeout(_) => "TIMEOUT".to_string(),
            RequestError::HttpStatus { code, .. } => code.to_string(),
        }
    }
}

/// Errors that stop the harness.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write report to {path}: {source}")]
    ReportWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode report: {0}")]
    ReportEncode(#[from] serde_json::Error),
}

pub type Result<T, E = HarnessError> = std::result::Result<T, E>;
