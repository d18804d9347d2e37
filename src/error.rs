use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("rate limited by {url} (retry after {retry_after_secs}s)")]
    RateLimited { url: String, retry_after_secs: u64 },

    #[error("unexpected response shape from {context}: {reason}")]
    UnexpectedShape { context: String, reason: String },

    #[error("skipped entry on page {page}: {reason}")]
    InvalidEntry { page: u32, reason: String },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize output document: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Coarse classification used to decide whether a failure stops the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A request could not complete. The current store is abandoned.
    Network,
    /// One listing entry was malformed. Only that entry is dropped.
    Parse,
    /// The output document could not be persisted. Fatal.
    Write,
    /// Bad flags or store file. Fatal.
    Config,
}

impl ScrapeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Http(_)
            | Self::UnexpectedStatus { .. }
            | Self::RateLimited { .. }
            | Self::UnexpectedShape { .. } => ErrorKind::Network,
            Self::InvalidEntry { .. } => ErrorKind::Parse,
            Self::Write { .. } | Self::Serialize(_) => ErrorKind::Write,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self.kind(), ErrorKind::Write | ErrorKind::Config)
    }

    /// Transport failures, 429 and 5xx are worth another attempt; everything
    /// else would fail the same way again.
    pub(crate) fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::RateLimited { .. } => true,
            Self::UnexpectedStatus { status, .. } => *status >= 500,
            _ => false,
        }
    }
}
