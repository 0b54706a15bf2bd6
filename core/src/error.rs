use std::io;
use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PpErr>;

/// How a request to the API ended, as far as the transport can tell. The
/// streaming core never inspects status codes itself; it only ever sees one
/// of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportOutcome {
    Success,
    AuthRejected,
    RateLimited { retry_after_seconds: Option<u64> },
    TransientFailure,
    Other,
}

impl TransportOutcome {
    pub fn classify(status: StatusCode, retry_after_seconds: Option<u64>) -> Self {
        if status.is_success() {
            TransportOutcome::Success
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            TransportOutcome::AuthRejected
        } else if status == StatusCode::TOO_MANY_REQUESTS {
            TransportOutcome::RateLimited {
                retry_after_seconds,
            }
        } else if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
            TransportOutcome::TransientFailure
        } else {
            TransportOutcome::Other
        }
    }
}

impl std::fmt::Display for TransportOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportOutcome::Success => write!(f, "request succeeded"),
            TransportOutcome::AuthRejected => {
                write!(f, "the API rejected the key; run `pp config` to update it")
            }
            TransportOutcome::RateLimited {
                retry_after_seconds: Some(secs),
            } => write!(f, "rate limited; retry in {secs}s"),
            TransportOutcome::RateLimited {
                retry_after_seconds: None,
            } => write!(f, "rate limited; retry later"),
            TransportOutcome::TransientFailure => write!(f, "the API is temporarily unavailable"),
            TransportOutcome::Other => write!(f, "the API returned an unexpected response"),
        }
    }
}

#[derive(Error, Debug)]
pub enum PpErr {
    /// Non-success HTTP status, classified. The body is kept for diagnostics.
    #[error("{outcome} (HTTP {status}): {body}")]
    Transport {
        outcome: TransportOutcome,
        status: StatusCode,
        body: String,
    },

    /// The event stream broke off after it had started.
    #[error("stream error: {0}")]
    Stream(String),

    #[error("no configuration found at {}; run `pp config`", .0.display())]
    MissingConfig(PathBuf),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl PpErr {
    pub fn outcome(&self) -> Option<TransportOutcome> {
        match self {
            PpErr::Transport { outcome, .. } => Some(*outcome),
            PpErr::Reqwest(e) if e.is_timeout() || e.is_connect() => {
                Some(TransportOutcome::TransientFailure)
            }
            _ => None,
        }
    }
}
