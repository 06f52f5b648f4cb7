use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Failures talking to an HTTP collaborator
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => ApiError::Status {
                status: status.as_u16(),
                url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            },
            None => ApiError::Transport(err.to_string()),
        }
    }
}

/// Acquisition failure for a single (colo, target) attempt
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    #[error("no traceroute response: {0}")]
    NoTracerouteResponse(String),
    #[error("failed traceroute execution: {0}")]
    FailedTracerouteExecution(String),
}

impl FetchFailure {
    pub fn reason(&self) -> SkipReason {
        match self {
            Self::NoTracerouteResponse(_) => SkipReason::NoTracerouteResponse,
            Self::FailedTracerouteExecution(_) => SkipReason::FailedTracerouteExecution,
        }
    }

    pub fn detail(&self) -> &str {
        match self {
            Self::NoTracerouteResponse(detail) | Self::FailedTracerouteExecution(detail) => detail,
        }
    }
}

/// Why a (colo, target[, sub-colo]) produced no sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NoTracerouteResponse,
    FailedTracerouteExecution,
    TracerouteError,
    ProcessingError,
    DeadlineExceeded,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoTracerouteResponse => "no_traceroute_response",
            Self::FailedTracerouteExecution => "failed_traceroute_execution",
            Self::TracerouteError => "traceroute_error",
            Self::ProcessingError => "processing_error",
            Self::DeadlineExceeded => "deadline_exceeded",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
