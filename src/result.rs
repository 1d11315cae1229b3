use std::{fmt::Display, io};

use chromiumoxide::error::CdpError;

use crate::wait::Timeout;

#[derive(Debug)]
pub enum StepError {
    Navigation {
        url: String,
        reason: String,
    },
    Timeout {
        condition: String,
        timeout: Timeout,
        last: String,
    },
    Assertion {
        selector: String,
        expected: String,
        actual: String,
    },
    Evaluation(String),
    Browser(String),
    IO(io::Error),
}

impl StepError {
    /// Short name of the error class, used in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            StepError::Navigation { .. } => "navigation",
            StepError::Timeout { .. } => "timeout",
            StepError::Assertion { .. } => "assertion",
            StepError::Evaluation(_) => "evaluation",
            StepError::Browser(_) => "browser",
            StepError::IO(_) => "io",
        }
    }
}

impl Display for StepError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepError::Navigation { url, reason } => {
                write!(f, "navigation to {} failed: {}", url, reason)
            }
            StepError::Timeout {
                condition,
                timeout,
                last,
            } => write!(
                f,
                "timed out after {}ms waiting for {} (last observed: {})",
                timeout.0, condition, last
            ),
            StepError::Assertion {
                selector,
                expected,
                actual,
            } => write!(
                f,
                "assertion on {:?} failed: expected {}, got {}",
                selector, expected, actual
            ),
            StepError::Evaluation(message) => {
                write!(f, "script evaluation failed: {}", message)
            }
            StepError::Browser(message) => {
                write!(f, "browser error: {}", message)
            }
            StepError::IO(error) => error.fmt(f),
        }
    }
}

impl std::error::Error for StepError {}

impl From<io::Error> for StepError {
    fn from(value: io::Error) -> Self {
        StepError::IO(value)
    }
}

impl From<CdpError> for StepError {
    fn from(value: CdpError) -> Self {
        StepError::Browser(value.to_string())
    }
}

impl From<serde_json::Error> for StepError {
    fn from(value: serde_json::Error) -> Self {
        StepError::Evaluation(value.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StepError>;
