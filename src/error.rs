//! Application error type.
//!
//! Three failure classes reach the caller:
//!
//! - `Configuration`: invalid chemistry or series values, raised before any
//!   computation and never retried
//! - `FitFailed`: the minimizer gave up; carries the last parameter estimate
//! - `Io` / `Parse`: input and output files
//!
//! Per-sample numeric degeneracies never show up here; they are absorbed by the
//! equilibrium model (see `math::cubic::CubicError`).

use std::path::PathBuf;

use thiserror::Error;

use crate::domain::FitParams;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Fit failed after {evaluations} evaluations ({reason}); last estimate: {last}")]
    FitFailed {
        reason: String,
        evaluations: usize,
        last: FitParams,
    },

    #[error("I/O error on '{path}': {source}", path = path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse '{path}': {message}", path = path.display())]
    Parse { path: PathBuf, message: String },
}

impl AppError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Process exit code for the `ligfit` binary.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Configuration(_) | Self::Io { .. } | Self::Parse { .. } => 2,
            Self::FitFailed { .. } => 4,
        }
    }

    /// Last parameter estimate, if this is a fit failure.
    pub fn last_estimate(&self) -> Option<&FitParams> {
        match self {
            Self::FitFailed { last, .. } => Some(last),
            _ => None,
        }
    }
}
