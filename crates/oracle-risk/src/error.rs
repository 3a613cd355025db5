use thiserror::Error;

use crate::monitor::MonitorMode;

/// Failure of a single scoring call.
#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("scoring service unreachable: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("scoring service returned {status}: {detail}")]
    Status { status: u16, detail: String },
    #[error("scorer rejected request: {0}")]
    Rejected(String),
}

impl ScoreError {
    /// True when the call never reached a scorer that could answer.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(error) if !error.is_decode())
    }
}

#[derive(Debug, Error)]
pub enum RiskError {
    #[error("cannot {operation} while {mode}")]
    InvalidTransition {
        operation: &'static str,
        mode: MonitorMode,
    },
    #[error("no situation update named {0:?}")]
    UnknownUpdate(String),
    #[error(transparent)]
    Scoring(#[from] ScoreError),
}

pub type RiskResult<T> = Result<T, RiskError>;
