use oracle_protocol::ProtocolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// Rejected locally; no connection was opened.
    #[error("invalid request: {0}")]
    Validation(#[from] ProtocolError),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("request failed with status {status}: {detail}")]
    Status { status: u16, detail: String },
    /// The response body failed after the stream was open.
    #[error("plan stream interrupted: {0}")]
    Interrupted(String),
}

impl ClientError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

pub type ClientResult<T> = Result<T, ClientError>;
