/// Failures surfaced by [`super::OverpassClient`].
#[derive(Debug, thiserror::Error)]
pub enum OverpassError {
    #[error("Overpass client not initialized: call init() first")]
    NotInitialized,

    /// Connect/timeout failures that outlived every retry.
    #[error("Overpass unavailable after {attempts} attempt(s): {reason}")]
    Unavailable { attempts: u32, reason: String },

    /// Non-2xx answer. Never retried.
    #[error("Overpass rejected query: status={status} body={body}")]
    Rejected { status: u16, body: String },

    #[error("Overpass transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Malformed Overpass response: {0}")]
    Malformed(String),
}

impl OverpassError {
    /// Connect and timeout errors are the only transient faults.
    pub fn is_transient(&self) -> bool {
        match self {
            OverpassError::Transport(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }
}

pub type OverpassResult<T> = Result<T, OverpassError>;
