use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("Worker program not found: {0}")]
    ProgramNotFound(String),

    #[error("Failed to spawn worker: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("Failed to kill worker: {0}")]
    Kill(#[source] std::io::Error),

    #[error("Worker at {addr} not ready after {waited_ms}ms")]
    NotReady { addr: String, waited_ms: u64 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Worker returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Failed to write response: {0}")]
    Output(#[source] std::io::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProxyError {
    /// True when the worker could not be reached at all.
    pub fn is_connect(&self) -> bool {
        matches!(self, ProxyError::Http(e) if e.is_connect())
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;
