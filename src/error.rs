use thiserror::Error;

/// Why an external collaborator (LLM, TTS, stock search, image synthesis,
/// local tool) did not produce a usable result.
#[derive(Debug, Error)]
pub enum FailureReason {
    #[error("{0}: no API key configured")]
    MissingApiKey(&'static str),
    #[error("{service} returned HTTP {status}")]
    Http { service: &'static str, status: u16 },
    #[error("network error: {0}")]
    Network(String),
    #[error("unexpected response: {0}")]
    Parse(String),
    #[error("external tool failed: {0}")]
    Tool(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no result produced")]
    Empty,
}

impl From<reqwest::Error> for FailureReason {
    fn from(err: reqwest::Error) -> Self {
        FailureReason::Network(err.to_string())
    }
}

impl From<serde_json::Error> for FailureReason {
    fn from(err: serde_json::Error) -> Self {
        FailureReason::Parse(err.to_string())
    }
}

pub type CallResult<T> = Result<T, FailureReason>;
