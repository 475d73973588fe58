use thiserror::Error;

/// Failure talking to the hosted model API, shared by the embedding and
/// summarization clients.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider returned {status}: {details}")]
    Status { status: u16, details: String },

    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
}

impl ProviderError {
    /// Whether a retry with backoff can plausibly succeed.
    /// Rate limits, server errors, and network failures are transient;
    /// auth failures, bad requests, and unparseable bodies are not.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Http(_) => true,
            ProviderError::Status { status, .. } => *status == 429 || *status >= 500,
            ProviderError::MalformedResponse(_) => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("embedding dimension {actual} does not match configured {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("provider request failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("chunk store failed: {0}")]
    Store(#[from] StoreError),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("provider request failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("chunk store failed: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
