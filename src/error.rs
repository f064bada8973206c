use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("not authenticated; run 'timepulse login' first")]
    MissingAuth,
    #[error("no project selected; run 'timepulse select <project>' first")]
    MissingProject,
    #[error("network error: {0}")]
    Network(String),
    #[error("server returned {status}: {body}")]
    Http { status: u16, body: String },
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl FetchError {
    /// True for 401/403, which mean the stored token is no longer accepted.
    pub fn is_auth_rejection(&self) -> bool {
        matches!(self, FetchError::Http { status: 401 | 403, .. })
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        FetchError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Malformed(err.to_string())
    }
}
