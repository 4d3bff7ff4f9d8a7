use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    /// No bearer token is held. Raised locally before any request is built.
    #[error("not logged in")]
    Unauthenticated,
    #[error("invalid credentials")]
    InvalidCredentials,
    /// Input rejected client-side before any network I/O.
    #[error("invalid input: {0}")]
    Validation(String),
    #[error("{url} returned status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl ApiError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
