use thiserror::Error;

pub(crate) const FALLBACK_MESSAGE: &str = "the request failed";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("response carried no data")]
    MissingData,

    #[error("no refresh token held")]
    MissingRefreshToken,
}

pub type Result<T> = std::result::Result<T, ApiError>;
