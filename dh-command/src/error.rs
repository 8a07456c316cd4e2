use thiserror::Error;

pub type Result<T> = std::result::Result<T, InterpretError>;

#[derive(Debug, Error)]
pub enum InterpretError {
    #[error("model credentials are not configured")]
    MissingCredentials,

    #[error("http error: {0}")]
    Http(String),

    #[error("unexpected reply format: {0}")]
    ReplyFormat(String),
}

impl From<reqwest::Error> for InterpretError {
    fn from(e: reqwest::Error) -> Self {
        Self::Http(e.to_string())
    }
}

impl From<serde_json::Error> for InterpretError {
    fn from(e: serde_json::Error) -> Self {
        Self::ReplyFormat(e.to_string())
    }
}
