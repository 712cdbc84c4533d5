use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Request could not be sent or the origin answered with a non-success status.
    #[error("transport error for {url}: {reason}")]
    Transport { url: String, reason: String },

    /// An API answered with something that is not the expected JSON document.
    #[error("malformed response from {url}: {reason}")]
    MalformedResponse { url: String, reason: String },

    #[error("invalid date format: {0:?}")]
    InvalidDateFormat(String),

    #[error("invalid selector {selector:?}: {reason}")]
    Selector { selector: String, reason: String },

    #[error("url error: {0}")]
    Url(#[from] url::ParseError),

    #[error("feed error: {0}")]
    Feed(#[from] rss::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn transport(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Transport {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn malformed(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::MalformedResponse {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        let url = e.url().map(|u| u.to_string()).unwrap_or_default();
        Self::Transport {
            url,
            reason: e.to_string(),
        }
    }
}
