use std::fmt::{Display, Formatter};

pub type Result<T> = std::result::Result<T, ChaptersHttpError>;

/// Errors from talking to the chapter store.
#[derive(Debug)]
pub enum ChaptersHttpError {
    InvalidBaseUrl {
        base_url: String,
        source: url::ParseError,
    },
    BuildClient {
        source: reqwest::Error,
    },
    Request {
        source: reqwest::Error,
    },
    /// Non-2xx answer other than "not deployed".
    Status {
        code: u16,
        body: String,
    },
    Decode {
        source: reqwest::Error,
    },
    /// The store answered 2xx with a status other than `"success"`.
    Rejected {
        status: String,
    },
}

impl Display for ChaptersHttpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidBaseUrl { base_url, source } => {
                write!(f, "invalid chapter store url {base_url}: {source}")
            }
            Self::BuildClient { source } => write!(f, "failed to build http client: {source}"),
            Self::Request { source } => write!(f, "save request failed: {source}"),
            Self::Status { code, body } => {
                if body.is_empty() {
                    write!(f, "chapter store answered HTTP {code}")
                } else {
                    write!(f, "chapter store answered HTTP {code}: {body}")
                }
            }
            Self::Decode { source } => write!(f, "invalid save response: {source}"),
            Self::Rejected { status } => write!(f, "chapter store rejected save: status={status}"),
        }
    }
}

impl std::error::Error for ChaptersHttpError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidBaseUrl { source, .. } => Some(source),
            Self::BuildClient { source } | Self::Request { source } | Self::Decode { source } => {
                Some(source)
            }
            Self::Status { .. } | Self::Rejected { .. } => None,
        }
    }
}
