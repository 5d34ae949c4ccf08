use lambda_http::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum ProxyError {
    #[error("Missing Airtable credentials in environment variables.")]
    MissingCredentials,
    #[error("{0}")]
    BadRequest(&'static str),
    #[error("Method not allowed")]
    MethodNotAllowed,
    #[error("{0}")]
    Upstream(String),
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Url(#[from] url::ParseError),
    #[error("API url cannot be used as a base: {0}")]
    InvalidApiUrl(String),
}

impl ProxyError {
    pub(crate) fn status(&self) -> StatusCode {
        match self {
            ProxyError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
