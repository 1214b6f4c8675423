use std::path::PathBuf;

use common::remote::RemoteError;
use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("HTTP request failed: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),
    #[error("HTTP status {0}: {1}")]
    HttpStatus(StatusCode, String),
    /// The service answered `success: false`
    #[error("{endpoint} failed: {message}")]
    Rejected {
        endpoint: &'static str,
        message: String,
    },
    #[error("malformed response from {endpoint}: {message}")]
    Malformed {
        endpoint: &'static str,
        message: String,
    },
    #[error("failed to read TLS identity {path}: {source}")]
    IdentityFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid TLS identity: {0}")]
    InvalidIdentity(String),
}

impl From<RpcError> for RemoteError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::Rejected { endpoint, message } => RemoteError::Rejected {
                endpoint: endpoint.to_string(),
                message,
            },
            RpcError::Malformed { endpoint, message } => RemoteError::Malformed {
                endpoint: endpoint.to_string(),
                message,
            },
            e @ (RpcError::IdentityFile { .. } | RpcError::InvalidIdentity(_)) => {
                RemoteError::Setup(e.to_string())
            }
            e => RemoteError::Transport(e.to_string()),
        }
    }
}
