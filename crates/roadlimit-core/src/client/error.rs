//! Lookup client errors

use thiserror::Error;

/// Errors from the remote speed limit lookups
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HERE credentials not configured")]
    MissingCredentials,

    #[error("token endpoint returned {0}")]
    TokenStatus(reqwest::StatusCode),

    #[error("token response missing access_token")]
    MalformedToken,

    #[error("route match endpoint returned {0}")]
    MatchStatus(reqwest::StatusCode),

    #[error("overpass endpoint returned {0}")]
    OverpassStatus(reqwest::StatusCode),

    #[error("empty trace, nothing to match")]
    EmptyTrace,
}
