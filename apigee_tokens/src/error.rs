//! Errors raised while obtaining and storing access tokens

use std::error;

use thiserror::Error;

/// An error reported by a [`TokenStorage`][crate::storage::TokenStorage]
///
/// Storage implementations own this error domain. It is passed through
/// unchanged.
pub type StorageError = Box<dyn error::Error + Send + Sync + 'static>;

/// The service account credential is unusable
///
/// This indicates a configuration defect and is never retried.
#[derive(Debug, Error)]
pub enum InvalidCredential {
    /// The service account email was empty
    #[error("service account issuer email must not be empty")]
    MissingIssuer,
    /// The private key was not an RSA private key in PEM format
    #[error("service account private key was rejected")]
    KeyRejected(#[from] aliri::error::KeyRejected),
    /// The private key could not sign an assertion
    #[error("unable to sign assertion with service account key")]
    Signing(#[from] aliri::error::JwtSigningError),
    /// The authorization server URL could not be parsed
    #[error("invalid authorization server URL")]
    AuthorizationServer(#[from] url::ParseError),
    /// The service account key file could not be read
    #[error("unable to read service account key file")]
    KeyFileRead(#[from] std::io::Error),
    /// The service account key file was not valid
    #[error("malformed service account key file")]
    MalformedKeyFile(#[from] serde_json::Error),
}

/// The underlying cause of a failed token exchange
#[derive(Debug, Error)]
pub enum ExchangeError {
    /// The authorization server responded with an error status
    #[error("authorization server rejected token request: {body}")]
    ErrorWithBody {
        /// The underlying request error
        source: reqwest::Error,
        /// The body of the error response
        body: String,
    },
    /// The response body was not a JSON object
    #[error("token response body was not a JSON object")]
    TokenBody(#[from] serde_json::Error),
    /// Unable to read the response
    #[error("error reading token response body")]
    BodyRead(#[source] reqwest::Error),
    /// Unable to send the token request
    #[error("error sending token request to authorization server")]
    RequestSend(#[source] reqwest::Error),
}

impl ExchangeError {
    /// The HTTP status code reported by the authorization server, if any
    pub fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            Self::ErrorWithBody { source, .. } => source.status(),
            Self::BodyRead(source) | Self::RequestSend(source) => source.status(),
            Self::TokenBody(_) => None,
        }
    }
}

/// A token exchange with the authorization server failed
#[derive(Debug, Error)]
#[error("{message}")]
pub struct AuthenticationFailure {
    message: String,
    code: u16,
    #[source]
    cause: ExchangeError,
}

impl AuthenticationFailure {
    /// A description of the failure
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The HTTP status code of the failed exchange, or `0` if no response was received
    pub fn code(&self) -> u16 {
        self.code
    }

    /// The underlying cause
    pub fn cause(&self) -> &ExchangeError {
        &self.cause
    }
}

impl From<ExchangeError> for AuthenticationFailure {
    fn from(cause: ExchangeError) -> Self {
        let code = cause.status().map_or(0, |s| s.as_u16());
        Self {
            message: format!("failed to obtain access token: {}", cause),
            code,
            cause,
        }
    }
}

/// An error preventing a request from being authenticated
#[derive(Debug, Error)]
pub enum AuthError {
    /// The service account credential is unusable
    #[error(transparent)]
    InvalidCredential(#[from] InvalidCredential),
    /// The token exchange failed
    #[error(transparent)]
    AuthenticationFailure(#[from] AuthenticationFailure),
    /// The token storage reported an error
    #[error("token storage error: {0}")]
    Storage(#[source] StorageError),
}

impl AuthError {
    /// Whether this error came from a failed token exchange
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, Self::AuthenticationFailure(_))
    }

    /// Whether this error came from an unusable credential
    pub fn is_invalid_credential(&self) -> bool {
        matches!(self, Self::InvalidCredential(_))
    }
}

impl From<ExchangeError> for AuthError {
    fn from(cause: ExchangeError) -> Self {
        Self::AuthenticationFailure(cause.into())
    }
}
