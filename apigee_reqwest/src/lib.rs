//! Middleware to authenticate outgoing requests as a service account
//!
//! When using [`ClientWithMiddleware`](reqwest_middleware::ClientWithMiddleware),
//! include the [`ServiceAccountAuthentication`] middleware in the middleware stack
//! to attach a bearer token to each outbound request. Tokens are held by a
//! [`TokenStorage`] and are only exchanged for new ones once the storage reports
//! that the current token has expired, so most requests never wait on the
//! authorization server.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use apigee_reqwest::ServiceAccountAuthentication;
//! use apigee_tokens::{credential::ServiceAccountCredential, InMemoryTokenStorage};
//! use reqwest::Client;
//! use reqwest_middleware::ClientBuilder;
//!
//! # #[tokio::main(flavor = "current_thread")] async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let credential = ServiceAccountCredential::from_key_file("service-account.json").await?;
//!
//! let client = ClientBuilder::new(Client::default())
//!     .with(ServiceAccountAuthentication::new(
//!         credential,
//!         Arc::new(InMemoryTokenStorage::new()),
//!     ))
//!     .build();
//!
//! let resp = client
//!     .get("https://apigee.googleapis.com/v1/organizations")
//!     .send()
//!     .await?;
//! # Ok(()) }
//! ```
//!
//! If the token exchange fails, the request is not sent. The error returned by
//! the client wraps an [`AuthError`] which can be recovered by downcasting.
//!
//! Concurrent requests that all find the token expired will each perform an
//! exchange. Use [`with_single_flight()`][ServiceAccountAuthentication::with_single_flight()]
//! to have them wait on a single exchange instead.

#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

use std::{fmt, sync::Arc};

use aliri_clock::{Clock, System};
use apigee_tokens::{
    acquirer::TokenAcquirer, credential::ServiceAccountCredential, storage::TokenStorage,
    AccessTokenRef,
};
use bytes::{BufMut, BytesMut};
use reqwest::{header, Request, Response};
use reqwest_middleware::{Middleware, Next, Result};
use tokio::sync::Mutex;

pub use apigee_tokens::error::AuthError;

/// A middleware that authenticates outgoing requests as a service account
#[derive(Clone)]
pub struct ServiceAccountAuthentication<C = System> {
    credential: ServiceAccountCredential,
    storage: Arc<dyn TokenStorage>,
    acquirer: TokenAcquirer<C>,
    refresh_lock: Option<Arc<Mutex<()>>>,
}

impl ServiceAccountAuthentication<System> {
    /// Construct a new middleware from a credential and the storage holding its tokens
    ///
    /// Tokens are exchanged using a default [`reqwest::Client`]. To configure
    /// the client used for exchanges, provide a custom acquirer with
    /// [`with_acquirer()`][Self::with_acquirer()].
    pub fn new(credential: ServiceAccountCredential, storage: Arc<dyn TokenStorage>) -> Self {
        Self {
            credential,
            storage,
            acquirer: TokenAcquirer::new(),
            refresh_lock: None,
        }
    }
}

impl<C> ServiceAccountAuthentication<C> {
    /// Replaces the acquirer used to exchange assertions for tokens
    ///
    /// The acquirer's client must not include this middleware.
    pub fn with_acquirer<D>(self, acquirer: TokenAcquirer<D>) -> ServiceAccountAuthentication<D> {
        ServiceAccountAuthentication {
            credential: self.credential,
            storage: self.storage,
            acquirer,
            refresh_lock: self.refresh_lock,
        }
    }

    /// Serializes token exchanges
    ///
    /// Requests that find the token expired while an exchange is in flight
    /// wait for it to finish and then use its result.
    #[must_use]
    pub fn with_single_flight(mut self) -> Self {
        self.refresh_lock = Some(Arc::new(Mutex::new(())));
        self
    }

    /// The service account credential
    pub fn credential(&self) -> &ServiceAccountCredential {
        &self.credential
    }

    /// The storage holding the current token
    pub fn storage(&self) -> &Arc<dyn TokenStorage> {
        &self.storage
    }
}

impl<C: Clock> ServiceAccountAuthentication<C> {
    /// Attaches the current access token to `req`, exchanging for a new token
    /// first if the stored one has expired
    ///
    /// If the storage holds no token, even after a refresh, the request is
    /// returned unmodified.
    ///
    /// # Errors
    ///
    /// Returns an error if a required token exchange fails. The request must
    /// not be sent in that case.
    pub async fn authenticate(&self, mut req: Request) -> std::result::Result<Request, AuthError> {
        if self.storage.has_expired().await {
            tracing::debug!("stored access token has expired");
            self.refresh().await?;
        }

        match self.storage.access_token().await {
            Some(token) if !token.as_str().is_empty() => {
                tracing::trace!(
                    token = format_args!("{:#?}", token),
                    "attaching access token"
                );
                let value = bearer_header(&token).map_err(|e| AuthError::Storage(e.into()))?;
                req.headers_mut().insert(header::AUTHORIZATION, value);
            }
            _ => {
                tracing::debug!("no access token available, request will not be authorized");
            }
        }

        Ok(req)
    }

    async fn refresh(&self) -> std::result::Result<(), AuthError> {
        if let Some(lock) = &self.refresh_lock {
            let _guard = lock.lock().await;
            if !self.storage.has_expired().await {
                tracing::trace!("access token was refreshed by a concurrent request");
                return Ok(());
            }
            self.acquirer.refresh(&self.credential, &*self.storage).await
        } else {
            self.acquirer.refresh(&self.credential, &*self.storage).await
        }
    }
}

fn bearer_header(
    token: &AccessTokenRef,
) -> std::result::Result<header::HeaderValue, header::InvalidHeaderValue> {
    let mut header_value = BytesMut::with_capacity(token.as_str().len() + 7);
    header_value.put_slice(b"Bearer ");
    header_value.put_slice(token.as_str().as_bytes());
    let mut value = header::HeaderValue::from_maybe_shared(header_value.freeze())?;
    value.set_sensitive(true);
    Ok(value)
}

impl<C: fmt::Debug> fmt::Debug for ServiceAccountAuthentication<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountAuthentication")
            .field("credential", &self.credential)
            .field("acquirer", &self.acquirer)
            .field("single_flight", &self.refresh_lock.is_some())
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl<C> Middleware for ServiceAccountAuthentication<C>
where
    C: Clock + Send + Sync + 'static,
{
    async fn handle(
        &self,
        req: Request,
        extensions: &mut http::Extensions,
        next: Next<'_>,
    ) -> Result<Response> {
        let req = self
            .authenticate(req)
            .await
            .map_err(reqwest_middleware::Error::middleware)?;

        next.run(req, extensions).await
    }
}
