//! Service-account access tokens for the Apigee management API
//!
//! Calls to the management API are authorized with short-lived OAuth2 access
//! tokens. A service account obtains these by signing a JWT assertion with its
//! private key and exchanging it with the authorization server using the
//! JWT-bearer grant ([RFC7523][]).
//!
//! This crate provides the pieces of that exchange:
//!
//! * [`ServiceAccountCredential`][credential::ServiceAccountCredential]: the
//!   account's identity, key, and the authorization server to use
//! * [`SignedAssertion`]: an RS256-signed assertion, built fresh for every exchange
//! * [`TokenStorage`][storage::TokenStorage]: the contract for whatever holds the
//!   current token between requests
//! * [`TokenAcquirer`][acquirer::TokenAcquirer]: performs the exchange and hands
//!   the response to the storage
//!
//! Attaching tokens to outgoing requests is the job of `apigee_reqwest`.
//!
//! ```no_run
//! use apigee_tokens::{
//!     acquirer::TokenAcquirer, credential::ServiceAccountCredential, storage::TokenStorage,
//!     InMemoryTokenStorage,
//! };
//!
//! # #[tokio::main(flavor = "current_thread")] async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let credential = ServiceAccountCredential::from_key_file("service-account.json").await?;
//! let storage = InMemoryTokenStorage::new();
//!
//! if storage.has_expired().await {
//!     TokenAcquirer::new().refresh(&credential, &storage).await?;
//! }
//!
//! tracing::info!(
//!     token = format_args!("{:#?}", storage.access_token().await),
//!     "current access token"
//! );
//! # Ok(()) }
//! ```
//!
//! # Features
//!
//! * `in-memory` (default): provides [`InMemoryTokenStorage`], a storage that keeps the
//!   current token in process memory.
//! * `rustls-tls` (default): enables HTTPS for the token exchange via `rustls`. The
//!   default authorization server is only reachable over HTTPS, so a TLS backend must
//!   be enabled, either through this feature or on `reqwest` directly.
//! * `native-tls`: enables HTTPS for the token exchange via the platform TLS library.
//!
//! [RFC7523]: https://tools.ietf.org/html/rfc7523

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(
    missing_docs,
    unused_import_braces,
    unused_imports,
    unused_qualifications
)]
#![deny(
    missing_debug_implementations,
    trivial_numeric_casts,
    unsafe_code,
    unused_must_use
)]

pub mod acquirer;
pub mod assertion;
mod braids;
pub mod credential;
pub mod error;
pub mod storage;
mod tokens;

pub use braids::*;
#[cfg(feature = "in-memory")]
pub use storage::InMemoryTokenStorage;
pub use tokens::IssuedToken;
