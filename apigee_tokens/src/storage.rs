//! Token storage

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::{error::StorageError, AccessToken};

#[cfg(feature = "in-memory")]
pub mod in_memory;

#[cfg(feature = "in-memory")]
pub use in_memory::InMemoryTokenStorage;

/// Holds the current access token on behalf of an authentication plugin
///
/// Implementations decide where the token lives and how its freshness is
/// judged. The plugin only asks whether the token has expired, reads the
/// current value, and hands over newly issued tokens.
///
/// A storage that reports `has_expired() == false` while holding no token
/// causes requests to be sent without authorization.
#[async_trait]
pub trait TokenStorage: Send + Sync {
    /// Whether the current token should be replaced before use
    async fn has_expired(&self) -> bool;

    /// The current access token, if any
    async fn access_token(&self) -> Option<AccessToken>;

    /// Replaces the current token with one decoded from an authorization
    /// server's token response
    ///
    /// `response` is the response body, exactly as returned by the server.
    async fn save_token(&self, response: Map<String, Value>) -> Result<(), StorageError>;
}
