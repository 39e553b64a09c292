//! An in-memory token storage

use aliri_clock::{Clock, DurationSecs, System, UnixTime};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use super::TokenStorage;
use crate::{error::StorageError, AccessToken, IssuedToken};

/// A token storage that keeps the current token in memory
///
/// Token responses are expected to carry `access_token` and `expires_in`
/// (in seconds). The storage starts out empty, and so expired.
#[derive(Debug)]
pub struct InMemoryTokenStorage<C = System> {
    token: RwLock<Option<IssuedToken>>,
    leeway: DurationSecs,
    clock: C,
}

impl InMemoryTokenStorage<System> {
    /// Constructs a new, empty in-memory token storage
    pub fn new() -> Self {
        Self {
            token: RwLock::new(None),
            leeway: DurationSecs(0),
            clock: System,
        }
    }
}

impl Default for InMemoryTokenStorage<System> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> InMemoryTokenStorage<C> {
    /// Treats tokens as expired once less than `leeway` of their lifetime remains
    pub fn with_leeway(mut self, leeway: DurationSecs) -> Self {
        self.leeway = leeway;
        self
    }

    /// Sets a custom clock to be used
    ///
    /// Useful for testing purposes
    pub fn with_clock<D>(self, clock: D) -> InMemoryTokenStorage<D> {
        InMemoryTokenStorage {
            token: self.token,
            leeway: self.leeway,
            clock,
        }
    }

    /// A copy of the stored token, along with its validity window
    pub async fn token(&self) -> Option<IssuedToken> {
        self.token.read().await.clone()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: AccessToken,
    expires_in: DurationSecs,
}

#[async_trait]
impl<C: Clock + Send + Sync> TokenStorage for InMemoryTokenStorage<C> {
    async fn has_expired(&self) -> bool {
        match &*self.token.read().await {
            Some(token) => {
                token.is_expired_at(UnixTime(self.clock.now().0.saturating_add(self.leeway.0)))
            }
            None => true,
        }
    }

    async fn access_token(&self) -> Option<AccessToken> {
        self.token
            .read()
            .await
            .as_ref()
            .map(|t| t.access_token().to_owned())
    }

    async fn save_token(&self, response: Map<String, Value>) -> Result<(), StorageError> {
        let response: TokenResponse = serde_json::from_value(Value::Object(response))?;
        let token = IssuedToken::new(
            response.access_token,
            response.expires_in,
            self.clock.now(),
        );

        tracing::debug!(
            lifetime = token.lifetime().0,
            expiry = token.expiry().0,
            "stored access token"
        );

        *self.token.write().await = Some(token);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use aliri_clock::TestClock;
    use serde_json::json;

    use super::*;

    fn response(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("not an object"),
        }
    }

    fn storage_at(time: u64) -> InMemoryTokenStorage<TestClock> {
        InMemoryTokenStorage::new().with_clock(TestClock::new(UnixTime(time)))
    }

    #[tokio::test]
    async fn starts_out_expired_and_empty() {
        let storage = InMemoryTokenStorage::new();

        assert!(storage.has_expired().await);
        assert_eq!(storage.access_token().await, None);
    }

    #[tokio::test]
    async fn saved_token_is_fresh_until_it_expires() {
        let storage = storage_at(1000);

        storage
            .save_token(response(json!({ "access_token": "abc", "expires_in": 3600 })))
            .await
            .unwrap();

        assert!(!storage.has_expired().await);
        assert_eq!(
            storage.access_token().await,
            Some(AccessToken::from_static("abc"))
        );

        let token = storage.token().await.unwrap();
        assert_eq!(token.issued(), UnixTime(1000));
        assert_eq!(token.expiry(), UnixTime(4600));
    }

    #[tokio::test]
    async fn token_past_its_lifetime_has_expired() {
        let storage = storage_at(1000);
        storage
            .save_token(response(json!({ "access_token": "abc", "expires_in": 60 })))
            .await
            .unwrap();

        let storage = storage.with_clock(TestClock::new(UnixTime(1060)));

        assert!(storage.has_expired().await);
        assert_eq!(
            storage.access_token().await,
            Some(AccessToken::from_static("abc"))
        );
    }

    #[tokio::test]
    async fn leeway_expires_tokens_early() {
        let storage = storage_at(1000).with_leeway(DurationSecs(300));
        storage
            .save_token(response(json!({ "access_token": "abc", "expires_in": 600 })))
            .await
            .unwrap();

        assert!(!storage.has_expired().await);

        let storage = storage.with_clock(TestClock::new(UnixTime(1300)));
        assert!(storage.has_expired().await);
    }

    #[tokio::test]
    async fn huge_lifetime_is_stored_as_never_expiring() {
        let storage = storage_at(1000).with_leeway(DurationSecs(u64::MAX));
        storage
            .save_token(response(json!({ "access_token": "abc", "expires_in": u64::MAX })))
            .await
            .unwrap();

        assert_eq!(storage.token().await.unwrap().expiry(), UnixTime(u64::MAX));
        assert!(storage.has_expired().await);
        assert_eq!(
            storage.access_token().await,
            Some(AccessToken::from_static("abc"))
        );

        let storage = storage.with_leeway(DurationSecs(0));
        assert!(!storage.has_expired().await);
    }

    #[tokio::test]
    async fn new_token_replaces_the_old_one() {
        let storage = storage_at(1000);
        storage
            .save_token(response(json!({ "access_token": "first", "expires_in": 60 })))
            .await
            .unwrap();
        storage
            .save_token(response(json!({ "access_token": "second", "expires_in": 60 })))
            .await
            .unwrap();

        assert_eq!(
            storage.access_token().await,
            Some(AccessToken::from_static("second"))
        );
    }

    #[tokio::test]
    async fn malformed_response_is_rejected_and_leaves_storage_untouched() {
        let storage = storage_at(1000);

        let result = storage
            .save_token(response(json!({ "token": "abc" })))
            .await;

        assert!(result.is_err());
        assert!(storage.has_expired().await);
        assert_eq!(storage.access_token().await, None);
    }
}
