//! Token exchange against an OAuth2 authorization server using the JWT-bearer grant

use aliri_clock::{Clock, System};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::{
    credential::ServiceAccountCredential,
    error::{AuthError, AuthenticationFailure, ExchangeError},
    storage::TokenStorage,
    SignedAssertion, SignedAssertionRef,
};

/// The grant type of the JWT-bearer token exchange
pub const JWT_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Exchanges signed assertions for access tokens and hands them to a [`TokenStorage`]
///
/// The client used for the exchange must not itself carry the authentication
/// middleware that owns this acquirer, as a refresh would then attempt to
/// authenticate its own token request. A plain [`reqwest::Client`] is
/// required for that reason.
#[derive(Clone, Debug)]
pub struct TokenAcquirer<C = System> {
    client: reqwest::Client,
    clock: C,
}

impl TokenAcquirer<System> {
    /// Constructs a token acquirer using a default HTTP client
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    /// Constructs a token acquirer using the given HTTP client
    ///
    /// Timeouts for the exchange should be configured on this client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            clock: System,
        }
    }
}

impl Default for TokenAcquirer<System> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> TokenAcquirer<C> {
    /// Sets a custom clock to be used when issuing assertions
    ///
    /// Useful for testing purposes
    pub fn with_clock<D>(self, clock: D) -> TokenAcquirer<D> {
        TokenAcquirer {
            client: self.client,
            clock,
        }
    }
}

#[derive(Serialize)]
struct JwtBearerGrant<'a> {
    grant_type: &'static str,
    assertion: &'a SignedAssertionRef,
}

impl<C: Clock> TokenAcquirer<C> {
    /// Obtains a new access token for `credential` and saves it to `storage`
    ///
    /// A single exchange is attempted. Nothing is written to `storage` unless
    /// the exchange succeeds.
    ///
    /// # Errors
    ///
    /// * [`AuthError::InvalidCredential`] if an assertion cannot be signed
    /// * [`AuthError::AuthenticationFailure`] if the exchange fails
    /// * [`AuthError::Storage`] if `storage` rejects the token response
    #[tracing::instrument(
        err,
        skip(self, credential, storage),
        fields(
            token_url = %credential.authorization_server_url(),
            credential.issuer = %credential.issuer_email(),
        ),
    )]
    pub async fn refresh(
        &self,
        credential: &ServiceAccountCredential,
        storage: &dyn TokenStorage,
    ) -> Result<(), AuthError> {
        let assertion = SignedAssertion::build(credential, self.clock.now())?;

        let response = self.exchange(credential, &assertion).await?;

        storage.save_token(response).await.map_err(AuthError::Storage)?;

        tracing::info!("saved newly issued access token");

        Ok(())
    }

    async fn exchange(
        &self,
        credential: &ServiceAccountCredential,
        assertion: &SignedAssertionRef,
    ) -> Result<Map<String, Value>, AuthenticationFailure> {
        tracing::trace!("requesting token from authorization server");

        let grant = JwtBearerGrant {
            grant_type: JWT_BEARER_GRANT_TYPE,
            assertion,
        };

        let resp = self
            .client
            .post(credential.authorization_server_url().clone())
            .form(&grant)
            .send()
            .await
            .map_err(ExchangeError::RequestSend)?;

        tracing::debug!(
            response.status = resp.status().as_u16(),
            "received token response from authorization server"
        );

        if let Err(error) = resp.error_for_status_ref() {
            let body = match resp.text().await {
                Ok(body) => body,
                Err(read_error) => {
                    tracing::debug!(error = %read_error, "unable to read error response body");
                    String::new()
                }
            };
            return Err(ExchangeError::ErrorWithBody {
                source: error,
                body,
            }
            .into());
        }

        let body = resp.bytes().await.map_err(ExchangeError::BodyRead)?;
        let response = serde_json::from_slice(&body).map_err(ExchangeError::TokenBody)?;

        Ok(response)
    }
}
