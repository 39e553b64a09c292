//! Signed JWT assertions for the JWT-bearer grant

use aliri::{
    jwa,
    jwt::{self, CoreClaims},
    Jwt,
};
use aliri_clock::{Clock, DurationSecs, UnixTime};
use serde::{Deserialize, Serialize};

use crate::{credential::ServiceAccountCredential, error::InvalidCredential, SignedAssertion};

/// How long an assertion remains valid after it is issued
///
/// This is the longest lifetime the authorization server accepts.
pub const ASSERTION_LIFETIME: DurationSecs = DurationSecs(3600);

/// The claims carried by a service account assertion
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionClaims {
    iss: jwt::Issuer,
    aud: jwt::Audiences,
    scope: String,
    iat: UnixTime,
    exp: UnixTime,
}

impl AssertionClaims {
    /// Claims asserting `credential`'s identity as of `now`
    pub fn new(credential: &ServiceAccountCredential, now: UnixTime) -> Self {
        Self {
            iss: jwt::Issuer::new(credential.issuer_email().as_str().to_owned()),
            aud: jwt::Audiences::single(jwt::Audience::new(
                credential.authorization_server_url().to_string(),
            )),
            scope: credential.scope().to_owned(),
            iat: now,
            exp: now + ASSERTION_LIFETIME,
        }
    }

    /// The space-delimited scopes requested
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// The time at which the assertion was issued
    pub fn iat(&self) -> UnixTime {
        self.iat
    }
}

impl CoreClaims for AssertionClaims {
    fn nbf(&self) -> Option<UnixTime> {
        None
    }

    fn exp(&self) -> Option<UnixTime> {
        Some(self.exp)
    }

    fn aud(&self) -> &jwt::Audiences {
        &self.aud
    }

    fn iss(&self) -> Option<&jwt::IssuerRef> {
        Some(&self.iss)
    }

    fn sub(&self) -> Option<&jwt::SubjectRef> {
        None
    }
}

impl SignedAssertion {
    /// Builds and signs a fresh assertion for `credential`, issued at `now`
    ///
    /// A new assertion must be built for every token exchange.
    ///
    /// # Errors
    ///
    /// Returns an error if the credential's key cannot produce an RS256 signature.
    pub fn build(
        credential: &ServiceAccountCredential,
        now: UnixTime,
    ) -> Result<Self, InvalidCredential> {
        let headers = jwt::BasicHeaders::new(jwa::Algorithm::RS256);
        let claims = AssertionClaims::new(credential, now);

        let token =
            Jwt::try_from_parts_with_signature(&headers, &claims, credential.signing_key())?;

        Ok(Self::new(token.as_str().to_owned()))
    }

    /// Builds and signs a fresh assertion, issued at the time reported by `clock`
    ///
    /// # Errors
    ///
    /// Returns an error if the credential's key cannot produce an RS256 signature.
    pub fn build_with_clock<C: Clock>(
        credential: &ServiceAccountCredential,
        clock: &C,
    ) -> Result<Self, InvalidCredential> {
        Self::build(credential, clock.now())
    }
}
