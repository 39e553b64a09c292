//! Service account credentials

use std::{fmt, path::Path};

use aliri::{jwa, Jwk};
use serde::Deserialize;

use crate::{error::InvalidCredential, IssuerEmail, IssuerEmailRef};

/// The token endpoint of the Google identity provider
pub const DEFAULT_AUTHORIZATION_SERVER: &str = "https://oauth2.googleapis.com/token";

/// The scope requested for every access token
pub const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// The identity of a service account, along with the key used to sign its assertions
///
/// The private key is parsed once, on construction. A credential that
/// constructs successfully can always be handed to the token acquirer.
#[derive(Clone)]
pub struct ServiceAccountCredential {
    issuer_email: IssuerEmail,
    signing_key: Jwk,
    authorization_server_url: reqwest::Url,
}

impl ServiceAccountCredential {
    /// Constructs a credential from a service account email and a PEM-encoded
    /// RSA private key
    ///
    /// Both PKCS#1 (`BEGIN RSA PRIVATE KEY`) and PKCS#8 (`BEGIN PRIVATE KEY`)
    /// encodings are accepted. Tokens are requested from
    /// [`DEFAULT_AUTHORIZATION_SERVER`].
    ///
    /// # Errors
    ///
    /// * If the email is empty
    /// * If the PEM does not hold an RSA private key
    pub fn new(
        issuer_email: impl Into<IssuerEmail>,
        private_key_pem: &str,
    ) -> Result<Self, InvalidCredential> {
        let issuer_email = issuer_email.into();
        if issuer_email.as_str().trim().is_empty() {
            return Err(InvalidCredential::MissingIssuer);
        }

        let signing_key = Jwk::from(jwa::Rsa::private_key_from_pem(private_key_pem)?)
            .with_algorithm(jwa::Algorithm::RS256);

        Ok(Self {
            issuer_email,
            signing_key,
            authorization_server_url: reqwest::Url::parse(DEFAULT_AUTHORIZATION_SERVER)?,
        })
    }

    /// Constructs a credential from the contents of a service account JSON key file
    ///
    /// If the key file carries a `token_uri`, it replaces the default
    /// authorization server.
    ///
    /// # Errors
    ///
    /// * If the JSON is malformed or is missing `client_email` or `private_key`
    /// * Any error from [`new()`][Self::new()]
    pub fn from_json(json: &str) -> Result<Self, InvalidCredential> {
        let key_file: KeyFile = serde_json::from_str(json)?;
        let credential = Self::new(key_file.client_email, &key_file.private_key)?;

        match key_file.token_uri {
            Some(uri) => Ok(credential.with_authorization_server(reqwest::Url::parse(&uri)?)),
            None => Ok(credential),
        }
    }

    /// Reads a service account JSON key file from disk
    ///
    /// # Errors
    ///
    /// * If the file cannot be read
    /// * Any error from [`from_json()`][Self::from_json()]
    pub async fn from_key_file(path: impl AsRef<Path>) -> Result<Self, InvalidCredential> {
        let data = tokio::fs::read_to_string(path.as_ref()).await?;
        Self::from_json(&data)
    }

    /// Requests tokens from a different authorization server
    #[must_use]
    pub fn with_authorization_server(mut self, url: reqwest::Url) -> Self {
        self.authorization_server_url = url;
        self
    }

    /// The service account email
    pub fn issuer_email(&self) -> &IssuerEmailRef {
        &self.issuer_email
    }

    /// The token endpoint of the authorization server
    pub fn authorization_server_url(&self) -> &reqwest::Url {
        &self.authorization_server_url
    }

    /// The space-delimited scopes requested
    pub fn scope(&self) -> &'static str {
        CLOUD_PLATFORM_SCOPE
    }

    pub(crate) fn signing_key(&self) -> &Jwk {
        &self.signing_key
    }
}

impl fmt::Debug for ServiceAccountCredential {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ServiceAccountCredential")
            .field("issuer_email", &self.issuer_email)
            .field("authorization_server_url", &self.authorization_server_url.as_str())
            .field("private_key", &"<redacted>")
            .finish()
    }
}

#[derive(Deserialize)]
struct KeyFile {
    client_email: IssuerEmail,
    private_key: String,
    #[serde(default)]
    token_uri: Option<String>,
}


#[cfg(test)]
mod tests {
    use color_eyre::Result;

    use super::{test_keys::*, *};

    #[test]
    fn defaults_to_google_token_endpoint() -> Result<()> {
        let credential = ServiceAccountCredential::new(SERVICE_ACCOUNT_EMAIL, PRIVATE_KEY_PEM)?;

        assert_eq!(credential.issuer_email().as_str(), SERVICE_ACCOUNT_EMAIL);
        assert_eq!(
            credential.authorization_server_url().as_str(),
            DEFAULT_AUTHORIZATION_SERVER
        );
        assert_eq!(credential.scope(), CLOUD_PLATFORM_SCOPE);
        Ok(())
    }

    #[test]
    fn authorization_server_can_be_overridden() -> Result<()> {
        let url = reqwest::Url::parse("https://auth.example.com/token")?;
        let credential = ServiceAccountCredential::new(SERVICE_ACCOUNT_EMAIL, PRIVATE_KEY_PEM)?
            .with_authorization_server(url.clone());

        assert_eq!(credential.authorization_server_url(), &url);
        Ok(())
    }

    #[test]
    fn rejects_malformed_key() {
        let err = ServiceAccountCredential::new(SERVICE_ACCOUNT_EMAIL, "not a pem").unwrap_err();
        assert!(matches!(err, InvalidCredential::KeyRejected(_)), "{:?}", err);
    }

    #[test]
    fn rejects_empty_issuer() {
        let err = ServiceAccountCredential::new("  ", PRIVATE_KEY_PEM).unwrap_err();
        assert!(matches!(err, InvalidCredential::MissingIssuer), "{:?}", err);
    }

    #[test]
    fn loads_key_file() -> Result<()> {
        let credential = ServiceAccountCredential::from_json(KEY_FILE_JSON)?;

        assert_eq!(credential.issuer_email().as_str(), SERVICE_ACCOUNT_EMAIL);
        assert_eq!(
            credential.authorization_server_url().as_str(),
            DEFAULT_AUTHORIZATION_SERVER
        );
        Ok(())
    }

    #[test]
    fn key_file_token_uri_replaces_default() -> Result<()> {
        let json = serde_json::json!({
            "client_email": SERVICE_ACCOUNT_EMAIL,
            "private_key": PRIVATE_KEY_PEM,
            "token_uri": "https://auth.example.com/oauth2/token",
        })
        .to_string();

        let credential = ServiceAccountCredential::from_json(&json)?;

        assert_eq!(
            credential.authorization_server_url().as_str(),
            "https://auth.example.com/oauth2/token"
        );
        Ok(())
    }

    #[test]
    fn key_file_without_private_key_is_rejected() {
        let json = serde_json::json!({ "client_email": SERVICE_ACCOUNT_EMAIL }).to_string();

        let err = ServiceAccountCredential::from_json(&json).unwrap_err();
        assert!(matches!(err, InvalidCredential::MalformedKeyFile(_)), "{:?}", err);
    }

    #[test]
    fn debug_output_hides_private_key() -> Result<()> {
        let credential = ServiceAccountCredential::new(SERVICE_ACCOUNT_EMAIL, PRIVATE_KEY_PEM)?;
        let debug = format!("{:?}", credential);

        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("PRIVATE KEY"));
        Ok(())
    }

    #[tokio::test]
    async fn missing_key_file_is_reported() {
        let err = ServiceAccountCredential::from_key_file("does/not/exist.json")
            .await
            .unwrap_err();
        assert!(matches!(err, InvalidCredential::KeyFileRead(_)), "{:?}", err);
    }
}
