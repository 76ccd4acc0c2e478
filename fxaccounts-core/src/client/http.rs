//! HTTP implementation of [`IdentityClient`] against the account API.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, Url};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;

use super::request::Request;
use super::{EmailStatus, IdentityClient, KeyBundle};
use crate::config::AccountsConfig;
use crate::error::{AccountResult, ClientError};

/// Talks to the account API over `https` with bearer-token authentication.
pub struct HttpIdentityClient {
    base: Url,
    cert_lifetime_ms: u64,
    request: Request,
}

impl std::fmt::Debug for HttpIdentityClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpIdentityClient")
            .field("base", &self.base.as_str())
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct KeysResponse {
    #[serde(rename = "kA")]
    k_a: String,
    #[serde(rename = "wrapKB")]
    wrap_kb: String,
}

#[derive(Deserialize)]
struct CertificateResponse {
    cert: String,
}

impl HttpIdentityClient {
    /// Creates a client for the auth server configured in `config`.
    ///
    /// # Errors
    /// Fails with [`crate::AccountError::InsecureEndpoint`] if the auth server is not
    /// served over `https`. No request is made in that case.
    pub fn new(config: &AccountsConfig) -> AccountResult<Self> {
        let mut base = config.auth_server_uri()?;
        // Keep the last path segment when joining endpoint names.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            base,
            cert_lifetime_ms: config.cert_lifetime_ms,
            request: Request::new(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.base.join(path).map_err(|err| ClientError::Network {
            url: format!("{}{path}", self.base),
            status: None,
            error: err.to_string(),
        })
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ClientError> {
        let response = self.request.send(builder).await?;
        parse_response(response).await
    }
}

async fn parse_response<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    let url = response.url().to_string();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ClientError::Network {
            url,
            status: Some(status.as_u16()),
            error: body,
        });
    }
    response
        .json::<T>()
        .await
        .map_err(|err| ClientError::InvalidResponse(format!("{url}: {err}")))
}

fn decode_hex_field(value: &str, field: &str) -> Result<Vec<u8>, ClientError> {
    hex::decode(value).map_err(|err| ClientError::InvalidResponse(format!("{field}: {err}")))
}

#[async_trait]
impl IdentityClient for HttpIdentityClient {
    async fn fetch_keys(&self, key_fetch_token: &str) -> Result<KeyBundle, ClientError> {
        let url = self.endpoint("account/keys")?;
        let builder = self.request.authorized(Method::GET, url, key_fetch_token);
        let keys: KeysResponse = self.send(builder).await?;
        Ok(KeyBundle {
            k_a: decode_hex_field(&keys.k_a, "kA")?,
            wrap_kb: decode_hex_field(&keys.wrap_kb, "wrapKB")?,
        })
    }

    async fn check_email_status(
        &self,
        session_token: &str,
    ) -> Result<EmailStatus, ClientError> {
        let url = self.endpoint("recovery_email/status")?;
        let builder = self.request.authorized(Method::GET, url, session_token);
        self.send(builder).await
    }

    async fn sign_certificate(
        &self,
        session_token: &str,
        serialized_public_key: &str,
    ) -> Result<String, ClientError> {
        let url = self.endpoint("certificate/sign")?;
        let public_key: serde_json::Value = serde_json::from_str(serialized_public_key)
            .map_err(|err| ClientError::InvalidResponse(format!("public key: {err}")))?;
        let builder = self
            .request
            .authorized(Method::POST, url, session_token)
            .json(&json!({
                "publicKey": public_key,
                "duration": self.cert_lifetime_ms,
            }));
        let response: CertificateResponse = self.send(builder).await?;
        Ok(response.cert)
    }
}
