//! The remote identity service as seen by the account manager.

use async_trait::async_trait;
use serde::Deserialize;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::ClientError;

mod http;
mod request;

pub use http::HttpIdentityClient;

/// Key material returned by the key-fetch endpoint.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyBundle {
    /// Class-A key, used as-is.
    pub k_a: Vec<u8>,
    /// Class-B key wrapped with the account's `unwrapBKey`.
    pub wrap_kb: Vec<u8>,
}

impl std::fmt::Debug for KeyBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyBundle").finish_non_exhaustive()
    }
}

/// Verification status of the account email address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct EmailStatus {
    /// Whether the address has been confirmed.
    pub verified: bool,
}

/// Calls the account manager makes to the identity service.
///
/// Timeouts and transport retries are the implementation's concern; the account
/// manager never retries a failed call on its own.
#[async_trait]
pub trait IdentityClient: Send + Sync {
    /// Exchanges a single-use key-fetch token for the account key bundle.
    async fn fetch_keys(&self, key_fetch_token: &str) -> Result<KeyBundle, ClientError>;

    /// Reports whether the account behind `session_token` has verified its email.
    async fn check_email_status(&self, session_token: &str)
        -> Result<EmailStatus, ClientError>;

    /// Asks the service to certify `serialized_public_key` for the session's account,
    /// returning the certificate blob.
    async fn sign_certificate(
        &self,
        session_token: &str,
        serialized_public_key: &str,
    ) -> Result<String, ClientError>;
}
