//! Account manager configuration.

use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{AccountError, AccountResult};

/// Lifetime of a locally generated keypair.
pub const KEY_LIFETIME_MS: u64 = 12 * 3600 * 1000;
/// Lifetime requested for certificates over the keypair.
pub const CERT_LIFETIME_MS: u64 = 6 * 3600 * 1000;
/// Lifetime of a per-audience assertion.
pub const ASSERTION_LIFETIME_MS: u64 = 2 * 60 * 1000;
/// Interval between two email verification checks.
pub const VERIFICATION_POLL_INTERVAL_MS: u64 = 3 * 1000;
/// Number of verification checks before polling gives up (five minutes).
pub const VERIFICATION_MAX_POLLS: usize = 100;

/// Configuration of the account manager.
///
/// Every field has a default, so partial JSON documents are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountsConfig {
    /// Content server hosting the sign-in pages.
    pub remote_url: String,
    /// Base URL of the account API (e.g. `https://api.accounts.firefox.com/v1`).
    pub auth_server_url: String,
    /// Lifetime of a locally generated keypair, in milliseconds.
    pub key_lifetime_ms: u64,
    /// Lifetime of a certificate, in milliseconds.
    pub cert_lifetime_ms: u64,
    /// Lifetime of an assertion, in milliseconds.
    pub assertion_lifetime_ms: u64,
    /// Interval between two verification checks, in milliseconds.
    pub verification_poll_interval_ms: u64,
    /// Maximum number of verification checks.
    pub verification_max_polls: usize,
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            remote_url: "https://accounts.firefox.com/".to_string(),
            auth_server_url: "https://api.accounts.firefox.com/v1".to_string(),
            key_lifetime_ms: KEY_LIFETIME_MS,
            cert_lifetime_ms: CERT_LIFETIME_MS,
            assertion_lifetime_ms: ASSERTION_LIFETIME_MS,
            verification_poll_interval_ms: VERIFICATION_POLL_INTERVAL_MS,
            verification_max_polls: VERIFICATION_MAX_POLLS,
        }
    }
}

impl AccountsConfig {
    /// Parses a configuration from JSON.
    ///
    /// # Errors
    /// Returns [`AccountError::InvalidConfig`] if the document does not parse or the
    /// lifetimes are inconsistent.
    pub fn from_json(json: &str) -> AccountResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|err| AccountError::InvalidConfig(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the keypair outlives the certificates issued for it.
    ///
    /// # Errors
    /// Returns [`AccountError::InvalidConfig`] when a lifetime is zero or the key
    /// lifetime does not exceed the certificate lifetime.
    pub fn validate(&self) -> AccountResult<()> {
        if self.cert_lifetime_ms == 0 || self.assertion_lifetime_ms == 0 {
            return Err(AccountError::InvalidConfig(
                "lifetimes must be positive".to_string(),
            ));
        }
        if self.key_lifetime_ms <= self.cert_lifetime_ms {
            return Err(AccountError::InvalidConfig(format!(
                "key lifetime ({}ms) must exceed certificate lifetime ({}ms)",
                self.key_lifetime_ms, self.cert_lifetime_ms
            )));
        }
        Ok(())
    }

    /// Returns the sign-in URI of the content server.
    ///
    /// # Errors
    /// Fails with [`AccountError::InsecureEndpoint`] if the URL is not `https`.
    pub fn accounts_uri(&self) -> AccountResult<Url> {
        resolve_endpoint(&self.remote_url)
    }

    /// Returns the base URI of the account API.
    ///
    /// # Errors
    /// Fails with [`AccountError::InsecureEndpoint`] if the URL is not `https`.
    pub fn auth_server_uri(&self) -> AccountResult<Url> {
        resolve_endpoint(&self.auth_server_url)
    }

    /// Interval between two verification checks.
    #[must_use]
    pub const fn verification_poll_interval(&self) -> Duration {
        Duration::from_millis(self.verification_poll_interval_ms)
    }
}

/// Parses `url` and rejects anything not served over `https`.
pub(crate) fn resolve_endpoint(url: &str) -> AccountResult<Url> {
    let parsed = Url::parse(url)
        .map_err(|err| AccountError::InvalidConfig(format!("{url}: {err}")))?;
    if parsed.scheme() == "https" || is_test_loopback(&parsed) {
        return Ok(parsed);
    }
    Err(AccountError::InsecureEndpoint(url.to_string()))
}

// Unit tests talk to plain-http mock servers on the loopback interface.
#[cfg(test)]
fn is_test_loopback(url: &Url) -> bool {
    url.scheme() == "http"
        && matches!(url.host_str(), Some("127.0.0.1" | "localhost" | "[::1]"))
}

#[cfg(not(test))]
const fn is_test_loopback(_url: &Url) -> bool {
    false
}
