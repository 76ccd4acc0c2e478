//! The persisted credential record of the signed-in user.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Credentials of the signed-in user.
///
/// Field names serialize in camelCase (`sessionToken`, `keyFetchToken`, `unwrapBKey`,
/// `kA`, `kB`, `isVerified`). Key material is hex-encoded.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    /// Account email address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Account identifier assigned by the identity service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    /// Token authenticating the session against the identity service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
    /// Single-use token for fetching the account keys. Erased once consumed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_fetch_token: Option<String>,
    /// Hex-encoded key unwrapping `wrapKB` into `kB`. Erased once `kB` is derived.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unwrap_b_key: Option<String>,
    /// Hex-encoded class-A key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k_a: Option<String>,
    /// Hex-encoded class-B key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k_b: Option<String>,
    /// Whether the account email address has been verified.
    #[serde(default)]
    pub is_verified: bool,
    /// Opaque cached assertion, carried through persistence unchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assertion: Option<String>,
}

impl CredentialRecord {
    /// Returns `true` once both `kA` and `kB` have been derived.
    #[must_use]
    pub const fn has_keys(&self) -> bool {
        self.k_a.is_some() && self.k_b.is_some()
    }
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const fn redact(value: Option<&String>) -> &'static str {
            if value.is_some() {
                "<redacted>"
            } else {
                "<none>"
            }
        }

        f.debug_struct("CredentialRecord")
            .field("email", &self.email)
            .field("uid", &self.uid)
            .field("session_token", &redact(self.session_token.as_ref()))
            .field("key_fetch_token", &redact(self.key_fetch_token.as_ref()))
            .field("unwrap_b_key", &redact(self.unwrap_b_key.as_ref()))
            .field("k_a", &redact(self.k_a.as_ref()))
            .field("k_b", &redact(self.k_b.as_ref()))
            .field("is_verified", &self.is_verified)
            .finish_non_exhaustive()
    }
}
