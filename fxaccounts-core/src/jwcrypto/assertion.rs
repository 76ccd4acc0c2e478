//! Building and decoding backed assertions.
//!
//! An assertion is `<certificate>~<header>.<payload>.<signature>`, where the three
//! dot-separated parts are base64url (unpadded) and header/payload are JSON.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};

use super::keys::{KeyPair, PublicKey, ALGORITHM};
use crate::error::{AccountError, AccountResult};

/// Header of the signed statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionHeader {
    /// Signing algorithm identifier.
    pub alg: String,
}

/// Payload of the signed statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionPayload {
    /// Audience the assertion is intended for.
    pub aud: String,
    /// Expiration, in milliseconds since the Unix epoch.
    pub exp: u64,
}

/// Signs a statement for `audience` with `key_pair` and joins it to `certificate`.
///
/// # Errors
/// Returns [`AccountError::Serialization`] if header or payload cannot be encoded.
pub fn build_assertion(
    certificate: &str,
    key_pair: &KeyPair,
    audience: &str,
    expires_at_ms: u64,
) -> AccountResult<String> {
    let header = encode_part(&AssertionHeader {
        alg: ALGORITHM.to_string(),
    })?;
    let payload = encode_part(&AssertionPayload {
        aud: audience.to_string(),
        exp: expires_at_ms,
    })?;
    let signing_input = format!("{header}.{payload}");
    let signature = URL_SAFE_NO_PAD.encode(key_pair.sign(signing_input.as_bytes()));
    Ok(format!("{certificate}~{signing_input}.{signature}"))
}

fn encode_part<T: Serialize>(value: &T) -> AccountResult<String> {
    let json =
        serde_json::to_vec(value).map_err(|err| AccountError::Serialization(err.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

fn decode_part<T: for<'de> Deserialize<'de>>(part: &str) -> AccountResult<T> {
    let bytes = URL_SAFE_NO_PAD
        .decode(part)
        .map_err(|err| AccountError::Serialization(err.to_string()))?;
    serde_json::from_slice(&bytes).map_err(|err| AccountError::Serialization(err.to_string()))
}

/// A decoded assertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assertion {
    /// The certificate backing the statement, as issued by the identity service.
    pub certificate: String,
    /// Decoded statement header.
    pub header: AssertionHeader,
    /// Decoded statement payload.
    pub payload: AssertionPayload,
    signing_input: String,
    signature: Vec<u8>,
}

impl Assertion {
    /// Splits and decodes an assertion string.
    ///
    /// # Errors
    /// Returns [`AccountError::Serialization`] if the string is not a well-formed
    /// assertion.
    pub fn parse(assertion: &str) -> AccountResult<Self> {
        let malformed = || AccountError::Serialization("malformed assertion".to_string());
        let (certificate, statement) = assertion.rsplit_once('~').ok_or_else(malformed)?;
        let (signing_input, signature) = statement.rsplit_once('.').ok_or_else(malformed)?;
        let (header, payload) = signing_input.split_once('.').ok_or_else(malformed)?;
        Ok(Self {
            certificate: certificate.to_string(),
            header: decode_part(header)?,
            payload: decode_part(payload)?,
            signing_input: signing_input.to_string(),
            signature: URL_SAFE_NO_PAD
                .decode(signature)
                .map_err(|err| AccountError::Serialization(err.to_string()))?,
        })
    }

    /// Checks the statement signature against the certified public key.
    #[must_use]
    pub fn verify(&self, public_key: &PublicKey) -> bool {
        self.header.alg == ALGORITHM
            && public_key.verify(self.signing_input.as_bytes(), &self.signature)
    }
}
