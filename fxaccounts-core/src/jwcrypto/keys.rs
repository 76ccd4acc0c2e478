//! Ephemeral signing keys.

use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier as _, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::error::{AccountError, AccountResult};

/// Algorithm identifier carried in assertion headers and serialized public keys.
pub const ALGORITHM: &str = "EdDSA";

/// An Ed25519 keypair generated on the device.
#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

impl KeyPair {
    /// Generates a fresh keypair from the operating system RNG.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Returns the public half.
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing_key.verifying_key())
    }

    /// Signs `message`.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.signing_key.sign(message).to_bytes().to_vec()
    }
}

/// Public key of a [`KeyPair`].
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", URL_SAFE_NO_PAD.encode(self.0.as_bytes()))
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SerializedPublicKey {
    algorithm: String,
    public_key: String,
}

impl PublicKey {
    /// Serializes the key as `{"algorithm":"EdDSA","publicKey":"<base64url>"}`, the
    /// form sent to the certificate signing endpoint.
    ///
    /// # Errors
    /// Returns [`AccountError::Serialization`] if JSON encoding fails.
    pub fn serialize(&self) -> AccountResult<String> {
        serde_json::to_string(&SerializedPublicKey {
            algorithm: ALGORITHM.to_string(),
            public_key: URL_SAFE_NO_PAD.encode(self.0.as_bytes()),
        })
        .map_err(|err| AccountError::Serialization(err.to_string()))
    }

    /// Parses the output of [`PublicKey::serialize`].
    ///
    /// # Errors
    /// Returns [`AccountError::InvalidKeyMaterial`] for an unknown algorithm or a
    /// malformed key.
    pub fn deserialize(serialized: &str) -> AccountResult<Self> {
        let parsed: SerializedPublicKey = serde_json::from_str(serialized)
            .map_err(|err| AccountError::Serialization(err.to_string()))?;
        if parsed.algorithm != ALGORITHM {
            return Err(AccountError::InvalidKeyMaterial(format!(
                "unsupported algorithm {}",
                parsed.algorithm
            )));
        }
        let bytes = URL_SAFE_NO_PAD
            .decode(parsed.public_key)
            .map_err(|err| AccountError::InvalidKeyMaterial(err.to_string()))?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| {
            AccountError::InvalidKeyMaterial("public key must be 32 bytes".to_string())
        })?;
        VerifyingKey::from_bytes(&bytes)
            .map(Self)
            .map_err(|err| AccountError::InvalidKeyMaterial(err.to_string()))
    }

    /// Checks `signature` over `message`.
    #[must_use]
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        Signature::from_slice(signature)
            .is_ok_and(|signature| self.0.verify(message, &signature).is_ok())
    }
}
