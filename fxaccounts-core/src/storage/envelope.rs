//! Versioned envelope around the persisted signed-in user.

use serde::{Deserialize, Serialize};

use super::error::{StorageError, StorageResult};
use super::types::CredentialRecord;

const ENVELOPE_VERSION: u32 = 1;

#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SignedInUserEnvelope {
    pub(crate) version: u32,
    pub(crate) account_data: CredentialRecord,
}

impl SignedInUserEnvelope {
    pub(crate) const fn new(account_data: CredentialRecord) -> Self {
        Self {
            version: ENVELOPE_VERSION,
            account_data,
        }
    }

    pub(crate) fn serialize(&self) -> StorageResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|err| StorageError::Serialization(err.to_string()))
    }

    pub(crate) fn deserialize(bytes: &[u8]) -> StorageResult<Self> {
        // Check the version before the payload so newer layouts report the version.
        let raw: serde_json::Value = serde_json::from_slice(bytes)
            .map_err(|err| StorageError::Serialization(err.to_string()))?;
        let version = raw
            .get("version")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| {
                StorageError::Serialization("envelope has no version".to_string())
            })?;
        let version = u32::try_from(version).unwrap_or(u32::MAX);
        if version != ENVELOPE_VERSION {
            return Err(StorageError::UnsupportedVersion(version));
        }
        serde_json::from_value(raw)
            .map_err(|err| StorageError::Serialization(err.to_string()))
    }
}
