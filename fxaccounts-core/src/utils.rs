//! Key derivation helpers.

use zeroize::Zeroizing;

use crate::error::{AccountError, AccountResult};

/// Byte-wise exclusive-or of two equal-length byte strings.
///
/// # Errors
/// Returns [`AccountError::InvalidKeyMaterial`] when the lengths differ.
pub fn xor(a: &[u8], b: &[u8]) -> AccountResult<Zeroizing<Vec<u8>>> {
    if a.len() != b.len() {
        return Err(AccountError::InvalidKeyMaterial(format!(
            "length mismatch: {} vs {} bytes",
            a.len(),
            b.len()
        )));
    }
    Ok(Zeroizing::new(
        a.iter().zip(b).map(|(left, right)| left ^ right).collect(),
    ))
}

/// Decodes a hex-encoded key field of the credential record.
pub(crate) fn decode_key_hex(
    value: &str,
    label: &'static str,
) -> AccountResult<Zeroizing<Vec<u8>>> {
    hex::decode(value)
        .map(Zeroizing::new)
        .map_err(|err| AccountError::InvalidKeyMaterial(format!("{label}: {err}")))
}

/// Unwraps `kB` from the fetched `wrapKB` and the locally held `unwrapBKey`.
pub(crate) fn derive_kb(wrap_kb: &[u8], unwrap_b_key_hex: &str) -> AccountResult<String> {
    let unwrap_b_key = decode_key_hex(unwrap_b_key_hex, "unwrapBKey")?;
    let k_b = xor(wrap_kb, &unwrap_b_key)?;
    Ok(hex::encode(k_b.as_slice()))
}
