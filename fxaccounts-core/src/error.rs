use thiserror::Error;

use crate::storage::StorageError;

/// Result type for account operations.
pub type AccountResult<T> = Result<T, AccountError>;

/// Error outputs from the account manager.
#[derive(Debug, Error)]
#[cfg_attr(feature = "ffi", derive(uniffi::Error))]
#[cfg_attr(feature = "ffi", uniffi(flat_error))]
pub enum AccountError {
    /// Reading or writing the signed-in user failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// A remote endpoint was configured without an encrypted transport.
    #[error("insecure_endpoint: {0} must use https")]
    InsecureEndpoint(String),
    /// The configuration could not be parsed or is not usable.
    #[error("invalid_config: {0}")]
    InvalidConfig(String),
    /// No user is signed in (or the user signed out while the request was running).
    #[error("not_signed_in")]
    NotSignedIn,
    /// The signed-in user has not verified their email address yet.
    #[error("not_verified")]
    NotVerified,
    /// A token required for the operation is missing from the credential record.
    #[error("missing_token: {0}")]
    MissingToken(&'static str),
    /// A call to the remote identity service failed.
    #[error(transparent)]
    RemoteCall(#[from] ClientError),
    /// Key material is malformed (bad hex, mismatched lengths).
    #[error("invalid_key_material: {0}")]
    InvalidKeyMaterial(String),
    /// Verification polling gave up before the account was verified.
    #[error("verification_timed_out after {attempts} polls")]
    VerificationTimedOut {
        /// Number of status checks performed.
        attempts: usize,
    },
    /// Unexpected error serializing information
    #[error("serialization_error: {0}")]
    Serialization(String),
}

/// Errors returned by a remote identity client.
///
/// Cloneable so that a single failed signing request can be handed to every caller
/// waiting on it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Error))]
#[cfg_attr(feature = "ffi", uniffi(flat_error))]
pub enum ClientError {
    /// Network connection error with details
    #[error("network_error: {url} (status {status:?}): {error}")]
    Network {
        /// The requested URL.
        url: String,
        /// HTTP status, when a response was received.
        status: Option<u16>,
        /// Description of the failure.
        error: String,
    },
    /// The service answered with a body that could not be understood.
    #[error("invalid_response: {0}")]
    InvalidResponse(String),
}
