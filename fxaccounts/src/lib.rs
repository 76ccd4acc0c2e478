//! Account and assertion client for a federated-identity sync service.
//!
//! Re-exports [`fxaccounts_core`], which holds the implementation.
pub use fxaccounts_core::*;

#[cfg(feature = "ffi")]
fxaccounts_core::uniffi_reexport_scaffolding!();
