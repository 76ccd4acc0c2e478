#![deny(clippy::all, clippy::pedantic, clippy::nursery)]
//! Account management for an identity service: the signed-in user, account keys,
//! email verification and identity assertions.
use strum::EnumString;

/// Deployment of the identity service to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
#[strum(serialize_all = "lowercase")]
pub enum Environment {
    /// Pre-release servers.
    Staging,
    /// Production servers.
    Production,
}

mod accounts;
pub use accounts::*;

mod error;
pub use error::*;

mod config;
pub use config::*;

mod defaults;
pub use defaults::DefaultConfig;

mod provisioner;
pub use provisioner::{AssertionProvisioner, ProvisioningState};

mod session;
pub use session::{AccountEvent, SessionController};

pub mod client;
pub mod clock;
pub mod jwcrypto;
pub mod logger;
pub mod storage;

pub use storage::CredentialRecord;

// private modules
mod utils;

#[cfg(test)]
mod test_support;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!("fxaccounts_core");
