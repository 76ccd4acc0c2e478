//! Local signing for backed assertions.

mod assertion;
mod keys;

pub use assertion::{build_assertion, Assertion, AssertionHeader, AssertionPayload};
pub use keys::{KeyPair, PublicKey, ALGORITHM};
