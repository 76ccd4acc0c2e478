//! Ephemeral keypair and certificate management, and per-audience assertions.
//!
//! The provisioning pair moves through three states:
//!
//! ```text
//! Absent --keygen--> KeyOnly --certificate--> Provisioned
//!   ^                  ^                          |
//!   |                  +---- certificate expiry --+
//!   +---------- key expiry / sign-out ------------+
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use log::{debug, warn};

use crate::client::IdentityClient;
use crate::clock::Clock;
use crate::config::AccountsConfig;
use crate::error::{AccountError, AccountResult, ClientError};
use crate::jwcrypto::{build_assertion, KeyPair};
use crate::session::{Epoch, SignedInUser};

/// Where the provisioning pair currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum ProvisioningState {
    /// No usable keypair.
    Absent,
    /// A keypair without a valid certificate.
    KeyOnly,
    /// A keypair with a valid certificate over it.
    Provisioned,
}

#[derive(Clone)]
struct EphemeralKey {
    id: u64,
    key_pair: Arc<KeyPair>,
    valid_until: u64,
}

struct Certificate {
    blob: String,
    valid_until: u64,
    key_id: u64,
    request_id: u64,
}

type SigningResponse = Shared<BoxFuture<'static, Result<String, ClientError>>>;

#[derive(Clone)]
struct InFlightSigning {
    key_id: u64,
    request_id: u64,
    response: SigningResponse,
}

#[derive(Default)]
struct ProvisionState {
    generation: u64,
    key: Option<EphemeralKey>,
    cert: Option<Certificate>,
    in_flight: Option<InFlightSigning>,
    next_id: u64,
}

impl ProvisionState {
    fn wipe(&mut self) {
        self.key = None;
        self.cert = None;
        self.in_flight = None;
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Returns the current keypair, generating one if it is absent or expired.
    fn fresh_key(&mut self, now: u64, lifetime_ms: u64) -> EphemeralKey {
        if let Some(key) = self.key.as_ref().filter(|key| now < key.valid_until) {
            return key.clone();
        }
        let key = EphemeralKey {
            id: self.next_id(),
            key_pair: Arc::new(KeyPair::generate()),
            valid_until: now.saturating_add(lifetime_ms),
        };
        debug!("generated keypair {} valid until {}", key.id, key.valid_until);
        // Certificates and pending requests for the old key are useless now.
        self.cert = None;
        self.in_flight = None;
        self.key = Some(key.clone());
        key
    }

    fn valid_cert(&self, key_id: u64, now: u64) -> Option<&Certificate> {
        self.cert
            .as_ref()
            .filter(|cert| cert.key_id == key_id && now < cert.valid_until)
    }
}

/// Keeps a certified keypair ready and signs assertions with it.
///
/// At most one certificate signing request is outstanding at a time; concurrent
/// callers share its result.
pub struct AssertionProvisioner {
    client: Arc<dyn IdentityClient>,
    clock: Arc<dyn Clock>,
    epoch: Epoch,
    key_lifetime_ms: u64,
    cert_lifetime_ms: u64,
    assertion_lifetime_ms: u64,
    state: Mutex<ProvisionState>,
}

impl std::fmt::Debug for AssertionProvisioner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssertionProvisioner")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl AssertionProvisioner {
    pub(crate) fn new(
        client: Arc<dyn IdentityClient>,
        clock: Arc<dyn Clock>,
        config: &AccountsConfig,
        epoch: Epoch,
    ) -> Self {
        let state = ProvisionState {
            generation: epoch.current(),
            ..ProvisionState::default()
        };
        Self {
            client,
            clock,
            epoch,
            key_lifetime_ms: config.key_lifetime_ms,
            cert_lifetime_ms: config.cert_lifetime_ms,
            assertion_lifetime_ms: config.assertion_lifetime_ms,
            state: Mutex::new(state),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, ProvisionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the state of the provisioning pair as of now.
    #[must_use]
    pub fn state(&self) -> ProvisioningState {
        let now = self.clock.now_ms();
        let state = self.lock_state();
        match state.key.as_ref().filter(|key| now < key.valid_until) {
            None => ProvisioningState::Absent,
            Some(key) if state.valid_cert(key.id, now).is_some() => {
                ProvisioningState::Provisioned
            }
            Some(_) => ProvisioningState::KeyOnly,
        }
    }

    /// Expiry of the current keypair, in milliseconds since the Unix epoch.
    #[must_use]
    pub fn key_valid_until(&self) -> Option<u64> {
        self.lock_state().key.as_ref().map(|key| key.valid_until)
    }

    /// Expiry of the current certificate, in milliseconds since the Unix epoch.
    #[must_use]
    pub fn certificate_valid_until(&self) -> Option<u64> {
        self.lock_state().cert.as_ref().map(|cert| cert.valid_until)
    }

    /// Drops the keypair, the certificate and any outstanding signing request.
    pub(crate) fn reset(&self) {
        let mut state = self.lock_state();
        state.wipe();
        state.generation = self.epoch.current();
    }

    /// Builds an assertion for `audience` on behalf of `user`.
    pub(crate) async fn get_assertion(
        &self,
        user: &SignedInUser,
        audience: &str,
    ) -> AccountResult<String> {
        if !user.record.is_verified {
            return Err(AccountError::NotVerified);
        }
        let session_token = user
            .record
            .session_token
            .as_deref()
            .ok_or(AccountError::MissingToken("sessionToken"))?;

        let (key, certificate) = self.certified_key(user.generation, session_token).await?;
        let expires_at = self.clock.now_ms().saturating_add(self.assertion_lifetime_ms);
        build_assertion(&certificate, &key.key_pair, audience, expires_at)
    }

    async fn certified_key(
        &self,
        generation: u64,
        session_token: &str,
    ) -> AccountResult<(EphemeralKey, String)> {
        let (key, request) = {
            let mut state = self.lock_state();
            if self.epoch.current() != generation {
                return Err(AccountError::NotSignedIn);
            }
            if state.generation != generation {
                state.wipe();
                state.generation = generation;
            }

            let now = self.clock.now_ms();
            let key = state.fresh_key(now, self.key_lifetime_ms);
            if let Some(cert) = state.valid_cert(key.id, now) {
                return Ok((key, cert.blob.clone()));
            }

            let pending = state
                .in_flight
                .as_ref()
                .filter(|request| request.key_id == key.id)
                .cloned();
            let request = match pending {
                Some(request) => {
                    debug!("joining certificate request {}", request.request_id);
                    request
                }
                None => self.start_signing(&mut state, &key, session_token)?,
            };
            (key, request)
        };

        let response = request.response.clone().await;
        self.finish_signing(generation, key, &request, response)
    }

    fn start_signing(
        &self,
        state: &mut ProvisionState,
        key: &EphemeralKey,
        session_token: &str,
    ) -> AccountResult<InFlightSigning> {
        let serialized_public_key = key.key_pair.public_key().serialize()?;
        let client = Arc::clone(&self.client);
        let session_token = session_token.to_string();
        let response = async move {
            client
                .sign_certificate(&session_token, &serialized_public_key)
                .await
        }
        .boxed()
        .shared();

        let request = InFlightSigning {
            key_id: key.id,
            request_id: state.next_id(),
            response,
        };
        debug!(
            "requesting certificate {} for keypair {}",
            request.request_id, key.id
        );
        state.in_flight = Some(request.clone());
        Ok(request)
    }

    fn finish_signing(
        &self,
        generation: u64,
        key: EphemeralKey,
        request: &InFlightSigning,
        response: Result<String, ClientError>,
    ) -> AccountResult<(EphemeralKey, String)> {
        let mut state = self.lock_state();
        if state
            .in_flight
            .as_ref()
            .is_some_and(|pending| pending.request_id == request.request_id)
        {
            state.in_flight = None;
        }
        if state.generation != generation || self.epoch.current() != generation {
            warn!(
                "discarding certificate response {} for a signed-out session",
                request.request_id
            );
            return Err(AccountError::NotSignedIn);
        }

        let blob = response?;
        let installed = state
            .cert
            .as_ref()
            .is_some_and(|cert| cert.request_id == request.request_id);
        let key_is_current = state.key.as_ref().is_some_and(|current| current.id == key.id);
        if !installed && key_is_current {
            let valid_until = self.clock.now_ms().saturating_add(self.cert_lifetime_ms);
            debug!("certificate {} valid until {valid_until}", request.request_id);
            state.cert = Some(Certificate {
                blob: blob.clone(),
                valid_until,
                key_id: key.id,
                request_id: request.request_id,
            });
        }
        Ok((key, blob))
    }
}
