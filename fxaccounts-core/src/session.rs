//! The signed-in user: cached record, sign-in/sign-out, key derivation and
//! verification polling.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use backon::{ConstantBuilder, Retryable};
use log::{debug, info, warn};
use tokio::sync::broadcast;

use crate::client::IdentityClient;
use crate::config::AccountsConfig;
use crate::error::{AccountError, AccountResult, ClientError};
use crate::storage::{CredentialRecord, CredentialStore, StorageResult};
use crate::utils::derive_kb;

const EVENT_CAPACITY: usize = 16;

/// Notifications about the signed-in user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum AccountEvent {
    /// A user signed in.
    Login,
    /// The signed-in user verified their email address.
    Verified,
    /// The user signed out.
    Logout,
}

/// Identity epoch, advanced on every sign-in and sign-out.
///
/// Work started under one epoch must not write state once the epoch moved on.
#[derive(Debug, Clone, Default)]
pub(crate) struct Epoch(Arc<AtomicU64>);

impl Epoch {
    pub(crate) fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// The signed-in record together with the epoch it belongs to.
#[derive(Debug, Clone)]
pub(crate) struct SignedInUser {
    pub(crate) record: CredentialRecord,
    pub(crate) generation: u64,
}

#[derive(Default)]
struct SessionState {
    user: Option<CredentialRecord>,
    // Set while a signed-out record may still be in the store.
    pending_clear: bool,
}

enum PollError {
    Pending,
    SignedOut,
    Remote(ClientError),
}

/// Owns the signed-in user record and mediates every change to it.
pub struct SessionController {
    store: Arc<dyn CredentialStore>,
    client: Arc<dyn IdentityClient>,
    epoch: Epoch,
    poll_interval: Duration,
    max_polls: usize,
    state: Mutex<SessionState>,
    key_fetch: tokio::sync::Mutex<()>,
    events: broadcast::Sender<AccountEvent>,
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("epoch", &self.epoch.current())
            .finish_non_exhaustive()
    }
}

impl SessionController {
    /// Creates a controller over `store`, using `client` for key fetches and
    /// verification checks.
    #[must_use]
    pub fn new(
        store: Arc<dyn CredentialStore>,
        client: Arc<dyn IdentityClient>,
        config: &AccountsConfig,
    ) -> Self {
        Self::with_epoch(store, client, config, Epoch::default())
    }

    pub(crate) fn with_epoch(
        store: Arc<dyn CredentialStore>,
        client: Arc<dyn IdentityClient>,
        config: &AccountsConfig,
        epoch: Epoch,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            store,
            client,
            epoch,
            poll_interval: config.verification_poll_interval(),
            max_polls: config.verification_max_polls.max(1),
            state: Mutex::new(SessionState::default()),
            key_fetch: tokio::sync::Mutex::new(()),
            events,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns `true` if the record belongs to a verified account.
    #[must_use]
    pub const fn is_user_email_verified(record: &CredentialRecord) -> bool {
        record.is_verified
    }

    /// Subscribes to sign-in, verification and sign-out notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AccountEvent> {
        self.events.subscribe()
    }

    fn notify(&self, event: AccountEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Returns the signed-in user, loading it from the store on a cache miss.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read.
    pub fn get_signed_in_user(&self) -> StorageResult<Option<CredentialRecord>> {
        Ok(self.snapshot()?.map(|user| user.record))
    }

    pub(crate) fn snapshot(&self) -> StorageResult<Option<SignedInUser>> {
        let mut state = self.lock_state();
        if state.user.is_none() && !state.pending_clear {
            state.user = self.store.get()?;
            if state.user.is_some() {
                debug!("loaded signed-in user from storage");
            }
        }
        Ok(state.user.clone().map(|record| SignedInUser {
            record,
            generation: self.epoch.current(),
        }))
    }

    /// Drops the in-memory record; the next read goes to the store unless a
    /// failed sign-out left a stale record there.
    pub fn evict_cache(&self) {
        self.lock_state().user = None;
    }

    /// Stores `record` as the signed-in user and starts a new identity epoch.
    ///
    /// The cache is only replaced once the store accepted the record.
    ///
    /// # Errors
    /// Returns an error if the store write fails; the previous user stays signed in.
    pub fn set_signed_in_user(&self, record: CredentialRecord) -> StorageResult<()> {
        {
            let mut state = self.lock_state();
            self.store.put(&record)?;
            self.epoch.advance();
            state.user = Some(record);
            state.pending_clear = false;
        }
        info!("user signed in");
        self.notify(AccountEvent::Login);
        Ok(())
    }

    /// Forgets the signed-in user in memory and in the store.
    ///
    /// If erasing the store fails the user is still signed out in memory: in-flight
    /// work is invalidated and the stale record is not read back until the next
    /// sign-in.
    ///
    /// # Errors
    /// Returns an error if the store cannot be cleared.
    pub fn sign_out(&self) -> StorageResult<()> {
        let cleared = {
            let mut state = self.lock_state();
            self.epoch.advance();
            state.user = None;
            let cleared = self.store.clear();
            state.pending_clear = cleared.is_err();
            cleared
        };
        if let Err(err) = &cleared {
            warn!("signed out, but the stored record could not be erased: {err}");
        } else {
            info!("user signed out");
        }
        self.notify(AccountEvent::Logout);
        cleared
    }

    /// Writes `record` if the identity epoch is still `generation`.
    fn commit(&self, generation: u64, record: CredentialRecord) -> AccountResult<()> {
        let mut state = self.lock_state();
        if self.epoch.current() != generation {
            warn!("discarding account update for a signed-out session");
            return Err(AccountError::NotSignedIn);
        }
        self.store.put(&record)?;
        state.user = Some(record);
        Ok(())
    }

    /// Returns the record with `kA`/`kB` derived, fetching them if needed.
    ///
    /// When the keys are missing the single-use `keyFetchToken` is exchanged for the
    /// key bundle, `kB = wrapKB XOR unwrapBKey` is derived and the record is stored
    /// without `keyFetchToken` and `unwrapBKey`. Concurrent callers wait for the
    /// first fetch instead of spending the token twice.
    ///
    /// # Errors
    /// - [`AccountError::NotSignedIn`] if nobody is signed in.
    /// - [`AccountError::MissingToken`] if keys are absent and cannot be fetched.
    /// - [`AccountError::RemoteCall`] if the key fetch fails.
    /// - [`AccountError::InvalidKeyMaterial`] if the bundle cannot be unwrapped.
    pub async fn get_keys(&self) -> AccountResult<CredentialRecord> {
        let _fetching = self.key_fetch.lock().await;

        let user = self.snapshot()?.ok_or(AccountError::NotSignedIn)?;
        if user.record.has_keys() {
            return Ok(user.record);
        }
        let key_fetch_token = user
            .record
            .key_fetch_token
            .as_deref()
            .ok_or(AccountError::MissingToken("keyFetchToken"))?;
        let unwrap_b_key = user
            .record
            .unwrap_b_key
            .as_deref()
            .ok_or(AccountError::MissingToken("unwrapBKey"))?;

        debug!("fetching account keys");
        let bundle = self.client.fetch_keys(key_fetch_token).await?;
        let k_b = derive_kb(&bundle.wrap_kb, unwrap_b_key)?;

        let mut updated = user.record.clone();
        updated.k_a = Some(hex::encode(&bundle.k_a));
        updated.k_b = Some(k_b);
        updated.key_fetch_token = None;
        updated.unwrap_b_key = None;
        // The key endpoint only answers for verified accounts.
        updated.is_verified = true;
        self.commit(user.generation, updated.clone())?;
        info!("account keys derived");
        Ok(updated)
    }

    /// Resolves once the account behind `record` has verified its email address.
    ///
    /// Polls the identity service every `verification_poll_interval_ms`, at most
    /// `verification_max_polls` times. The stored record is then marked verified.
    ///
    /// # Errors
    /// - [`AccountError::MissingToken`] if the record has no session token.
    /// - [`AccountError::RemoteCall`] if a status check fails (not retried).
    /// - [`AccountError::VerificationTimedOut`] if polling gives up.
    /// - [`AccountError::NotSignedIn`] if the user signed out meanwhile.
    pub async fn when_verified(
        &self,
        record: CredentialRecord,
    ) -> AccountResult<CredentialRecord> {
        if Self::is_user_email_verified(&record) {
            return Ok(record);
        }
        let generation = self.epoch.current();
        let session_token = record
            .session_token
            .as_deref()
            .ok_or(AccountError::MissingToken("sessionToken"))?;

        self.poll_until_verified(generation, session_token).await?;

        let user = self
            .snapshot()?
            .filter(|user| user.generation == generation)
            .ok_or(AccountError::NotSignedIn)?;
        let mut updated = user.record;
        updated.is_verified = true;
        self.commit(generation, updated.clone())?;
        info!("account email verified");
        self.notify(AccountEvent::Verified);
        Ok(updated)
    }

    async fn poll_until_verified(
        &self,
        generation: u64,
        session_token: &str,
    ) -> AccountResult<()> {
        let client = &self.client;
        let epoch = &self.epoch;
        let backoff = ConstantBuilder::default()
            .with_delay(self.poll_interval)
            .with_max_times(self.max_polls - 1);

        let result = (move || async move {
            if epoch.current() != generation {
                return Err(PollError::SignedOut);
            }
            match client.check_email_status(session_token).await {
                Ok(status) if status.verified => Ok(()),
                Ok(_) => Err(PollError::Pending),
                Err(err) => Err(PollError::Remote(err)),
            }
        })
        .retry(backoff)
        .when(|err: &PollError| matches!(err, PollError::Pending))
        .notify(|_: &PollError, dur: Duration| {
            debug!("email not verified yet, checking again in {dur:?}");
        })
        .await;

        match result {
            Ok(()) => Ok(()),
            Err(PollError::Pending) => Err(AccountError::VerificationTimedOut {
                attempts: self.max_polls,
            }),
            Err(PollError::SignedOut) => {
                debug!("stopped verification polling after sign-out");
                Err(AccountError::NotSignedIn)
            }
            Err(PollError::Remote(err)) => Err(err.into()),
        }
    }
}
