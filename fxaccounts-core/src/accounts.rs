use std::sync::Arc;

use log::info;
use reqwest::Url;
use tokio::sync::broadcast;

use crate::client::{HttpIdentityClient, IdentityClient};
use crate::clock::{Clock, SystemClock};
use crate::config::AccountsConfig;
use crate::defaults::DefaultConfig;
use crate::error::{AccountError, AccountResult};
use crate::provisioner::AssertionProvisioner;
use crate::session::{AccountEvent, Epoch, SessionController};
use crate::storage::{CredentialRecord, CredentialStore};
use crate::Environment;

/// The account manager: the signed-in user, their keys and identity assertions.
///
/// # Examples
/// ```rust
/// use std::sync::Arc;
/// use fxaccounts_core::{AccountError, Environment, FxAccounts};
/// use fxaccounts_core::storage::JsonCredentialStore;
///
/// # tokio_test::block_on(async {
///     let store = Arc::new(JsonCredentialStore::in_memory());
///     let accounts = FxAccounts::with_environment(&Environment::Staging, store).unwrap();
///     assert_eq!(accounts.get_signed_in_user().unwrap(), None);
///     let assertion = accounts.get_assertion("https://sync.example.com").await;
///     assert!(matches!(assertion, Err(AccountError::NotSignedIn)));
/// # })
/// ```
pub struct FxAccounts {
    config: AccountsConfig,
    session: SessionController,
    provisioner: AssertionProvisioner,
}

impl std::fmt::Debug for FxAccounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FxAccounts")
            .field("remote_url", &self.config.remote_url)
            .field("provisioner", &self.provisioner)
            .finish_non_exhaustive()
    }
}

impl FxAccounts {
    /// Assembles an account manager from its collaborators.
    ///
    /// # Errors
    /// Returns [`AccountError::InvalidConfig`] if `config` is inconsistent.
    pub fn new(
        config: AccountsConfig,
        store: Arc<dyn CredentialStore>,
        client: Arc<dyn IdentityClient>,
        clock: Arc<dyn Clock>,
    ) -> AccountResult<Self> {
        config.validate()?;
        let epoch = Epoch::default();
        let session = SessionController::with_epoch(
            store,
            Arc::clone(&client),
            &config,
            epoch.clone(),
        );
        let provisioner = AssertionProvisioner::new(client, clock, &config, epoch);
        Ok(Self {
            config,
            session,
            provisioner,
        })
    }

    /// Creates an account manager talking to the servers of `environment`.
    ///
    /// # Errors
    /// Returns [`AccountError::InsecureEndpoint`] if an endpoint is not `https`.
    pub fn with_environment(
        environment: &Environment,
        store: Arc<dyn CredentialStore>,
    ) -> AccountResult<Self> {
        let config = AccountsConfig::from_environment(environment);
        let client = HttpIdentityClient::new(&config)?;
        Self::new(config, store, Arc::new(client), Arc::new(SystemClock))
    }

    /// The sign-in URI of the content server.
    ///
    /// # Errors
    /// Returns [`AccountError::InsecureEndpoint`] if the configured URL is not `https`.
    pub fn accounts_uri(&self) -> AccountResult<Url> {
        self.config.accounts_uri()
    }

    /// Returns the signed-in user, or `None`.
    ///
    /// # Errors
    /// Returns an error if the credential store cannot be read.
    pub fn get_signed_in_user(&self) -> AccountResult<Option<CredentialRecord>> {
        Ok(self.session.get_signed_in_user()?)
    }

    /// Signs in the user described by `record`, replacing any previous user.
    ///
    /// # Errors
    /// Returns an error if the record cannot be stored.
    pub fn set_signed_in_user(&self, record: CredentialRecord) -> AccountResult<()> {
        self.session.set_signed_in_user(record)?;
        self.provisioner.reset();
        Ok(())
    }

    /// Signs out, dropping the keypair, the certificate and the stored record.
    ///
    /// # Errors
    /// Returns an error if the stored record cannot be erased. The user is signed out
    /// in memory regardless.
    pub fn sign_out(&self) -> AccountResult<()> {
        let result = self.session.sign_out();
        self.provisioner.reset();
        info!("account state cleared");
        Ok(result?)
    }

    /// Drops the cached record so the next read goes to the credential store.
    pub fn evict_cache(&self) {
        self.session.evict_cache();
    }

    /// Returns the signed-in user with `kA` and `kB` available.
    ///
    /// # Errors
    /// See [`SessionController::get_keys`].
    pub async fn get_keys(&self) -> AccountResult<CredentialRecord> {
        self.session.get_keys().await
    }

    /// Resolves with the updated record once `record`'s account is verified.
    ///
    /// # Errors
    /// See [`SessionController::when_verified`].
    pub async fn when_verified(&self, record: CredentialRecord) -> AccountResult<CredentialRecord> {
        self.session.when_verified(record).await
    }

    /// Returns a signed identity assertion for `audience`.
    ///
    /// # Errors
    /// - [`AccountError::NotSignedIn`] if nobody is signed in or the user signs out
    ///   before the assertion is ready.
    /// - [`AccountError::NotVerified`] if the user is not verified.
    /// - [`AccountError::RemoteCall`] if the certificate cannot be obtained.
    pub async fn get_assertion(&self, audience: &str) -> AccountResult<String> {
        let user = self
            .session
            .snapshot()?
            .ok_or(AccountError::NotSignedIn)?;
        self.provisioner.get_assertion(&user, audience).await
    }

    /// Returns `true` if the record belongs to a verified account.
    #[must_use]
    pub const fn is_user_email_verified(record: &CredentialRecord) -> bool {
        SessionController::is_user_email_verified(record)
    }

    /// Subscribes to sign-in, verification and sign-out notifications.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AccountEvent> {
        self.session.subscribe()
    }

    /// The keypair and certificate manager, for inspection.
    #[must_use]
    pub const fn provisioner(&self) -> &AssertionProvisioner {
        &self.provisioner
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &AccountsConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provisioner::ProvisioningState;
    use crate::storage::JsonCredentialStore;
    use crate::test_support::{ManualClock, MockIdentityClient};

    const NOW: u64 = 138_000_000 * 1000;

    fn accounts(client: &Arc<MockIdentityClient>, config: AccountsConfig) -> FxAccounts {
        FxAccounts::new(
            config,
            Arc::new(JsonCredentialStore::in_memory()),
            Arc::clone(client) as Arc<dyn IdentityClient>,
            Arc::new(ManualClock::new(NOW)),
        )
        .unwrap()
    }

    fn verified_creds() -> CredentialRecord {
        CredentialRecord {
            email: Some("foo@example.com".to_string()),
            session_token: Some("sessionToken".to_string()),
            is_verified: true,
            ..CredentialRecord::default()
        }
    }

    #[test]
    fn test_new_validates_config() {
        let config = AccountsConfig {
            key_lifetime_ms: 1000,
            cert_lifetime_ms: 2000,
            ..AccountsConfig::default()
        };
        let result = FxAccounts::new(
            config,
            Arc::new(JsonCredentialStore::in_memory()),
            Arc::new(MockIdentityClient::new()),
            Arc::new(ManualClock::new(NOW)),
        );
        assert!(matches!(result, Err(AccountError::InvalidConfig(_))));
    }

    #[test]
    fn test_accounts_uri_requires_https() {
        let client = Arc::new(MockIdentityClient::new());
        let fxa = accounts(
            &client,
            AccountsConfig {
                remote_url: "http://accounts.example.com/".to_string(),
                ..AccountsConfig::default()
            },
        );
        assert!(matches!(
            fxa.accounts_uri(),
            Err(AccountError::InsecureEndpoint(_))
        ));
    }

    #[tokio::test]
    async fn test_assertion_requires_a_user() {
        let client = Arc::new(MockIdentityClient::new());
        let fxa = accounts(&client, AccountsConfig::default());
        assert!(matches!(
            fxa.get_assertion("audience.example.com").await,
            Err(AccountError::NotSignedIn)
        ));
    }

    #[tokio::test]
    async fn test_sign_out_resets_the_provisioner() {
        let client = Arc::new(MockIdentityClient::new());
        let fxa = accounts(&client, AccountsConfig::default());
        fxa.set_signed_in_user(verified_creds()).unwrap();
        fxa.get_assertion("audience.example.com").await.unwrap();
        assert_eq!(fxa.provisioner().state(), ProvisioningState::Provisioned);

        fxa.sign_out().unwrap();
        assert_eq!(fxa.provisioner().state(), ProvisioningState::Absent);
        assert!(matches!(
            fxa.get_assertion("audience.example.com").await,
            Err(AccountError::NotSignedIn)
        ));
    }

    #[tokio::test]
    async fn test_new_user_gets_a_new_keypair() {
        let client = Arc::new(MockIdentityClient::new());
        let fxa = accounts(&client, AccountsConfig::default());
        fxa.set_signed_in_user(verified_creds()).unwrap();
        fxa.get_assertion("audience.example.com").await.unwrap();

        fxa.set_signed_in_user(CredentialRecord {
            email: Some("bar@example.com".to_string()),
            ..verified_creds()
        })
        .unwrap();
        fxa.get_assertion("audience.example.com").await.unwrap();

        let calls = client.sign_calls();
        assert_eq!(calls.len(), 2);
        assert_ne!(calls[0].1, calls[1].1);
    }

    #[tokio::test]
    async fn test_sign_out_during_signing_discards_the_certificate() {
        let client = Arc::new(MockIdentityClient::new().with_gated_signing());
        let fxa = accounts(&client, AccountsConfig::default());
        fxa.set_signed_in_user(verified_creds()).unwrap();

        let (assertion, ()) = tokio::join!(fxa.get_assertion("audience.example.com"), async {
            tokio::task::yield_now().await;
            fxa.sign_out().unwrap();
            client.release_signing(1);
        });
        assert!(matches!(assertion, Err(AccountError::NotSignedIn)));
        assert_eq!(fxa.provisioner().state(), ProvisioningState::Absent);
        assert_eq!(fxa.get_signed_in_user().unwrap(), None);
    }
}
