//! Common test utilities shared across integration tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use fxaccounts_core::client::{EmailStatus, IdentityClient, KeyBundle};
use fxaccounts_core::clock::Clock;
use fxaccounts_core::storage::{JsonCredentialStore, StoragePaths};
use fxaccounts_core::{AccountsConfig, ClientError, FxAccounts};
use tokio::sync::Semaphore;
use uuid::Uuid;

pub fn expand_hex(two_hex: &str) -> String {
    two_hex.repeat(32)
}

#[allow(dead_code, reason = "used in tests")]
pub fn expand_bytes(two_hex: &str) -> Vec<u8> {
    hex::decode(expand_hex(two_hex)).expect("hex")
}

pub struct ManualClock(AtomicU64);

impl ManualClock {
    pub const fn new(now_ms: u64) -> Self {
        Self(AtomicU64::new(now_ms))
    }

    #[allow(dead_code, reason = "used in tests")]
    pub fn set(&self, now_ms: u64) {
        self.0.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Identity service stand-in whose answers are released by the test.
pub struct FakeIdentityService {
    keys: Mutex<Option<KeyBundle>>,
    unverified_checks: AtomicU64,
    sign_calls: Mutex<Vec<(String, String)>>,
    sign_gate: Semaphore,
    certificates: Mutex<Vec<String>>,
}

impl FakeIdentityService {
    pub fn new() -> Self {
        Self {
            keys: Mutex::new(None),
            unverified_checks: AtomicU64::new(0),
            sign_calls: Mutex::new(Vec::new()),
            sign_gate: Semaphore::new(0),
            certificates: Mutex::new(Vec::new()),
        }
    }

    #[allow(dead_code, reason = "used in tests")]
    pub fn set_keys(&self, k_a: Vec<u8>, wrap_kb: Vec<u8>) {
        *self.keys.lock().expect("lock") = Some(KeyBundle { k_a, wrap_kb });
    }

    #[allow(dead_code, reason = "used in tests")]
    pub fn unverified_for(&self, checks: u64) {
        self.unverified_checks.store(checks, Ordering::SeqCst);
    }

    /// Lets one pending signing request complete with `certificate`.
    #[allow(dead_code, reason = "used in tests")]
    pub fn resolve_signing(&self, certificate: &str) {
        self.certificates
            .lock()
            .expect("lock")
            .push(certificate.to_string());
        self.sign_gate.add_permits(1);
    }

    #[allow(dead_code, reason = "used in tests")]
    pub fn sign_calls(&self) -> Vec<(String, String)> {
        self.sign_calls.lock().expect("lock").clone()
    }
}

impl Default for FakeIdentityService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityClient for FakeIdentityService {
    async fn fetch_keys(&self, _key_fetch_token: &str) -> Result<KeyBundle, ClientError> {
        self.keys
            .lock()
            .expect("lock")
            .clone()
            .ok_or_else(|| ClientError::InvalidResponse("no keys".to_string()))
    }

    async fn check_email_status(
        &self,
        _session_token: &str,
    ) -> Result<EmailStatus, ClientError> {
        let pending = self
            .unverified_checks
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        Ok(EmailStatus { verified: !pending })
    }

    async fn sign_certificate(
        &self,
        session_token: &str,
        serialized_public_key: &str,
    ) -> Result<String, ClientError> {
        self.sign_calls
            .lock()
            .expect("lock")
            .push((session_token.to_string(), serialized_public_key.to_string()));
        self.sign_gate.acquire().await.expect("gate").forget();
        Ok(self.certificates.lock().expect("lock").remove(0))
    }
}

/// Config for tests: polls without waiting.
pub fn test_config() -> AccountsConfig {
    AccountsConfig {
        verification_poll_interval_ms: 0,
        verification_max_polls: 10,
        ..AccountsConfig::default()
    }
}

#[allow(dead_code, reason = "used in tests")]
pub fn accounts_in_memory(
    service: &Arc<FakeIdentityService>,
    clock: &Arc<ManualClock>,
) -> FxAccounts {
    FxAccounts::new(
        test_config(),
        Arc::new(JsonCredentialStore::in_memory()),
        Arc::clone(service) as Arc<dyn IdentityClient>,
        Arc::clone(clock) as Arc<dyn Clock>,
    )
    .expect("accounts")
}

pub fn temp_root() -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("fxaccounts-test-{}", Uuid::new_v4()));
    path
}

#[allow(dead_code, reason = "used in tests")]
pub fn cleanup_storage(root: &Path) {
    use std::fs;
    let paths = StoragePaths::new(root);
    // Best effort; a test may not have created every path.
    let _ = fs::remove_file(paths.signed_in_user_path());
    let _ = fs::remove_dir_all(paths.accounts_dir());
    let _ = fs::remove_dir_all(paths.root());
}
