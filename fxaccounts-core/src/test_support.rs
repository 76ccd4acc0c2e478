//! Test doubles for the identity service and the clock.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::client::{EmailStatus, IdentityClient, KeyBundle};
use crate::clock::Clock;
use crate::error::ClientError;

/// 64 hex characters encoding 32 copies of the byte `two_hex`.
pub fn expand_hex(two_hex: &str) -> String {
    two_hex.repeat(32)
}

pub fn expand_bytes(two_hex: &str) -> Vec<u8> {
    hex::decode(expand_hex(two_hex)).unwrap()
}

pub struct ManualClock(AtomicU64);

impl ManualClock {
    pub const fn new(now_ms: u64) -> Self {
        Self(AtomicU64::new(now_ms))
    }

    pub fn set(&self, now_ms: u64) {
        self.0.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Scriptable identity service.
///
/// Certificates default to `cert1`, `cert2`, ... in call order. Gated calls wait
/// for a permit released by the test before answering.
pub struct MockIdentityClient {
    keys: Mutex<Option<KeyBundle>>,
    fetch_calls: AtomicUsize,
    unverified_checks: usize,
    check_calls: AtomicUsize,
    check_gate: Option<Semaphore>,
    sign_calls: Mutex<Vec<(String, String)>>,
    sign_responses: Mutex<VecDeque<Result<String, ClientError>>>,
    sign_gate: Option<Semaphore>,
}

impl MockIdentityClient {
    pub fn new() -> Self {
        Self {
            keys: Mutex::new(None),
            fetch_calls: AtomicUsize::new(0),
            unverified_checks: 0,
            check_calls: AtomicUsize::new(0),
            check_gate: None,
            sign_calls: Mutex::new(Vec::new()),
            sign_responses: Mutex::new(VecDeque::new()),
            sign_gate: None,
        }
    }

    /// The first `checks` status checks report an unverified account.
    pub fn verified_after(mut self, checks: usize) -> Self {
        self.unverified_checks = checks;
        self
    }

    pub fn with_gated_signing(mut self) -> Self {
        self.sign_gate = Some(Semaphore::new(0));
        self
    }

    pub fn with_gated_status_checks(mut self) -> Self {
        self.check_gate = Some(Semaphore::new(0));
        self
    }

    pub fn release_signing(&self, permits: usize) {
        if let Some(gate) = &self.sign_gate {
            gate.add_permits(permits);
        }
    }

    pub fn release_status_checks(&self, permits: usize) {
        if let Some(gate) = &self.check_gate {
            gate.add_permits(permits);
        }
    }

    pub fn set_keys(&self, k_a: Vec<u8>, wrap_kb: Vec<u8>) {
        *self.keys.lock().unwrap() = Some(KeyBundle { k_a, wrap_kb });
    }

    pub fn push_sign_response(&self, response: Result<String, ClientError>) {
        self.sign_responses.lock().unwrap().push_back(response);
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn check_calls(&self) -> usize {
        self.check_calls.load(Ordering::SeqCst)
    }

    pub fn sign_calls(&self) -> Vec<(String, String)> {
        self.sign_calls.lock().unwrap().clone()
    }
}

async fn pass(gate: Option<&Semaphore>) {
    if let Some(gate) = gate {
        gate.acquire().await.unwrap().forget();
    }
}

#[async_trait]
impl IdentityClient for MockIdentityClient {
    async fn fetch_keys(&self, _key_fetch_token: &str) -> Result<KeyBundle, ClientError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.keys
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ClientError::InvalidResponse("no keys scripted".to_string()))
    }

    async fn check_email_status(
        &self,
        _session_token: &str,
    ) -> Result<EmailStatus, ClientError> {
        let previous = self.check_calls.fetch_add(1, Ordering::SeqCst);
        pass(self.check_gate.as_ref()).await;
        Ok(EmailStatus {
            verified: previous >= self.unverified_checks,
        })
    }

    async fn sign_certificate(
        &self,
        session_token: &str,
        serialized_public_key: &str,
    ) -> Result<String, ClientError> {
        let call_number = {
            let mut calls = self.sign_calls.lock().unwrap();
            calls.push((session_token.to_string(), serialized_public_key.to_string()));
            calls.len()
        };
        pass(self.sign_gate.as_ref()).await;
        self.sign_responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(format!("cert{call_number}")))
    }
}
