// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-memory store of issued login challenges.
//!
//! Challenges are keyed by nonce in a bounded LRU and indexed by address so
//! that requesting a new nonce discards the previous one for that address.
//! A challenge leaves the store when it is consumed by a successful
//! verification, replaced, evicted, expired, or purged by the sweeper.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use lru::LruCache;
use ring::rand::{SecureRandom, SystemRandom};

use super::error::ChallengeError;
use crate::models::{NonceResponse, WalletAddress};

/// Nonce length in bytes (hex-encoded to 32 characters).
const NONCE_BYTES: usize = 16;

/// A challenge handed out to a wallet address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedChallenge {
    pub nonce: String,
    pub message_to_sign: String,
    pub address: WalletAddress,
    pub expires_at: DateTime<Utc>,
}

impl IssuedChallenge {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

impl From<IssuedChallenge> for NonceResponse {
    fn from(challenge: IssuedChallenge) -> Self {
        NonceResponse {
            nonce: challenge.nonce,
            message_to_sign: challenge.message_to_sign,
            wallet_address: challenge.address,
            expires_at: Some(challenge.expires_at),
        }
    }
}

struct StoreInner {
    by_nonce: LruCache<String, IssuedChallenge>,
    by_address: HashMap<WalletAddress, String>,
}

impl StoreInner {
    fn remove_nonce(&mut self, nonce: &str) -> Option<IssuedChallenge> {
        let removed = self.by_nonce.pop(nonce)?;
        if self.by_address.get(&removed.address).map(String::as_str) == Some(nonce) {
            self.by_address.remove(&removed.address);
        }
        Some(removed)
    }
}

pub struct ChallengeStore {
    inner: Mutex<StoreInner>,
    ttl: chrono::Duration,
    prefix: String,
    rng: SystemRandom,
}

impl ChallengeStore {
    /// Create a store holding at most `capacity` live challenges.
    pub fn new(capacity: usize, ttl: Duration, prefix: impl Into<String>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(StoreInner {
                by_nonce: LruCache::new(capacity),
                by_address: HashMap::new(),
            }),
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::minutes(5)),
            prefix: prefix.into(),
            rng: SystemRandom::new(),
        }
    }

    pub fn issue(&self, address: &WalletAddress) -> Result<IssuedChallenge, ChallengeError> {
        self.issue_at(address, Utc::now())
    }

    /// Issue a fresh challenge for `address`, replacing any live one.
    pub fn issue_at(
        &self,
        address: &WalletAddress,
        now: DateTime<Utc>,
    ) -> Result<IssuedChallenge, ChallengeError> {
        let nonce = self.generate_nonce()?;
        let challenge = IssuedChallenge {
            message_to_sign: format!("{}{}", self.prefix, nonce),
            nonce: nonce.clone(),
            address: address.clone(),
            expires_at: now + self.ttl,
        };

        let mut inner = self.lock()?;
        if let Some(previous) = inner.by_address.insert(address.clone(), nonce.clone()) {
            inner.by_nonce.pop(&previous);
        }
        if let Some((evicted_nonce, evicted)) = inner.by_nonce.push(nonce, challenge.clone()) {
            if evicted_nonce != challenge.nonce
                && inner.by_address.get(&evicted.address) == Some(&evicted_nonce)
            {
                inner.by_address.remove(&evicted.address);
            }
        }

        Ok(challenge)
    }

    pub fn lookup(&self, message: &str) -> Result<IssuedChallenge, ChallengeError> {
        self.lookup_at(message, Utc::now())
    }

    /// Find the live challenge whose `message_to_sign` is exactly `message`.
    ///
    /// Expired challenges are removed and reported as stale.
    pub fn lookup_at(
        &self,
        message: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedChallenge, ChallengeError> {
        let nonce = message
            .strip_prefix(self.prefix.as_str())
            .ok_or(ChallengeError::StaleNonce)?;

        let mut inner = self.lock()?;
        let challenge = inner
            .by_nonce
            .peek(nonce)
            .cloned()
            .ok_or(ChallengeError::StaleNonce)?;

        if challenge.message_to_sign != message {
            return Err(ChallengeError::StaleNonce);
        }
        if challenge.is_expired(now) {
            inner.remove_nonce(nonce);
            return Err(ChallengeError::StaleNonce);
        }

        Ok(challenge)
    }

    /// Remove a challenge after successful verification.
    ///
    /// Returns `false` if another request consumed it first.
    pub fn consume(&self, nonce: &str) -> bool {
        match self.inner.lock() {
            Ok(mut inner) => inner.remove_nonce(nonce).is_some(),
            Err(_) => false,
        }
    }

    /// Drop every expired challenge. Returns how many were removed.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let Ok(mut inner) = self.inner.lock() else {
            return 0;
        };
        let expired: Vec<String> = inner
            .by_nonce
            .iter()
            .filter(|(_, challenge)| challenge.is_expired(now))
            .map(|(nonce, _)| nonce.clone())
            .collect();
        for nonce in &expired {
            inner.remove_nonce(nonce);
        }
        expired.len()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|inner| inner.by_nonce.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn generate_nonce(&self) -> Result<String, ChallengeError> {
        let mut bytes = [0u8; NONCE_BYTES];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| ChallengeError::Internal("system randomness unavailable".to_string()))?;
        Ok(hex::encode(bytes))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, StoreInner>, ChallengeError> {
        self.inner
            .lock()
            .map_err(|_| ChallengeError::Internal("challenge store poisoned".to_string()))
    }
}
