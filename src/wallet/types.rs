// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Data carried through the client-side sign-in flow.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::AuthFlowError;
use crate::config::chain_namespace;
use crate::models::{NonceResponse, VerifyResponse, WalletAddress};

/// A pairing offer waiting for the wallet to approve it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingRequest {
    pub pairing_uri: String,
    pub created_at: DateTime<Utc>,
}

impl PairingRequest {
    pub fn new(pairing_uri: impl Into<String>) -> Self {
        Self {
            pairing_uri: pairing_uri.into(),
            created_at: Utc::now(),
        }
    }
}

/// Per-namespace grant in an approved session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionNamespace {
    /// CAIP-10 accounts, `namespace:reference:address`.
    #[serde(default)]
    pub accounts: Vec<String>,
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(default)]
    pub events: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerMetadata {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub icons: Vec<String>,
}

/// Session record as returned by the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSession {
    pub topic: String,
    #[serde(default)]
    pub namespaces: HashMap<String, SessionNamespace>,
    #[serde(default)]
    pub peer: Option<PeerMetadata>,
    /// Unix seconds.
    #[serde(default)]
    pub expiry: Option<i64>,
}

/// An approved, address-bound wallet session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub topic: String,
    pub address: WalletAddress,
    pub raw: RawSession,
}

impl Session {
    /// Bind a raw session to the first usable account on `chain_id`.
    ///
    /// Accounts on the requested chain are preferred; any account in the
    /// same namespace is accepted otherwise.
    pub fn from_raw(raw: RawSession, chain_id: &str) -> Result<Self, AuthFlowError> {
        let namespace = chain_namespace(chain_id);
        let no_account = || AuthFlowError::NoAccountReturned {
            namespace: namespace.to_string(),
        };

        let accounts = raw
            .namespaces
            .get(namespace)
            .map(|ns| ns.accounts.as_slice())
            .unwrap_or_default();

        let on_chain = accounts.iter().find_map(|account| {
            let (chain, address) = account.rsplit_once(':')?;
            (chain == chain_id && !address.is_empty()).then_some(address)
        });
        let in_namespace = || {
            accounts.iter().find_map(|account| {
                let mut parts = account.splitn(3, ':');
                let ns = parts.next()?;
                let _reference = parts.next()?;
                let address = parts.next()?;
                (ns == namespace && !address.is_empty()).then_some(address)
            })
        };

        let address = on_chain.or_else(in_namespace).ok_or_else(no_account)?;

        Ok(Self {
            topic: raw.topic.clone(),
            address: WalletAddress::from(address),
            raw,
        })
    }
}

/// A server-issued login challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub nonce: String,
    /// Signed and verified exactly as received.
    pub message_to_sign: String,
    pub bound_address: WalletAddress,
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<NonceResponse> for Challenge {
    fn from(response: NonceResponse) -> Self {
        Self {
            nonce: response.nonce,
            message_to_sign: response.message_to_sign,
            bound_address: response.wallet_address,
            expires_at: response.expires_at,
        }
    }
}

/// Terminal result of a successful sign-in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResult {
    pub token: String,
    pub token_type: String,
    pub wallet_address: Option<WalletAddress>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<VerifyResponse> for AuthResult {
    fn from(response: VerifyResponse) -> Self {
        Self {
            token: response.token,
            token_type: response.token_type,
            wallet_address: response.wallet_address,
            expires_at: response.expires_at,
        }
    }
}

/// Where the coordinator is in the sign-in flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthStep {
    #[default]
    Idle,
    Connecting,
    AwaitingApproval,
    Connected,
    NoncePending,
    Signing,
    Verifying,
    Authenticated,
}

impl AuthStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthStep::Idle => "idle",
            AuthStep::Connecting => "connecting",
            AuthStep::AwaitingApproval => "awaiting_approval",
            AuthStep::Connected => "connected",
            AuthStep::NoncePending => "nonce_pending",
            AuthStep::Signing => "signing",
            AuthStep::Verifying => "verifying",
            AuthStep::Authenticated => "authenticated",
        }
    }
}

impl std::fmt::Display for AuthStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the UI observes of the coordinator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoordinatorSnapshot {
    pub step: AuthStep,
    /// Present while a pairing is awaiting approval, for QR rendering.
    pub pairing_uri: Option<String>,
    pub address: Option<WalletAddress>,
    pub last_error: Option<AuthFlowError>,
}
