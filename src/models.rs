// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies exchanged between the sign-in client and the
//! nonce/verify service. Both sides use these types, so the JSON shape is
//! defined once.
//!
//! ## Wallet Address Type
//!
//! The [`WalletAddress`] newtype wraps an SS58-encoded account address
//! (e.g. `5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY`). It is kept
//! exactly as received; no case folding or trimming is applied.
//!
//! ## Field Aliases
//!
//! Older mobile builds send `wallet_address` and `signed_message`; these
//! are accepted as aliases of `address` and `message`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// =============================================================================
// Wallet Address Type
// =============================================================================

/// SS58 wallet address wrapper.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WalletAddress(pub String);

impl WalletAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for WalletAddress {
    fn from(value: String) -> Self {
        WalletAddress(value)
    }
}

impl From<&str> for WalletAddress {
    fn from(value: &str) -> Self {
        WalletAddress(value.to_string())
    }
}

impl From<WalletAddress> for String {
    fn from(value: WalletAddress) -> Self {
        value.0
    }
}

// =============================================================================
// Challenge Models
// =============================================================================

/// Request a one-time login challenge for an address.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NonceRequest {
    /// The account that will sign the challenge.
    #[serde(alias = "wallet_address")]
    pub address: WalletAddress,
}

/// A freshly issued login challenge.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct NonceResponse {
    /// Single-use nonce (32 hex characters).
    pub nonce: String,
    /// Exact text the wallet must sign. Must not be altered by the client.
    pub message_to_sign: String,
    /// The address this challenge is bound to.
    pub wallet_address: WalletAddress,
    /// When the challenge stops being accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Submit a signed challenge.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VerifyRequest {
    /// Address that produced the signature.
    #[serde(alias = "wallet_address")]
    pub address: WalletAddress,
    /// The signed text, byte-identical to `message_to_sign`.
    #[serde(alias = "signed_message")]
    pub message: String,
    /// Hex signature, `0x`-prefixed.
    pub signature: String,
}

/// Bearer token issued after a successful verification.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct VerifyResponse {
    /// Opaque bearer credential.
    #[serde(alias = "access_token")]
    pub token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<WalletAddress>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

/// The caller's authenticated session, as seen by the server.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct SessionInfo {
    pub wallet_address: WalletAddress,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
