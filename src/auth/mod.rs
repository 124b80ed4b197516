// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Authentication Module
//!
//! Server side of wallet sign-in.
//!
//! ## Auth Flow
//!
//! 1. Client posts its SS58 address to `/v1/auth/nonce`
//! 2. Server issues a single-use challenge (`message_to_sign`) bound to the
//!    address, valid for `NONCE_TTL_SECS`
//! 3. The wallet signs the exact challenge text
//! 4. Client posts `{address, message, signature}` to `/v1/auth/verify`
//! 5. Server:
//!    - Finds the live challenge for the message (else `stale_nonce`)
//!    - Checks the bound address (else `address_mismatch`)
//!    - Verifies the signature for sr25519 / ed25519 / ecdsa accounts
//!    - Consumes the nonce and returns an HS256 bearer token
//!
//! ## Security
//!
//! - Nonces come from the system CSPRNG and are single-use
//! - A new nonce for an address invalidates the previous one
//! - The signed message is compared byte-for-byte; nothing is trimmed
//! - Clock skew tolerance for bearer tokens is 60 seconds

pub mod challenge;
pub mod error;
pub mod extractor;
pub mod signature;
pub mod sweeper;
pub mod token;

pub use challenge::{ChallengeStore, IssuedChallenge};
pub use error::{AuthError, ChallengeError};
pub use extractor::Auth;
pub use signature::{decode_ss58, encode_ss58, verify_wallet_signature, KeyScheme};
pub use sweeper::ChallengeSweeper;
pub use token::{IssuedToken, TokenIssuer};
