// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! BidDrop Wallet Sign-In
//!
//! Wallet-connection and challenge-response sign-in for SS58 accounts.
//!
//! ## Modules
//!
//! - `wallet` - Client-side pairing, approval and signing coordinator
//! - `api` - HTTP API handlers for the nonce/verify service (Axum)
//! - `auth` - Challenge store, signature verification and bearer tokens
//! - `config` - Environment configuration for both halves

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod state;
pub mod wallet;
