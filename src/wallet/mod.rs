// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Wallet Sign-In Client
//!
//! Client half of wallet sign-in, embedded in the host app.
//!
//! ## Flow
//!
//! 1. [`ConnectionCoordinator::connect`] proposes a relay session and hands
//!    the pairing URI to the wallet through a [`DeepLinkResolver`]
//! 2. The user approves in the wallet; the host app reports the return via
//!    [`HostEvent`]s
//! 3. The coordinator commits the session once and fetches a login challenge
//! 4. [`ConnectionCoordinator::sign`] has the wallet sign the challenge text
//!    verbatim while a [`ForegroundNudger`] keeps the wallet in front
//! 5. The signature is exchanged for a bearer token
//!
//! ## Host Integration
//!
//! The host supplies a [`RelayClient`] factory and a [`LinkOpener`]; both
//! are traits so the flow runs against in-process fakes in tests.

pub mod coordinator;
pub mod deep_link;
pub mod error;
pub mod exchange;
pub mod nudger;
pub mod session;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use coordinator::{ConnectionCoordinator, HostEvent};
pub use deep_link::{DeepLinkResolver, LinkOpener, OpenOutcome, Platform, WalletProfile};
pub use error::{AuthFlowError, OpenError, RelayError};
pub use exchange::{ChallengeExchange, HttpChallengeExchange};
pub use nudger::{ForegroundNudger, NudgeGuard};
pub use session::{
    ApprovalSubscribe, ApprovalWaiter, ConnectOutcome, ConnectParams, RelayClient, RelayConnect,
    RelayFactory, RequiredNamespace, SessionClient, SignRequest,
};
pub use types::{
    AuthResult, AuthStep, Challenge, CoordinatorSnapshot, PairingRequest, RawSession, Session,
    SessionNamespace,
};
