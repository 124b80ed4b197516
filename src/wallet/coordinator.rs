// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Connection Coordinator
//!
//! Drives one wallet sign-in from pairing to bearer token:
//!
//! ```text
//! Idle -> Connecting -> AwaitingApproval -> NoncePending -> Connected
//!                    \-> NoncePending  (pre-approved)
//! Connected -> Signing -> Verifying -> Authenticated
//! ```
//!
//! ## Resuming after approval
//!
//! The user approves in the wallet app, and the host app learns about it
//! from either an app-foreground event or a deep link back to the return
//! URL, sometimes both at once. Both land in [`ConnectionCoordinator::finalize_approval`],
//! which commits the session at most once per attempt:
//!
//! - each `connect()` gets a new attempt id and its own single-flight latch
//! - a resolution is only committed while its attempt id is still current
//! - every caller awaits the same shared approval future
//! - a new `connect()` cancels whatever is still waiting on the old attempt
//!
//! A wallet that has not answered yet is asked again on the next trigger.
//! Any other approval failure is recorded and shown.
//!
//! ## Locking
//!
//! Flow state lives behind a `tokio::sync::RwLock` that is never held across
//! a relay or HTTP call. The UI reads it through [`CoordinatorSnapshot`]s
//! published on a `watch` channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, watch, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use super::deep_link::{DeepLinkResolver, LinkOpener};
use super::error::AuthFlowError;
use super::exchange::{ChallengeExchange, HttpChallengeExchange};
use super::nudger::ForegroundNudger;
use super::session::{ApprovalWaiter, ConnectOutcome, RelayFactory, SessionClient};
use super::types::{AuthResult, AuthStep, Challenge, CoordinatorSnapshot, PairingRequest, Session};
use crate::config::WalletAuthConfig;
use crate::models::VerifyRequest;

/// Signals from the host OS that the user may be back from the wallet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Foreground,
    DeepLink(String),
}

#[derive(Clone)]
struct PendingApproval {
    waiter: ApprovalWaiter,
    finalizing: Arc<AtomicBool>,
    abandoned: CancellationToken,
}

/// Releases a finalize latch when the holder finishes or is dropped.
struct LatchRelease(Arc<AtomicBool>);

impl Drop for LatchRelease {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Puts the flow back to `Connected` when a `sign()` call is dropped
/// before it settles.
struct SigningRelease {
    coordinator: Arc<ConnectionCoordinator>,
    attempt: u64,
    settled: bool,
}

impl SigningRelease {
    fn settle(mut self) {
        self.settled = true;
    }
}

impl Drop for SigningRelease {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let attempt = self.attempt;
        if let Ok(mut state) = self.coordinator.state.try_write() {
            self.coordinator.abandon_signing(&mut state, attempt);
            return;
        }
        let coordinator = Arc::clone(&self.coordinator);
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                let mut state = coordinator.state.write().await;
                coordinator.abandon_signing(&mut state, attempt);
            });
        }
    }
}

#[derive(Default)]
struct FlowState {
    attempt: u64,
    step: AuthStep,
    signing: bool,
    pairing: Option<PairingRequest>,
    pending: Option<PendingApproval>,
    session: Option<Session>,
    challenge: Option<Challenge>,
    result: Option<AuthResult>,
    last_error: Option<AuthFlowError>,
}

impl FlowState {
    fn snapshot(&self) -> CoordinatorSnapshot {
        CoordinatorSnapshot {
            step: self.step,
            pairing_uri: self.pairing.as_ref().map(|p| p.pairing_uri.clone()),
            address: self.session.as_ref().map(|s| s.address.clone()),
            last_error: self.last_error.clone(),
        }
    }
}

pub struct ConnectionCoordinator {
    sessions: Arc<SessionClient>,
    exchange: Arc<dyn ChallengeExchange>,
    resolver: DeepLinkResolver,
    nudger: ForegroundNudger,
    return_url: String,
    state: RwLock<FlowState>,
    snapshots: watch::Sender<CoordinatorSnapshot>,
}

impl ConnectionCoordinator {
    pub fn new(
        config: &WalletAuthConfig,
        sessions: Arc<SessionClient>,
        exchange: Arc<dyn ChallengeExchange>,
        resolver: DeepLinkResolver,
    ) -> Arc<Self> {
        let nudger = ForegroundNudger::new(resolver.clone(), config.nudge_delays.clone());
        let (snapshots, _) = watch::channel(CoordinatorSnapshot::default());

        Arc::new(Self {
            sessions,
            exchange,
            resolver,
            nudger,
            return_url: config.return_url.clone(),
            state: RwLock::new(FlowState::default()),
            snapshots,
        })
    }

    /// Wire up the HTTP exchange and deep-link resolver from configuration.
    pub fn from_config(
        config: &WalletAuthConfig,
        relay: RelayFactory,
        opener: Arc<dyn LinkOpener>,
    ) -> Result<Arc<Self>, AuthFlowError> {
        let sessions = Arc::new(SessionClient::new(config, relay));
        let exchange = Arc::new(HttpChallengeExchange::from_config(config)?);
        let resolver = DeepLinkResolver::new(opener, config.return_url.clone());
        Ok(Self::new(config, sessions, exchange, resolver))
    }

    pub fn snapshot(&self) -> CoordinatorSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CoordinatorSnapshot> {
        self.snapshots.subscribe()
    }

    pub async fn session(&self) -> Option<Session> {
        self.state.read().await.session.clone()
    }

    pub async fn challenge(&self) -> Option<Challenge> {
        self.state.read().await.challenge.clone()
    }

    /// Hand the issued token to the caller. Returns `None` once taken.
    pub async fn take_auth_result(&self) -> Option<AuthResult> {
        self.state.write().await.result.take()
    }

    fn publish(&self, state: &FlowState) {
        self.snapshots.send_replace(state.snapshot());
    }

    /// Start a fresh connection attempt, abandoning any previous one.
    pub async fn connect(self: &Arc<Self>) -> Result<(), AuthFlowError> {
        let attempt = {
            let mut state = self.state.write().await;
            let attempt = state.attempt.saturating_add(1);
            if let Some(previous) = &state.pending {
                previous.abandoned.cancel();
            }
            *state = FlowState {
                attempt,
                step: AuthStep::Connecting,
                ..FlowState::default()
            };
            self.publish(&state);
            attempt
        };
        info!(attempt, "starting wallet connection");

        let outcome = match self.sessions.connect().await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(attempt, error = %err, "wallet connection failed");
                let mut state = self.state.write().await;
                if state.attempt == attempt {
                    state.step = AuthStep::Idle;
                    state.last_error = Some(err.clone());
                    self.publish(&state);
                }
                return Err(err);
            }
        };

        match outcome {
            ConnectOutcome::Approved(session) => {
                if self.commit_session(attempt, session).await {
                    let _ = self.request_nonce().await;
                }
            }
            ConnectOutcome::NeedsApproval { pairing, waiter } => {
                {
                    let mut state = self.state.write().await;
                    if state.attempt != attempt {
                        debug!(attempt, "connection attempt superseded before pairing");
                        return Ok(());
                    }
                    state.pairing = pairing.clone();
                    state.pending = Some(PendingApproval {
                        waiter: waiter.for_attempt(attempt),
                        finalizing: Arc::new(AtomicBool::new(false)),
                        abandoned: CancellationToken::new(),
                    });
                    state.step = AuthStep::AwaitingApproval;
                    self.publish(&state);
                }

                if let Some(pairing) = &pairing {
                    let opened = self.resolver.attempt_open(&pairing.pairing_uri);
                    debug!(attempt, ?opened, "pairing handed to wallet");
                }

                let coordinator = Arc::clone(self);
                tokio::spawn(async move {
                    if let Err(err) = coordinator.finalize_approval().await {
                        debug!(error = %err, "approval did not complete");
                    }
                });
            }
        }

        Ok(())
    }

    /// Resolve the pending approval into a session, at most once per
    /// attempt. Returns `Ok(true)` only for the call that committed.
    pub async fn finalize_approval(&self) -> Result<bool, AuthFlowError> {
        let pending = match &self.state.read().await.pending {
            Some(pending) => pending.clone(),
            None => return Ok(false),
        };

        if pending.finalizing.swap(true, Ordering::AcqRel) {
            debug!(attempt = pending.waiter.attempt(), "finalize already in flight");
            return Ok(false);
        }
        let _release = LatchRelease(Arc::clone(&pending.finalizing));

        let attempt = pending.waiter.attempt();
        let resolution = tokio::select! {
            biased;
            _ = pending.abandoned.cancelled() => {
                debug!(attempt, "connection attempt abandoned");
                return Ok(false);
            }
            resolution = pending.waiter.wait() => resolution,
        };

        {
            let mut state = self.state.write().await;
            if state.attempt != attempt {
                debug!(attempt, current = state.attempt, "discarding stale approval");
                return Ok(false);
            }

            match resolution {
                Ok(session) => {
                    if state.session.is_some() {
                        return Ok(false);
                    }
                    info!(attempt, address = %session.address, "wallet approved session");
                    state.session = Some(session);
                    state.pairing = None;
                    state.pending = None;
                    state.last_error = None;
                    state.step = AuthStep::NoncePending;
                    self.publish(&state);
                }
                Err(AuthFlowError::ApprovalPending) => {
                    debug!(attempt, "approval still pending");
                    return Ok(false);
                }
                Err(err) => {
                    warn!(attempt, error = %err, "wallet approval failed");
                    state.last_error = Some(err.clone());
                    self.publish(&state);
                    return Err(err);
                }
            }
        }

        let _ = self.request_nonce().await;
        Ok(true)
    }

    pub async fn on_app_foreground(&self) -> Result<bool, AuthFlowError> {
        self.finalize_approval().await
    }

    /// Deep links that do not target the configured return URL are ignored.
    pub async fn on_deep_link(&self, url: &str) -> Result<bool, AuthFlowError> {
        if !self.targets_return_url(url) {
            debug!("ignoring deep link for another route");
            return Ok(false);
        }
        self.finalize_approval().await
    }

    /// Route host events into the coordinator until the channel closes or
    /// `shutdown` fires.
    pub async fn run_host_events(
        self: Arc<Self>,
        mut events: mpsc::Receiver<HostEvent>,
        shutdown: CancellationToken,
    ) {
        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };

            let result = match &event {
                HostEvent::Foreground => self.on_app_foreground().await,
                HostEvent::DeepLink(url) => self.on_deep_link(url).await,
            };
            match result {
                Ok(committed) => debug!(?event, committed, "host event handled"),
                Err(err) => debug!(error = %err, "host event did not finalize approval"),
            }
        }
        debug!("host event loop stopped");
    }

    /// Fetch a login challenge for the connected address. Safe to retry.
    pub async fn request_nonce(&self) -> Result<Challenge, AuthFlowError> {
        let (attempt, address) = {
            let mut state = self.state.write().await;
            if state.signing {
                return Err(AuthFlowError::PreconditionFailed("signing in progress"));
            }
            let Some(session) = &state.session else {
                return Err(AuthFlowError::PreconditionFailed("no wallet session"));
            };
            let address = session.address.clone();
            state.step = AuthStep::NoncePending;
            self.publish(&state);
            (state.attempt, address)
        };

        let result = self.exchange.request_nonce(address).await;

        let mut state = self.state.write().await;
        let live = state.attempt == attempt;
        match &result {
            Ok(challenge) if live => {
                debug!(attempt, nonce = %challenge.nonce, "login challenge received");
                state.challenge = Some(challenge.clone());
                state.last_error = None;
                state.step = AuthStep::Connected;
                self.publish(&state);
            }
            Err(err) if live => {
                warn!(attempt, error = %err, "nonce request failed");
                state.last_error = Some(err.clone());
                self.publish(&state);
            }
            _ => debug!(attempt, "discarding nonce for superseded attempt"),
        }
        result
    }

    /// Have the wallet sign the current challenge and exchange the signature
    /// for a bearer token.
    pub async fn sign(self: &Arc<Self>) -> Result<AuthResult, AuthFlowError> {
        let (attempt, session, challenge) = {
            let mut state = self.state.write().await;
            if state.signing {
                return Err(AuthFlowError::PreconditionFailed("signing already in progress"));
            }
            let Some(session) = state.session.clone() else {
                return Err(AuthFlowError::PreconditionFailed("no wallet session"));
            };
            let Some(challenge) = state.challenge.clone() else {
                return Err(AuthFlowError::PreconditionFailed("no login challenge"));
            };
            state.signing = true;
            state.step = AuthStep::Signing;
            state.last_error = None;
            self.publish(&state);
            (state.attempt, session, challenge)
        };
        let release = SigningRelease {
            coordinator: Arc::clone(self),
            attempt,
            settled: false,
        };

        let signed = {
            let nudge = self.nudger.arm();
            let signed = self
                .sessions
                .request_signature(&session.topic, &session.address, &challenge.message_to_sign)
                .await;
            nudge.disarm();
            signed
        };
        let signature = match signed {
            Ok(signature) => signature,
            Err(err) => {
                warn!(attempt, error = %err, "signing request failed");
                self.fall_back_to_connected(attempt, &err).await;
                release.settle();
                return Err(err);
            }
        };

        self.set_step(attempt, AuthStep::Verifying).await;
        let payload = VerifyRequest {
            address: session.address.clone(),
            message: challenge.message_to_sign.clone(),
            signature,
        };

        match self.exchange.verify(payload).await {
            Ok(result) => {
                let mut state = self.state.write().await;
                if state.attempt == attempt {
                    state.result = Some(result.clone());
                    state.challenge = None;
                    state.signing = false;
                    state.step = AuthStep::Authenticated;
                    self.publish(&state);
                }
                drop(state);
                release.settle();
                info!(attempt, address = %session.address, "wallet sign-in complete");
                Ok(result)
            }
            Err(err) => {
                warn!(attempt, error = %err, "signature verification failed");
                self.fall_back_to_connected(attempt, &err).await;
                release.settle();
                Err(err)
            }
        }
    }

    async fn commit_session(&self, attempt: u64, session: Session) -> bool {
        let mut state = self.state.write().await;
        if state.attempt != attempt || state.session.is_some() {
            return false;
        }
        info!(attempt, address = %session.address, "wallet session ready");
        state.session = Some(session);
        state.pairing = None;
        state.pending = None;
        state.step = AuthStep::NoncePending;
        self.publish(&state);
        true
    }

    async fn set_step(&self, attempt: u64, step: AuthStep) {
        let mut state = self.state.write().await;
        if state.attempt == attempt {
            state.step = step;
            self.publish(&state);
        }
    }

    async fn fall_back_to_connected(&self, attempt: u64, err: &AuthFlowError) {
        let mut state = self.state.write().await;
        if state.attempt == attempt {
            state.signing = false;
            state.step = AuthStep::Connected;
            state.last_error = Some(err.clone());
            self.publish(&state);
        }
    }

    fn abandon_signing(&self, state: &mut FlowState, attempt: u64) {
        if state.attempt == attempt && state.signing {
            debug!(attempt, "signing abandoned by caller");
            state.signing = false;
            state.step = AuthStep::Connected;
            self.publish(state);
        }
    }

    fn targets_return_url(&self, incoming: &str) -> bool {
        match (Url::parse(incoming), Url::parse(&self.return_url)) {
            (Ok(incoming), Ok(expected)) => {
                incoming.scheme() == expected.scheme()
                    && incoming.host_str() == expected.host_str()
                    && incoming.path().trim_end_matches('/') == expected.path().trim_end_matches('/')
            }
            _ => false,
        }
    }
}
