// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process stand-ins for the host OS, the relay and the auth server.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use tokio::sync::oneshot;

use super::deep_link::LinkOpener;
use super::error::{AuthFlowError, OpenError, RelayError};
use super::exchange::ChallengeExchange;
use super::session::{ConnectParams, RelayClient, RelayConnect, SignRequest};
use super::types::{AuthResult, Challenge, RawSession, SessionNamespace};
use crate::auth::encode_ss58;
use crate::config::DEFAULT_CHAIN_ID;
use crate::models::{VerifyRequest, WalletAddress};

/// Records every URL and accepts those matching `accept`.
pub(crate) struct RecordingOpener {
    opened: Mutex<Vec<String>>,
    accept: Box<dyn Fn(&str) -> bool + Send + Sync>,
}

impl RecordingOpener {
    pub(crate) fn accepting(accept: impl Fn(&str) -> bool + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            opened: Mutex::new(Vec::new()),
            accept: Box::new(accept),
        })
    }

    pub(crate) fn attempts(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }
}

impl LinkOpener for RecordingOpener {
    fn open(&self, url: &str) -> Result<(), OpenError> {
        self.opened.lock().unwrap().push(url.to_string());
        if (self.accept)(url) {
            Ok(())
        } else {
            Err(OpenError::NoHandler(url.to_string()))
        }
    }
}

pub(crate) enum SignReply {
    /// Sign the requested message with the relay's sr25519 key.
    Sign,
    Fixed(Value),
    Fail(RelayError),
    /// Never answer.
    Hang,
}

type Answer = Result<RawSession, RelayError>;

/// One pairing proposal. An answer given while nobody is subscribed is
/// kept for the next subscriber.
struct Proposal {
    topic: String,
    waiting: Option<oneshot::Sender<Answer>>,
    answer: Option<Answer>,
}

type Proposals = Arc<Mutex<Vec<Proposal>>>;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Pairing,
    PreApproved,
    ReusedPairing,
}

/// A relay whose wallet holds a real sr25519 key. Answers to proposals are
/// given by the test, one proposal per `connect`, in call order.
pub(crate) struct TestRelay {
    keypair: schnorrkel::Keypair,
    address: String,
    mode: Mode,
    connects: AtomicUsize,
    connect_params: Mutex<Vec<ConnectParams>>,
    proposals: Proposals,
    sign_requests: Mutex<Vec<SignRequest>>,
    sign_reply: Mutex<SignReply>,
}

impl TestRelay {
    /// Every `connect` returns a pairing URI and waits for [`Self::approve`].
    pub(crate) fn pairing() -> Arc<Self> {
        Self::new(Mode::Pairing)
    }

    /// Every `connect` is approved straight away, without a pairing URI.
    pub(crate) fn pre_approved() -> Arc<Self> {
        Self::new(Mode::PreApproved)
    }

    /// Every `connect` reuses a pairing: no URI, and the answer comes from
    /// the test like [`Self::pairing`].
    pub(crate) fn reused_pairing() -> Arc<Self> {
        Self::new(Mode::ReusedPairing)
    }

    fn new(mode: Mode) -> Arc<Self> {
        let keypair = schnorrkel::Keypair::generate();
        let address = encode_ss58(0, &keypair.public.to_bytes());
        Arc::new(Self {
            keypair,
            address,
            mode,
            connects: AtomicUsize::new(0),
            connect_params: Mutex::new(Vec::new()),
            proposals: Arc::new(Mutex::new(Vec::new())),
            sign_requests: Mutex::new(Vec::new()),
            sign_reply: Mutex::new(SignReply::Sign),
        })
    }

    pub(crate) fn address(&self) -> &str {
        &self.address
    }

    pub(crate) fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn last_connect_params(&self) -> Option<ConnectParams> {
        self.connect_params.lock().unwrap().last().cloned()
    }

    pub(crate) fn sign_requests(&self) -> Vec<SignRequest> {
        self.sign_requests.lock().unwrap().clone()
    }

    pub(crate) fn set_sign_reply(&self, reply: SignReply) {
        *self.sign_reply.lock().unwrap() = reply;
    }

    pub(crate) fn sign(&self, message: &str) -> String {
        let signature = self.keypair.sign_simple(b"substrate", message.as_bytes());
        format!("0x{}", hex::encode(signature.to_bytes()))
    }

    /// Whether someone is still waiting on the `index`-th proposal.
    pub(crate) fn is_awaited(&self, index: usize) -> bool {
        self.proposals
            .lock()
            .unwrap()
            .get(index)
            .and_then(|proposal| proposal.waiting.as_ref())
            .is_some_and(|sender| !sender.is_closed())
    }

    /// Approve the `index`-th proposal with this relay's account.
    pub(crate) fn approve(&self, index: usize) {
        let accounts = vec![format!("{DEFAULT_CHAIN_ID}:{}", self.address)];
        self.answer(index, |topic| Ok(session(topic, accounts)));
    }

    pub(crate) fn approve_without_accounts(&self, index: usize) {
        self.answer(index, |topic| Ok(session(topic, Vec::new())));
    }

    pub(crate) fn fail_approval(&self, index: usize, err: RelayError) {
        self.answer(index, |_| Err(err));
    }

    fn answer(&self, index: usize, answer: impl FnOnce(String) -> Answer) {
        let mut proposals = self.proposals.lock().unwrap();
        let Some(proposal) = proposals.get_mut(index) else {
            return;
        };
        let answer = answer(proposal.topic.clone());
        match proposal.waiting.take() {
            Some(sender) => {
                if let Err(answer) = sender.send(answer) {
                    proposal.answer = Some(answer);
                }
            }
            None => proposal.answer = Some(answer),
        }
    }
}

fn subscribe(proposals: &Proposals, index: usize) -> BoxFuture<'static, Answer> {
    let mut proposals = proposals.lock().unwrap();
    let proposal = &mut proposals[index];
    if let Some(answer) = proposal.answer.take() {
        return async move { answer }.boxed();
    }
    let (tx, rx) = oneshot::channel();
    proposal.waiting = Some(tx);
    async move {
        rx.await
            .unwrap_or_else(|_| Err(RelayError::Unavailable("relay dropped".to_string())))
    }
    .boxed()
}

fn session(topic: String, accounts: Vec<String>) -> RawSession {
    let mut namespaces = HashMap::new();
    namespaces.insert(
        "polkadot".to_string(),
        SessionNamespace {
            accounts,
            methods: vec!["polkadot_signMessage".to_string()],
            events: Vec::new(),
        },
    );
    RawSession {
        topic,
        namespaces,
        peer: None,
        expiry: None,
    }
}

impl RelayClient for TestRelay {
    fn connect(&self, params: ConnectParams) -> BoxFuture<'_, Result<RelayConnect, RelayError>> {
        async move {
            let n = self.connects.fetch_add(1, Ordering::SeqCst) + 1;
            self.connect_params.lock().unwrap().push(params);
            let topic = format!("topic-{n}");

            if self.mode == Mode::PreApproved {
                let accounts = vec![format!("{DEFAULT_CHAIN_ID}:{}", self.address)];
                let raw = session(topic, accounts);
                return Ok(RelayConnect {
                    uri: None,
                    approval: Box::new(move || {
                        let raw = raw.clone();
                        async move { Ok::<_, RelayError>(raw) }.boxed()
                    }),
                });
            }

            let index = {
                let mut proposals = self.proposals.lock().unwrap();
                proposals.push(Proposal {
                    topic: topic.clone(),
                    waiting: None,
                    answer: None,
                });
                proposals.len() - 1
            };
            let proposals = Arc::clone(&self.proposals);
            let uri = (self.mode == Mode::Pairing)
                .then(|| format!("wc:{topic}@2?relay-protocol=irn&symKey=00ff"));
            Ok(RelayConnect {
                uri,
                approval: Box::new(move || subscribe(&proposals, index)),
            })
        }
        .boxed()
    }

    fn request(&self, request: SignRequest) -> BoxFuture<'_, Result<Value, RelayError>> {
        async move {
            let message = request.params["message"].as_str().unwrap_or_default().to_string();
            self.sign_requests.lock().unwrap().push(request);
            let reply = match &*self.sign_reply.lock().unwrap() {
                SignReply::Sign => Some(Ok(Value::String(self.sign(&message)))),
                SignReply::Fixed(value) => Some(Ok(value.clone())),
                SignReply::Fail(err) => Some(Err(err.clone())),
                SignReply::Hang => None,
            };
            match reply {
                Some(reply) => reply,
                None => futures::future::pending().await,
            }
        }
        .boxed()
    }
}

/// An auth server that hands out a fixed challenge and records verifies.
pub(crate) struct StubExchange {
    message: String,
    nonce_calls: AtomicUsize,
    nonce_error: Mutex<Option<AuthFlowError>>,
    verify_error: Mutex<Option<AuthFlowError>>,
    verifies: Mutex<Vec<VerifyRequest>>,
}

impl StubExchange {
    pub(crate) fn new(message: &str) -> Arc<Self> {
        Arc::new(Self {
            message: message.to_string(),
            nonce_calls: AtomicUsize::new(0),
            nonce_error: Mutex::new(None),
            verify_error: Mutex::new(None),
            verifies: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn nonce_calls(&self) -> usize {
        self.nonce_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn verifies(&self) -> Vec<VerifyRequest> {
        self.verifies.lock().unwrap().clone()
    }

    pub(crate) fn fail_next_nonce(&self, err: AuthFlowError) {
        *self.nonce_error.lock().unwrap() = Some(err);
    }

    pub(crate) fn fail_next_verify(&self, err: AuthFlowError) {
        *self.verify_error.lock().unwrap() = Some(err);
    }
}

impl ChallengeExchange for StubExchange {
    fn request_nonce(&self, address: WalletAddress) -> BoxFuture<'_, Result<Challenge, AuthFlowError>> {
        async move {
            self.nonce_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(err) = self.nonce_error.lock().unwrap().take() {
                return Err(err);
            }
            Ok(Challenge {
                nonce: "abc123".to_string(),
                message_to_sign: self.message.clone(),
                bound_address: address,
                expires_at: None,
            })
        }
        .boxed()
    }

    fn verify(&self, payload: VerifyRequest) -> BoxFuture<'_, Result<AuthResult, AuthFlowError>> {
        async move {
            let address = payload.address.clone();
            self.verifies.lock().unwrap().push(payload);
            if let Some(err) = self.verify_error.lock().unwrap().take() {
                return Err(err);
            }
            Ok(AuthResult {
                token: "jwt-token".to_string(),
                token_type: "bearer".to_string(),
                wallet_address: Some(address),
                expires_at: None,
            })
        }
        .boxed()
    }
}
