// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Relay Session Client
//!
//! Owns the process-wide relay connection and turns its pairing and
//! request primitives into the two things the sign-in flow needs: an
//! address-bound [`Session`] and a hex signature over a login challenge.
//!
//! The relay client is built lazily by a factory the first time it is
//! needed and reused afterwards. There is no teardown.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use super::error::{AuthFlowError, RelayError};
use super::types::{PairingRequest, RawSession, Session};
use crate::config::{chain_namespace, AppMetadata, WalletAuthConfig};
use crate::models::WalletAddress;

/// Namespace requirements sent with a pairing proposal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequiredNamespace {
    pub chains: Vec<String>,
    pub methods: Vec<String>,
    pub events: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ConnectParams {
    pub project_id: String,
    pub metadata: AppMetadata,
    pub required_namespaces: HashMap<String, RequiredNamespace>,
}

/// Subscribes to the wallet's answer to a proposal. Each call starts a
/// fresh wait; `NotYetApproved` means the relay has nothing to report yet
/// and may be asked again.
pub type ApprovalSubscribe =
    Box<dyn Fn() -> BoxFuture<'static, Result<RawSession, RelayError>> + Send + Sync>;

/// Result of proposing a session to the relay.
pub struct RelayConnect {
    /// Pairing URI for the wallet; `None` when an existing pairing was
    /// reused and approval is already on its way.
    pub uri: Option<String>,
    pub approval: ApprovalSubscribe,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignRequest {
    pub topic: String,
    pub chain_id: String,
    pub method: String,
    pub params: Value,
}

/// The pairing/relay protocol client.
pub trait RelayClient: Send + Sync {
    fn connect(&self, params: ConnectParams) -> BoxFuture<'_, Result<RelayConnect, RelayError>>;

    fn request(&self, request: SignRequest) -> BoxFuture<'_, Result<Value, RelayError>>;
}

pub type RelayFactory =
    Box<dyn Fn() -> BoxFuture<'static, Result<Arc<dyn RelayClient>, RelayError>> + Send + Sync>;

type SessionFuture = BoxFuture<'static, Result<Session, AuthFlowError>>;

struct WaiterInner {
    subscribe: Box<dyn Fn() -> SessionFuture + Send + Sync>,
    current: Mutex<Shared<SessionFuture>>,
}

/// Cloneable handle on a pending approval. Every clone observes the same
/// resolution. Terminal answers are kept; after `ApprovalPending` the next
/// `wait` subscribes to the relay again.
#[derive(Clone)]
pub struct ApprovalWaiter {
    attempt: u64,
    inner: Arc<WaiterInner>,
}

impl ApprovalWaiter {
    pub fn new<F, Fut>(subscribe: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Session, AuthFlowError>> + Send + 'static,
    {
        let subscribe: Box<dyn Fn() -> SessionFuture + Send + Sync> =
            Box::new(move || subscribe().boxed());
        let current = Mutex::new(subscribe().shared());
        Self {
            attempt: 0,
            inner: Arc::new(WaiterInner { subscribe, current }),
        }
    }

    pub fn for_attempt(mut self, attempt: u64) -> Self {
        self.attempt = attempt;
        self
    }

    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    pub async fn wait(&self) -> Result<Session, AuthFlowError> {
        let current = self.current().clone();
        let resolution = current.clone().await;

        if matches!(resolution, Err(AuthFlowError::ApprovalPending)) {
            let mut slot = self.current();
            if slot.ptr_eq(&current) {
                debug!(attempt = self.attempt, "approval not reported yet, resubscribing");
                *slot = (self.inner.subscribe)().shared();
            }
        }
        resolution
    }

    fn current(&self) -> MutexGuard<'_, Shared<SessionFuture>> {
        self.inner.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ApprovalWaiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApprovalWaiter")
            .field("attempt", &self.attempt)
            .field("resolved", &self.current().peek().is_some())
            .finish()
    }
}

#[derive(Debug)]
pub enum ConnectOutcome {
    Approved(Session),
    /// The wallet has not answered yet. `pairing` is `None` when an
    /// existing pairing was reused and there is nothing to hand over.
    NeedsApproval {
        pairing: Option<PairingRequest>,
        waiter: ApprovalWaiter,
    },
}

pub struct SessionClient {
    factory: RelayFactory,
    client: OnceCell<Arc<dyn RelayClient>>,
    project_id: String,
    chain_id: String,
    sign_method: String,
    metadata: AppMetadata,
}

impl SessionClient {
    pub fn new(config: &WalletAuthConfig, factory: RelayFactory) -> Self {
        Self {
            factory,
            client: OnceCell::new(),
            project_id: config.project_id.clone(),
            chain_id: config.chain_id.clone(),
            sign_method: config.sign_method.clone(),
            metadata: config.metadata.clone(),
        }
    }

    /// Use an already constructed relay client.
    pub fn with_client(config: &WalletAuthConfig, client: Arc<dyn RelayClient>) -> Self {
        Self::new(
            config,
            Box::new(move || {
                let client = Arc::clone(&client);
                async move { Ok::<_, RelayError>(client) }.boxed()
            }),
        )
    }

    /// The shared relay client, constructing it on first use.
    pub async fn get_client(&self) -> Result<Arc<dyn RelayClient>, RelayError> {
        self.client
            .get_or_try_init(|| {
                debug!("initialising relay client");
                (self.factory)()
            })
            .await
            .map(Arc::clone)
    }

    /// Propose a session for the configured chain.
    pub async fn connect(&self) -> Result<ConnectOutcome, AuthFlowError> {
        let client = self
            .get_client()
            .await
            .map_err(|e| AuthFlowError::ConnectionFailed(e.to_string()))?;

        let RelayConnect { uri, approval } = client
            .connect(self.connect_params())
            .await
            .map_err(|e| AuthFlowError::ConnectionFailed(e.to_string()))?;

        let chain_id = self.chain_id.clone();
        let waiter = ApprovalWaiter::new(move || {
            let answer = approval();
            let chain_id = chain_id.clone();
            async move {
                let raw = answer.await.map_err(AuthFlowError::from_approval)?;
                Session::from_raw(raw, &chain_id)
            }
        });

        match uri.filter(|uri| !uri.trim().is_empty()) {
            Some(uri) => {
                info!(chain = %self.chain_id, "pairing proposal created");
                Ok(ConnectOutcome::NeedsApproval {
                    pairing: Some(PairingRequest::new(uri)),
                    waiter,
                })
            }
            None => {
                debug!("relay reused an existing pairing, awaiting approval");
                match waiter.wait().await {
                    Ok(session) => Ok(ConnectOutcome::Approved(session)),
                    Err(AuthFlowError::ApprovalPending) => Ok(ConnectOutcome::NeedsApproval {
                        pairing: None,
                        waiter,
                    }),
                    Err(err) => Err(err),
                }
            }
        }
    }

    /// Ask the wallet to sign `message` with `address` and return the
    /// signature as lowercase `0x` hex.
    pub async fn request_signature(
        &self,
        topic: &str,
        address: &WalletAddress,
        message: &str,
    ) -> Result<String, AuthFlowError> {
        let client = self
            .get_client()
            .await
            .map_err(|e| AuthFlowError::ConnectionFailed(e.to_string()))?;

        let request = SignRequest {
            topic: topic.to_string(),
            chain_id: self.chain_id.clone(),
            method: self.sign_method.clone(),
            params: json!({
                "address": address.as_str(),
                "message": message,
            }),
        };

        let response = client
            .request(request)
            .await
            .map_err(AuthFlowError::from_signing)?;

        normalize_signature(&response)
    }

    fn connect_params(&self) -> ConnectParams {
        let namespace = chain_namespace(&self.chain_id).to_string();

        let mut required_namespaces = HashMap::new();
        required_namespaces.insert(
            namespace,
            RequiredNamespace {
                chains: vec![self.chain_id.clone()],
                methods: vec![self.sign_method.clone()],
                events: Vec::new(),
            },
        );

        ConnectParams {
            project_id: self.project_id.clone(),
            metadata: self.metadata.clone(),
            required_namespaces,
        }
    }
}

/// Wallets answer a signing request with a hex string, an object holding
/// one under `signature`, or a raw byte array.
pub fn normalize_signature(value: &Value) -> Result<String, AuthFlowError> {
    match value {
        Value::String(hex) => normalize_hex(hex),
        Value::Object(map) => match map.get("signature") {
            Some(inner @ (Value::String(_) | Value::Array(_))) => normalize_signature(inner),
            _ => Err(AuthFlowError::UnexpectedResponseShape(
                "object without a signature field".to_string(),
            )),
        },
        Value::Array(items) => {
            let bytes = items
                .iter()
                .map(|item| item.as_u64().and_then(|b| u8::try_from(b).ok()))
                .collect::<Option<Vec<u8>>>()
                .filter(|bytes| !bytes.is_empty())
                .ok_or_else(|| {
                    AuthFlowError::UnexpectedResponseShape("array is not a byte sequence".to_string())
                })?;
            Ok(format!("0x{}", hex::encode(bytes)))
        }
        other => Err(AuthFlowError::UnexpectedResponseShape(format!(
            "unsupported signature value: {}",
            json_kind(other)
        ))),
    }
}

fn normalize_hex(raw: &str) -> Result<String, AuthFlowError> {
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw);

    if digits.is_empty() || digits.len() % 2 != 0 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(AuthFlowError::UnexpectedResponseShape(
            "signature string is not hex".to_string(),
        ));
    }
    Ok(format!("0x{}", digits.to_ascii_lowercase()))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
