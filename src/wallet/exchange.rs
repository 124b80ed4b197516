// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Client side of the nonce/verify exchange with the auth server.

use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use super::error::AuthFlowError;
use super::types::{AuthResult, Challenge};
use crate::config::WalletAuthConfig;
use crate::models::{NonceRequest, NonceResponse, VerifyRequest, VerifyResponse, WalletAddress};

/// Talks to the auth server on behalf of the coordinator.
pub trait ChallengeExchange: Send + Sync {
    fn request_nonce(&self, address: WalletAddress) -> BoxFuture<'_, Result<Challenge, AuthFlowError>>;

    fn verify(&self, payload: VerifyRequest) -> BoxFuture<'_, Result<AuthResult, AuthFlowError>>;
}

#[derive(Debug, Clone)]
pub struct HttpChallengeExchange {
    base_url: String,
    http: Client,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
}

impl HttpChallengeExchange {
    /// `base_url` is the API root without `/auth`, e.g. `https://api.example.com/v1`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, AuthFlowError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthFlowError::NetworkFailure(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into(),
            http,
        })
    }

    pub fn from_config(config: &WalletAuthConfig) -> Result<Self, AuthFlowError> {
        Self::new(config.auth_api_base_url.clone(), config.http_timeout)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, AuthFlowError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .http
            .post(self.endpoint(path))
            .json(body)
            .send()
            .await
            .map_err(|e| AuthFlowError::NetworkFailure(format!("{path} request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = map_error_response(status, &body);
            warn!(path, %status, error_code = err.error_code(), "auth server rejected request");
            return Err(err);
        }

        response
            .json()
            .await
            .map_err(|e| AuthFlowError::NetworkFailure(format!("invalid {path} response: {e}")))
    }
}

impl ChallengeExchange for HttpChallengeExchange {
    fn request_nonce(&self, address: WalletAddress) -> BoxFuture<'_, Result<Challenge, AuthFlowError>> {
        async move {
            let response: NonceResponse = self.post_json("nonce", &NonceRequest { address }).await?;
            debug!(address = %response.wallet_address, "received login challenge");
            Ok(Challenge::from(response))
        }
        .boxed()
    }

    fn verify(&self, payload: VerifyRequest) -> BoxFuture<'_, Result<AuthResult, AuthFlowError>> {
        async move {
            let response: VerifyResponse = self.post_json("verify", &payload).await?;
            if response.token.trim().is_empty() {
                return Err(AuthFlowError::NetworkFailure(
                    "verify response did not include a token".to_string(),
                ));
            }
            Ok(AuthResult::from(response))
        }
        .boxed()
    }
}

/// Map a non-2xx response onto the client error taxonomy. The server's
/// `error_code` wins; the status code decides otherwise.
fn map_error_response(status: StatusCode, body: &str) -> AuthFlowError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
        .error
        .or(parsed.detail)
        .unwrap_or_else(|| format!("server returned {status}"));

    match parsed.error_code.as_deref() {
        Some("stale_nonce") => return AuthFlowError::StaleNonce,
        Some("address_mismatch") => return AuthFlowError::AddressMismatch,
        Some("verification_rejected" | "invalid_address" | "missing_field") => {
            return AuthFlowError::VerificationRejected(message)
        }
        _ => {}
    }

    match status {
        StatusCode::CONFLICT => AuthFlowError::StaleNonce,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            AuthFlowError::VerificationRejected(message)
        }
        _ => AuthFlowError::NetworkFailure(format!("{status}: {message}")),
    }
}
