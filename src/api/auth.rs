// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet sign-in endpoints.
//!
//! `POST /v1/auth/nonce` issues a challenge, `POST /v1/auth/verify`
//! exchanges a signed challenge for a bearer token, and
//! `GET /v1/auth/session` echoes the session behind a bearer token.

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use tracing::{info, warn};

use crate::{
    auth::{signature::decode_ss58, verify_wallet_signature, Auth, ChallengeError},
    error::ApiError,
    models::{NonceRequest, NonceResponse, SessionInfo, VerifyRequest, VerifyResponse},
    state::AppState,
};

/// Issue a one-time login challenge for a wallet address.
///
/// Any challenge previously issued to the same address stops being
/// accepted.
#[utoipa::path(
    post,
    path = "/v1/auth/nonce",
    tag = "Auth",
    request_body = NonceRequest,
    responses(
        (status = 200, description = "Challenge issued", body = NonceResponse),
        (status = 400, description = "Missing or invalid address")
    )
)]
pub async fn issue_nonce(
    State(state): State<AppState>,
    payload: Result<Json<NonceRequest>, JsonRejection>,
) -> Result<Json<NonceResponse>, ApiError> {
    let Json(request) = payload?;
    if request.address.is_empty() {
        return Err(ChallengeError::MissingField("address is required").into());
    }
    decode_ss58(request.address.as_str())?;

    let challenge = state.challenges.issue(&request.address)?;
    info!(
        address = %challenge.address,
        expires_at = %challenge.expires_at,
        "Issued login challenge"
    );

    Ok(Json(challenge.into()))
}

/// Verify a signed challenge and issue a bearer token.
#[utoipa::path(
    post,
    path = "/v1/auth/verify",
    tag = "Auth",
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "Signature accepted", body = VerifyResponse),
        (status = 400, description = "Missing fields, invalid address, or address mismatch"),
        (status = 401, description = "Signature verification failed"),
        (status = 409, description = "Nonce expired, replaced, or already used")
    )
)]
pub async fn verify_signature(
    State(state): State<AppState>,
    payload: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let Json(request) = payload?;
    if request.address.is_empty() || request.message.is_empty() || request.signature.is_empty() {
        return Err(ChallengeError::MissingField(
            "address, message and signature are required",
        )
        .into());
    }

    let challenge = state.challenges.lookup(&request.message)?;
    if challenge.address != request.address {
        warn!(
            expected = %challenge.address,
            actual = %request.address,
            "Login challenge presented by a different address"
        );
        return Err(ChallengeError::AddressMismatch {
            expected: challenge.address.to_string(),
            actual: request.address.to_string(),
        }
        .into());
    }

    let scheme = verify_wallet_signature(
        request.address.as_str(),
        &request.message,
        &request.signature,
    )
    .inspect_err(|e| warn!(address = %request.address, error = %e, "Signature rejected"))?;

    if !state.challenges.consume(&challenge.nonce) {
        return Err(ChallengeError::StaleNonce.into());
    }

    let issued = state
        .tokens
        .issue(&request.address)
        .map_err(|e| ChallengeError::Internal(e.to_string()))?;

    info!(address = %request.address, scheme = ?scheme, "Wallet signed in");

    Ok(Json(VerifyResponse {
        token: issued.token,
        token_type: "bearer".to_string(),
        wallet_address: Some(request.address),
        expires_at: Some(issued.expires_at),
    }))
}

/// Return the wallet session behind the caller's bearer token.
#[utoipa::path(
    get,
    path = "/v1/auth/session",
    tag = "Auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Authenticated session", body = SessionInfo),
        (status = 401, description = "Missing, invalid, or expired token")
    )
)]
pub async fn current_session(Auth(session): Auth) -> Json<SessionInfo> {
    Json(session)
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::api::router;
    use crate::auth::signature::encode_ss58;
    use crate::state::AppState;

    struct TestWallet {
        keypair: schnorrkel::Keypair,
        address: String,
    }

    impl TestWallet {
        fn new() -> Self {
            let keypair = schnorrkel::Keypair::generate();
            let address = encode_ss58(42, &keypair.public.to_bytes());
            Self { keypair, address }
        }

        fn sign(&self, message: &str) -> String {
            let signature = self.keypair.sign_simple(b"substrate", message.as_bytes());
            format!("0x{}", hex::encode(signature.to_bytes()))
        }
    }

    async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post(path: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn request_nonce(app: &Router, address: &str) -> Value {
        let (status, body) = call(app, post("/v1/auth/nonce", json!({ "address": address }))).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body
    }

    #[tokio::test]
    async fn full_sign_in_then_session_lookup() {
        let app = router(AppState::default());
        let wallet = TestWallet::new();

        let nonce = request_nonce(&app, &wallet.address).await;
        assert_eq!(nonce["wallet_address"], wallet.address.as_str());
        let message = nonce["message_to_sign"].as_str().unwrap().to_string();
        assert!(message.ends_with(nonce["nonce"].as_str().unwrap()));

        let (status, body) = call(
            &app,
            post(
                "/v1/auth/verify",
                json!({
                    "address": wallet.address,
                    "message": message,
                    "signature": wallet.sign(&message),
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        assert_eq!(body["token_type"], "bearer");
        let token = body["token"].as_str().unwrap();

        let session_request = Request::builder()
            .uri("/v1/auth/session")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let (status, session) = call(&app, session_request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(session["wallet_address"], wallet.address.as_str());
    }

    #[tokio::test]
    async fn repeated_verify_is_stale() {
        let app = router(AppState::default());
        let wallet = TestWallet::new();
        let nonce = request_nonce(&app, &wallet.address).await;
        let message = nonce["message_to_sign"].as_str().unwrap();
        let body = json!({
            "wallet_address": wallet.address,
            "signed_message": message,
            "signature": wallet.sign(message),
        });

        let (first, _) = call(&app, post("/v1/auth/verify", body.clone())).await;
        assert_eq!(first, StatusCode::OK);

        let (second, error) = call(&app, post("/v1/auth/verify", body)).await;
        assert_eq!(second, StatusCode::CONFLICT);
        assert_eq!(error["error_code"], "stale_nonce");
    }

    #[tokio::test]
    async fn nonce_for_one_address_rejects_another() {
        let app = router(AppState::default());
        let alice = TestWallet::new();
        let bob = TestWallet::new();

        let nonce = request_nonce(&app, &alice.address).await;
        let message = nonce["message_to_sign"].as_str().unwrap();

        let (status, error) = call(
            &app,
            post(
                "/v1/auth/verify",
                json!({
                    "address": bob.address,
                    "message": message,
                    "signature": bob.sign(message),
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["error_code"], "address_mismatch");
    }

    #[tokio::test]
    async fn wrong_key_is_rejected_and_nonce_survives() {
        let app = router(AppState::default());
        let wallet = TestWallet::new();
        let impostor = TestWallet::new();
        let nonce = request_nonce(&app, &wallet.address).await;
        let message = nonce["message_to_sign"].as_str().unwrap();

        let (status, error) = call(
            &app,
            post(
                "/v1/auth/verify",
                json!({
                    "address": wallet.address,
                    "message": message,
                    "signature": impostor.sign(message),
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(error["error_code"], "verification_rejected");

        let (status, _) = call(
            &app,
            post(
                "/v1/auth/verify",
                json!({
                    "address": wallet.address,
                    "message": message,
                    "signature": wallet.sign(message),
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn trimmed_message_is_not_accepted() {
        let app = router(AppState::default());
        let wallet = TestWallet::new();
        let nonce = request_nonce(&app, &wallet.address).await;
        let altered = format!("{} ", nonce["message_to_sign"].as_str().unwrap());

        let (status, error) = call(
            &app,
            post(
                "/v1/auth/verify",
                json!({
                    "address": wallet.address,
                    "message": altered,
                    "signature": wallet.sign(&altered),
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(error["error_code"], "stale_nonce");
    }

    #[tokio::test]
    async fn bad_requests_are_reported() {
        let app = router(AppState::default());

        let (status, error) = call(&app, post("/v1/auth/nonce", json!({ "address": "" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["error_code"], "missing_field");

        let (status, error) =
            call(&app, post("/v1/auth/nonce", json!({ "address": "not-ss58!" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error["error_code"], "invalid_address");

        let (status, error) = call(&app, post("/v1/auth/nonce", json!({ "nope": 1 }))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(error["error_code"], "invalid_body");
    }

    #[tokio::test]
    async fn session_requires_bearer_token() {
        let app = router(AppState::default());
        let request = Request::builder()
            .uri("/v1/auth/session")
            .body(Body::empty())
            .unwrap();
        let (status, error) = call(&app, request).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(error["error_code"], "missing_auth_header");
    }
}
