// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication errors.
//!
//! [`ChallengeError`] covers the nonce/verify exchange and is rendered
//! through [`crate::error::ApiError`]; [`AuthError`] covers bearer-token
//! validation on authenticated routes. Both carry a stable `error_code` so
//! the sign-in client can map a response back to a typed failure.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Serialize)]
struct AuthErrorBody {
    error: String,
    error_code: String,
}

/// Failures of the login challenge exchange.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChallengeError {
    /// Address missing or not decodable
    #[error("Invalid wallet address: {0}")]
    InvalidAddress(String),
    /// Request body incomplete
    #[error("{0}")]
    MissingField(&'static str),
    /// Nonce unknown, replaced, consumed, or expired
    #[error("Login challenge is no longer valid. Request a new nonce.")]
    StaleNonce,
    /// Signing address differs from the address the nonce was issued to
    #[error("Challenge was issued to {expected}, not {actual}")]
    AddressMismatch { expected: String, actual: String },
    /// Signature does not verify for the address
    #[error("Signature verification failed")]
    VerificationRejected,
    /// Token issuance or randomness failure
    #[error("Internal authentication error: {0}")]
    Internal(String),
}

impl ChallengeError {
    pub fn error_code(&self) -> &'static str {
        match self {
            ChallengeError::InvalidAddress(_) => "invalid_address",
            ChallengeError::MissingField(_) => "missing_field",
            ChallengeError::StaleNonce => "stale_nonce",
            ChallengeError::AddressMismatch { .. } => "address_mismatch",
            ChallengeError::VerificationRejected => "verification_rejected",
            ChallengeError::Internal(_) => "internal_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ChallengeError::InvalidAddress(_)
            | ChallengeError::MissingField(_)
            | ChallengeError::AddressMismatch { .. } => StatusCode::BAD_REQUEST,
            ChallengeError::StaleNonce => StatusCode::CONFLICT,
            ChallengeError::VerificationRejected => StatusCode::UNAUTHORIZED,
            ChallengeError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Bearer token validation errors.
#[derive(Debug)]
pub enum AuthError {
    /// No authorization header present
    MissingAuthHeader,
    /// Invalid authorization header format
    InvalidAuthHeader,
    /// Token is malformed
    MalformedToken,
    /// Token signature is invalid
    InvalidSignature,
    /// Token has expired
    TokenExpired,
    /// Internal error
    InternalError(String),
}

impl AuthError {
    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthError::MissingAuthHeader => "missing_auth_header",
            AuthError::InvalidAuthHeader => "invalid_auth_header",
            AuthError::MalformedToken => "malformed_token",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::TokenExpired => "token_expired",
            AuthError::InternalError(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthError::MissingAuthHeader => write!(f, "Authorization header is required"),
            AuthError::InvalidAuthHeader => {
                write!(f, "Invalid authorization header format (expected 'Bearer <token>')")
            }
            AuthError::MalformedToken => write!(f, "Token is malformed"),
            AuthError::InvalidSignature => write!(f, "Token signature is invalid"),
            AuthError::TokenExpired => write!(f, "Token has expired"),
            AuthError::InternalError(msg) => write!(f, "Internal authentication error: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(AuthErrorBody {
            error: self.to_string(),
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}
