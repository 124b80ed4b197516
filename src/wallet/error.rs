// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Errors surfaced by the client-side sign-in flow.

use thiserror::Error;

/// Failures of the relay/pairing transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error("relay unavailable: {0}")]
    Unavailable(String),

    #[error("request rejected by wallet: {0}")]
    Rejected(String),

    #[error("proposal expired")]
    Expired,

    #[error("approval not received yet")]
    NotYetApproved,

    #[error("relay protocol error: {0}")]
    Protocol(String),
}

/// Failures of the host-OS "open this URL" bridge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OpenError {
    #[error("no installed application handles {0}")]
    NoHandler(String),

    #[error("host refused to open url: {0}")]
    Refused(String),
}

/// Typed failure of the sign-in flow, with a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthFlowError {
    #[error("Could not connect to the wallet relay: {0}")]
    ConnectionFailed(String),

    /// Approval has not arrived yet; not shown to the user.
    #[error("Waiting for approval in the wallet")]
    ApprovalPending,

    #[error("Wallet connection was rejected or expired: {0}")]
    ApprovalFailed(String),

    #[error("Wallet returned no account for the {namespace} namespace")]
    NoAccountReturned { namespace: String },

    #[error("Cannot sign yet: {0}")]
    PreconditionFailed(&'static str),

    #[error("Wallet returned a signature in an unexpected format: {0}")]
    UnexpectedResponseShape(String),

    #[error("Signature was not accepted: {0}")]
    VerificationRejected(String),

    #[error("Login challenge expired or was already used. Please try again.")]
    StaleNonce,

    #[error("Signing account does not match the challenge account")]
    AddressMismatch,

    #[error("Authentication server unreachable: {0}")]
    NetworkFailure(String),
}

impl AuthFlowError {
    pub fn error_code(&self) -> &'static str {
        match self {
            AuthFlowError::ConnectionFailed(_) => "connection_failed",
            AuthFlowError::ApprovalPending => "approval_pending",
            AuthFlowError::ApprovalFailed(_) => "approval_failed",
            AuthFlowError::NoAccountReturned { .. } => "no_account_returned",
            AuthFlowError::PreconditionFailed(_) => "precondition_failed",
            AuthFlowError::UnexpectedResponseShape(_) => "unexpected_response_shape",
            AuthFlowError::VerificationRejected(_) => "verification_rejected",
            AuthFlowError::StaleNonce => "stale_nonce",
            AuthFlowError::AddressMismatch => "address_mismatch",
            AuthFlowError::NetworkFailure(_) => "network_failure",
        }
    }

    /// Whether the error should be shown to the user.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, AuthFlowError::ApprovalPending)
    }

    /// Classify an error from waiting on a pairing approval. Only
    /// `NotYetApproved` is pending; a lost relay ends the attempt.
    pub fn from_approval(err: RelayError) -> Self {
        match err {
            RelayError::NotYetApproved => AuthFlowError::ApprovalPending,
            RelayError::Unavailable(detail) => {
                AuthFlowError::ApprovalFailed(format!("relay connection lost: {detail}"))
            }
            RelayError::Rejected(reason) => AuthFlowError::ApprovalFailed(reason),
            RelayError::Expired => AuthFlowError::ApprovalFailed("proposal expired".to_string()),
            RelayError::Protocol(detail) => AuthFlowError::ApprovalFailed(detail),
        }
    }

    /// Classify an error from a signing request on an approved session.
    pub fn from_signing(err: RelayError) -> Self {
        match err {
            RelayError::Rejected(reason) => {
                AuthFlowError::VerificationRejected(format!("wallet declined to sign: {reason}"))
            }
            other => AuthFlowError::ConnectionFailed(other.to_string()),
        }
    }
}
