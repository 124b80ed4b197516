// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Bearer token issuance and validation.
//!
//! Tokens are HS256 JWTs whose `sub` is the wallet address that proved
//! control of its key. The server decides the lifetime; clients treat the
//! token as opaque.

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::AuthError;
use crate::models::{SessionInfo, WalletAddress};

/// Clock skew tolerance (60 seconds).
const CLOCK_SKEW_LEEWAY: u64 = 60;

/// Claims carried by an issued bearer token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WalletClaims {
    /// Wallet address (canonical user identifier)
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
    /// Token id
    pub jti: String,
}

/// A token together with its expiry.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn issue(&self, address: &WalletAddress) -> Result<IssuedToken, AuthError> {
        self.issue_at(address, Utc::now())
    }

    pub fn issue_at(
        &self,
        address: &WalletAddress,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken, AuthError> {
        let ttl = chrono::Duration::from_std(self.ttl)
            .map_err(|e| AuthError::InternalError(format!("invalid token ttl: {e}")))?;
        let expires_at = now + ttl;
        let claims = WalletClaims {
            sub: address.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::InternalError(format!("token encoding failed: {e}")))?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Validate a bearer token and return the session it describes.
    pub fn validate(&self, token: &str) -> Result<SessionInfo, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = CLOCK_SKEW_LEEWAY;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let data = decode::<WalletClaims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::MalformedToken,
            }
        })?;

        let claims = data.claims;
        if claims.sub.is_empty() {
            return Err(AuthError::MalformedToken);
        }

        Ok(SessionInfo {
            wallet_address: WalletAddress::from(claims.sub),
            issued_at: timestamp(claims.iat)?,
            expires_at: timestamp(claims.exp)?,
        })
    }
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>, AuthError> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or(AuthError::MalformedToken)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new("test-secret", Duration::from_secs(3600))
    }

    #[test]
    fn issued_token_validates_to_same_address() {
        let issuer = issuer();
        let address = WalletAddress::from("5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY");
        let issued = issuer.issue(&address).unwrap();

        let session = issuer.validate(&issued.token).unwrap();
        assert_eq!(session.wallet_address, address);
        assert_eq!(session.expires_at.timestamp(), issued.expires_at.timestamp());
    }

    #[test]
    fn expired_token_is_rejected() {
        let issuer = issuer();
        let long_ago = Utc::now() - chrono::Duration::hours(3);
        let issued = issuer
            .issue_at(&WalletAddress::from("5Grw"), long_ago)
            .unwrap();

        assert!(matches!(
            issuer.validate(&issued.token),
            Err(AuthError::TokenExpired)
        ));
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let other = TokenIssuer::new("other-secret", Duration::from_secs(3600));
        let issued = other.issue(&WalletAddress::from("5Grw")).unwrap();

        assert!(matches!(
            issuer().validate(&issued.token),
            Err(AuthError::InvalidSignature)
        ));
        assert!(matches!(
            issuer().validate("not.a.jwt"),
            Err(AuthError::MalformedToken)
        ));
    }
}
