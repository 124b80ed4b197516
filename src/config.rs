// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults, and the two configuration structs
//! built from them: [`ServerConfig`] for the nonce/verify service and
//! [`WalletAuthConfig`] for the client-side pairing and signing flow.
//!
//! ## Server Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `JWT_SECRET` | HS256 secret for issued bearer tokens | Required for production |
//! | `JWT_TTL_MIN` | Bearer token lifetime in minutes | `60` |
//! | `NONCE_TTL_SECS` | Login challenge lifetime | `300` |
//! | `NONCE_CAPACITY` | Max live challenges held in memory | `10000` |
//! | `CHALLENGE_PREFIX` | Text prepended to the nonce in `message_to_sign` | `BidDrop login challenge: ` |
//! | `TLS_CERT_PATH` / `TLS_KEY_PATH` | PEM files; both set enables HTTPS | unset |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |
//!
//! ## Client Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `AUTH_API_BASE_URL` | Base URL of the auth API (without `/auth`) | `http://localhost:8080/v1` |
//! | `WC_PROJECT_ID` | Relay project identifier | empty |
//! | `WC_CHAIN_ID` | CAIP-2 chain requested from the wallet | Polkadot relay chain |
//! | `WC_SIGN_METHOD` | Signing method requested from the wallet | `polkadot_signMessage` |
//! | `APP_NAME` / `APP_DESCRIPTION` / `APP_URL` / `APP_ICON` | Pairing metadata | BidDrop values |
//! | `APP_RETURN_URL` | Deep link the wallet bounces back to | `biddrop://wc` |

use std::{env, net::SocketAddr, time::Duration};

use thiserror::Error;

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";

/// Secret used to sign issued bearer tokens.
///
/// Must be set in production. When unset, a fixed development secret is
/// used and a warning is logged at startup.
pub const JWT_SECRET_ENV: &str = "JWT_SECRET";
pub const JWT_TTL_MIN_ENV: &str = "JWT_TTL_MIN";
pub const NONCE_TTL_SECS_ENV: &str = "NONCE_TTL_SECS";
pub const NONCE_CAPACITY_ENV: &str = "NONCE_CAPACITY";
pub const CHALLENGE_PREFIX_ENV: &str = "CHALLENGE_PREFIX";
pub const TLS_CERT_PATH_ENV: &str = "TLS_CERT_PATH";
pub const TLS_KEY_PATH_ENV: &str = "TLS_KEY_PATH";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const AUTH_API_BASE_URL_ENV: &str = "AUTH_API_BASE_URL";
pub const WC_PROJECT_ID_ENV: &str = "WC_PROJECT_ID";
pub const WC_CHAIN_ID_ENV: &str = "WC_CHAIN_ID";
pub const WC_SIGN_METHOD_ENV: &str = "WC_SIGN_METHOD";
pub const APP_NAME_ENV: &str = "APP_NAME";
pub const APP_DESCRIPTION_ENV: &str = "APP_DESCRIPTION";
pub const APP_URL_ENV: &str = "APP_URL";
pub const APP_ICON_ENV: &str = "APP_ICON";
pub const APP_RETURN_URL_ENV: &str = "APP_RETURN_URL";

pub const DEV_JWT_SECRET: &str = "CHANGE_ME_IN_PROD";
pub const DEFAULT_CHALLENGE_PREFIX: &str = "BidDrop login challenge: ";
const DEFAULT_JWT_TTL_MIN: u64 = 60;
const DEFAULT_NONCE_TTL_SECS: u64 = 300;
const DEFAULT_NONCE_CAPACITY: usize = 10_000;

pub const DEFAULT_AUTH_API_BASE_URL: &str = "http://localhost:8080/v1";
/// Polkadot relay chain genesis, CAIP-2 form.
pub const DEFAULT_CHAIN_ID: &str = "polkadot:91b171bb158e2d3848fa23a9f1c25182";
pub const DEFAULT_SIGN_METHOD: &str = "polkadot_signMessage";
pub const DEFAULT_RETURN_URL: &str = "biddrop://wc";

/// Delays after dispatching a signing request at which the wallet is
/// brought back to the foreground.
pub const DEFAULT_NUDGE_DELAYS: [Duration; 2] =
    [Duration::from_millis(200), Duration::from_secs(3)];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("{0} and {1} must be set together")]
    Incomplete(&'static str, &'static str),
}

/// Configuration for the nonce/verify HTTP service.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_ttl: Duration,
    pub nonce_ttl: Duration,
    pub nonce_capacity: usize,
    pub challenge_prefix: String,
    pub tls: Option<TlsPaths>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsPaths {
    pub cert: String,
    pub key: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            jwt_secret: DEV_JWT_SECRET.to_string(),
            jwt_ttl: Duration::from_secs(DEFAULT_JWT_TTL_MIN * 60),
            nonce_ttl: Duration::from_secs(DEFAULT_NONCE_TTL_SECS),
            nonce_capacity: DEFAULT_NONCE_CAPACITY,
            challenge_prefix: DEFAULT_CHALLENGE_PREFIX.to_string(),
            tls: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let tls = match (env_optional(TLS_CERT_PATH_ENV), env_optional(TLS_KEY_PATH_ENV)) {
            (Some(cert), Some(key)) => Some(TlsPaths { cert, key }),
            (None, None) => None,
            _ => return Err(ConfigError::Incomplete(TLS_CERT_PATH_ENV, TLS_KEY_PATH_ENV)),
        };

        Ok(Self {
            host: env_or_default(HOST_ENV, &defaults.host),
            port: env_parsed(PORT_ENV, defaults.port)?,
            jwt_secret: env_or_default(JWT_SECRET_ENV, DEV_JWT_SECRET),
            jwt_ttl: jwt_ttl(env_parsed(JWT_TTL_MIN_ENV, DEFAULT_JWT_TTL_MIN)?)?,
            nonce_ttl: Duration::from_secs(env_parsed(NONCE_TTL_SECS_ENV, DEFAULT_NONCE_TTL_SECS)?),
            nonce_capacity: env_parsed(NONCE_CAPACITY_ENV, DEFAULT_NONCE_CAPACITY)?,
            // Not trimmed: trailing whitespace is part of the signed text.
            challenge_prefix: env::var(CHALLENGE_PREFIX_ENV)
                .unwrap_or_else(|_| DEFAULT_CHALLENGE_PREFIX.to_string()),
            tls,
        })
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                name: HOST_ENV,
                reason: e.to_string(),
            })
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}

/// Identity metadata sent to the relay when pairing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppMetadata {
    pub name: String,
    pub description: String,
    pub url: String,
    pub icons: Vec<String>,
}

/// Configuration for the client-side sign-in flow.
#[derive(Debug, Clone)]
pub struct WalletAuthConfig {
    pub auth_api_base_url: String,
    pub project_id: String,
    pub chain_id: String,
    pub sign_method: String,
    pub metadata: AppMetadata,
    pub return_url: String,
    pub nudge_delays: Vec<Duration>,
    pub http_timeout: Duration,
}

impl Default for WalletAuthConfig {
    fn default() -> Self {
        Self {
            auth_api_base_url: DEFAULT_AUTH_API_BASE_URL.to_string(),
            project_id: String::new(),
            chain_id: DEFAULT_CHAIN_ID.to_string(),
            sign_method: DEFAULT_SIGN_METHOD.to_string(),
            metadata: AppMetadata {
                name: "BidDrop".to_string(),
                description: "Peer-to-peer delivery auctions".to_string(),
                url: "https://biddrop.app".to_string(),
                icons: vec!["https://biddrop.app/icon.png".to_string()],
            },
            return_url: DEFAULT_RETURN_URL.to_string(),
            nudge_delays: DEFAULT_NUDGE_DELAYS.to_vec(),
            http_timeout: Duration::from_secs(15),
        }
    }
}

impl WalletAuthConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let icons = env_optional(APP_ICON_ENV)
            .map(|icon| vec![icon])
            .unwrap_or(defaults.metadata.icons);

        Self {
            auth_api_base_url: env_or_default(AUTH_API_BASE_URL_ENV, &defaults.auth_api_base_url),
            project_id: env_or_default(WC_PROJECT_ID_ENV, &defaults.project_id),
            chain_id: env_or_default(WC_CHAIN_ID_ENV, &defaults.chain_id),
            sign_method: env_or_default(WC_SIGN_METHOD_ENV, &defaults.sign_method),
            metadata: AppMetadata {
                name: env_or_default(APP_NAME_ENV, &defaults.metadata.name),
                description: env_or_default(APP_DESCRIPTION_ENV, &defaults.metadata.description),
                url: env_or_default(APP_URL_ENV, &defaults.metadata.url),
                icons,
            },
            return_url: env_or_default(APP_RETURN_URL_ENV, &defaults.return_url),
            nudge_delays: defaults.nudge_delays,
            http_timeout: defaults.http_timeout,
        }
    }
}

/// The namespace part of a CAIP-2 chain id (`polkadot` for
/// `polkadot:91b1…`). A bare namespace is returned unchanged.
pub fn chain_namespace(chain_id: &str) -> &str {
    chain_id
        .split_once(':')
        .map(|(namespace, _)| namespace)
        .unwrap_or(chain_id)
}

fn jwt_ttl(minutes: u64) -> Result<Duration, ConfigError> {
    minutes
        .checked_mul(60)
        .map(Duration::from_secs)
        .ok_or_else(|| ConfigError::Invalid {
            name: JWT_TTL_MIN_ENV,
            reason: format!("{minutes} minutes is out of range"),
        })
}

fn env_optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    env_optional(name).unwrap_or_else(|| default.to_string())
}

fn env_parsed<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env_optional(name) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}
