// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::{ChallengeStore, TokenIssuer};
use crate::config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    pub challenges: Arc<ChallengeStore>,
    pub tokens: TokenIssuer,
    pub uses_dev_secret: bool,
}

impl AppState {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            challenges: Arc::new(ChallengeStore::new(
                config.nonce_capacity,
                config.nonce_ttl,
                config.challenge_prefix.clone(),
            )),
            tokens: TokenIssuer::new(&config.jwt_secret, config.jwt_ttl),
            uses_dev_secret: config.uses_dev_secret(),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(&ServerConfig::default())
    }
}
