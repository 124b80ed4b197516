// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Challenge Sweeper
//!
//! Background task that periodically drops expired login challenges so that
//! abandoned sign-in attempts do not occupy the store until evicted.
//! Expiry is also enforced on lookup; the sweeper only reclaims memory.
//!
//! ## Shutdown
//!
//! Uses `tokio_util::sync::CancellationToken` for graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::challenge::ChallengeStore;

/// Default interval between sweeps.
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub struct ChallengeSweeper {
    store: Arc<ChallengeStore>,
    interval: Duration,
}

impl ChallengeSweeper {
    pub fn new(store: Arc<ChallengeStore>) -> Self {
        Self {
            store,
            interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run the sweep loop until the cancellation token is triggered.
    ///
    /// ```rust,ignore
    /// tokio::spawn(sweeper.run(shutdown.clone()));
    /// ```
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Challenge sweeper starting"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {},
                _ = shutdown.cancelled() => {
                    info!("Challenge sweeper shutting down");
                    return;
                }
            }

            let removed = self.store.purge_expired(Utc::now());
            if removed > 0 {
                debug!(
                    removed,
                    remaining = self.store.len(),
                    "Challenge sweeper: purged expired challenges"
                );
            }
        }
    }
}
