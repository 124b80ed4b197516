// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::time::Duration;

use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::deep_link::DeepLinkResolver;

/// Brings the wallet back to the foreground at fixed delays after a
/// signing request goes out. Best effort only.
#[derive(Clone)]
pub struct ForegroundNudger {
    resolver: DeepLinkResolver,
    delays: Vec<Duration>,
}

impl ForegroundNudger {
    /// `delays` are measured from the moment the nudger is armed.
    pub fn new(resolver: DeepLinkResolver, delays: Vec<Duration>) -> Self {
        Self { resolver, delays }
    }

    /// Must be called from within a Tokio runtime.
    pub fn arm(&self) -> NudgeGuard {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let resolver = self.resolver.clone();
        let delays = self.delays.clone();

        tokio::spawn(async move {
            let armed_at = Instant::now();
            for (attempt, delay) in delays.into_iter().enumerate() {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => return,
                    _ = sleep_until(armed_at + delay) => {}
                }
                let outcome = resolver.bring_to_front();
                debug!(attempt, ?outcome, "foreground nudge");
            }
        });

        NudgeGuard { token }
    }
}

/// Cancels outstanding nudges when dropped.
#[derive(Debug)]
pub struct NudgeGuard {
    token: CancellationToken,
}

impl NudgeGuard {
    pub fn disarm(self) {}
}

impl Drop for NudgeGuard {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::deep_link::Platform;
    use crate::wallet::testing::RecordingOpener;
    use std::sync::Arc;

    fn nudger(opener: Arc<RecordingOpener>) -> ForegroundNudger {
        let resolver = DeepLinkResolver::new(opener, "biddrop://wc").with_platform(Platform::Ios);
        ForegroundNudger::new(resolver, crate::config::DEFAULT_NUDGE_DELAYS.to_vec())
    }

    #[tokio::test(start_paused = true)]
    async fn nudges_at_each_delay() {
        let opener = RecordingOpener::accepting(|_| true);
        let guard = nudger(opener.clone()).arm();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(opener.attempts().is_empty());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(opener.attempts(), vec!["subwallet://".to_string()]);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(opener.attempts().len(), 2);
        drop(guard);
    }

    #[tokio::test(start_paused = true)]
    async fn disarming_cancels_remaining_nudges() {
        let opener = RecordingOpener::accepting(|_| true);
        let guard = nudger(opener.clone()).arm();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(opener.attempts().len(), 1);

        guard.disarm();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(opener.attempts().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_nudges_are_harmless() {
        let opener = RecordingOpener::accepting(|_| false);
        let _guard = nudger(opener.clone()).arm();

        tokio::time::sleep(Duration::from_secs(4)).await;
        // Each nudge tries the scheme root and the universal link root.
        assert_eq!(opener.attempts().len(), 4);
        assert!(opener.attempts().iter().all(|url| !url.contains("apps.apple.com")));
    }
}
