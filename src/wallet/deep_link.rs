// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Wallet Deep Links
//!
//! Builds the platform-specific links that hand a pairing URI to the wallet
//! app, and tries them in order until the host OS accepts one. When no
//! candidate opens, the user is sent to the wallet's store page instead.
//!
//! | Order | Link | Platforms |
//! |-------|------|-----------|
//! | 1 | `<scheme>wc?uri=<enc>&redirect=<enc>` | all |
//! | 2 | `intent://…#Intent;scheme=wc;package=<pkg>;end` | Android |
//! | 3 | `<universal>/wc?uri=<enc>` | all |
//! | 4 | raw pairing URI | all |
//! | 5 | store page | all, reported as [`OpenOutcome::StoreFallback`] |
//!
//! Nothing here returns an error: failures advance to the next candidate.

use std::sync::Arc;

use tracing::{debug, info, warn};
use url::{form_urlencoded, Url};

use super::error::OpenError;

/// Host-OS bridge for opening URLs in other apps.
pub trait LinkOpener: Send + Sync {
    fn open(&self, url: &str) -> Result<(), OpenError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Ios,
    Android,
    Desktop,
}

impl Platform {
    /// The platform this binary was compiled for.
    pub fn detect() -> Self {
        if cfg!(target_os = "ios") {
            Platform::Ios
        } else if cfg!(target_os = "android") {
            Platform::Android
        } else {
            Platform::Desktop
        }
    }
}

/// How to reach one particular wallet app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletProfile {
    pub name: String,
    /// Custom scheme root, including `://`.
    pub scheme: String,
    pub android_package: String,
    /// HTTPS origin the wallet intercepts, without trailing slash.
    pub universal_link: String,
    pub app_store_url: String,
    pub play_store_url: String,
    pub download_url: String,
}

impl WalletProfile {
    pub fn subwallet() -> Self {
        Self {
            name: "SubWallet".to_string(),
            scheme: "subwallet://".to_string(),
            android_package: "app.subwallet.mobile".to_string(),
            universal_link: "https://mobile.subwallet.app".to_string(),
            app_store_url: "https://apps.apple.com/app/subwallet-polkadot-wallet/id1633050285"
                .to_string(),
            play_store_url: "https://play.google.com/store/apps/details?id=app.subwallet.mobile"
                .to_string(),
            download_url: "https://www.subwallet.app/download.html".to_string(),
        }
    }

    fn store_url(&self, platform: Platform) -> &str {
        match platform {
            Platform::Ios => &self.app_store_url,
            Platform::Android => &self.play_store_url,
            Platform::Desktop => &self.download_url,
        }
    }
}

impl Default for WalletProfile {
    fn default() -> Self {
        Self::subwallet()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    Opened,
    StoreFallback,
    NoEffect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkKind {
    NativeScheme,
    AndroidIntent,
    UniversalLink,
    GenericScheme,
}

impl LinkKind {
    fn as_str(&self) -> &'static str {
        match self {
            LinkKind::NativeScheme => "native_scheme",
            LinkKind::AndroidIntent => "android_intent",
            LinkKind::UniversalLink => "universal_link",
            LinkKind::GenericScheme => "generic_scheme",
        }
    }
}

fn any_platform(_: Platform) -> bool {
    true
}

fn android_only(platform: Platform) -> bool {
    platform == Platform::Android
}

const PAIRING_CANDIDATES: &[(LinkKind, fn(Platform) -> bool)] = &[
    (LinkKind::NativeScheme, any_platform),
    (LinkKind::AndroidIntent, android_only),
    (LinkKind::UniversalLink, any_platform),
    (LinkKind::GenericScheme, any_platform),
];

#[derive(Clone)]
pub struct DeepLinkResolver {
    opener: Arc<dyn LinkOpener>,
    profile: WalletProfile,
    platform: Platform,
    return_url: String,
}

impl DeepLinkResolver {
    pub fn new(opener: Arc<dyn LinkOpener>, return_url: impl Into<String>) -> Self {
        Self {
            opener,
            profile: WalletProfile::default(),
            platform: Platform::detect(),
            return_url: return_url.into(),
        }
    }

    pub fn with_profile(mut self, profile: WalletProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Hand `pairing_uri` to the wallet app.
    pub fn attempt_open(&self, pairing_uri: &str) -> OpenOutcome {
        let pairing_uri = pairing_uri.trim();
        if pairing_uri.is_empty() || Url::parse(pairing_uri).is_err() {
            debug!("pairing uri missing or unparsable, not opening wallet");
            return OpenOutcome::NoEffect;
        }

        for (kind, applies) in PAIRING_CANDIDATES {
            if !applies(self.platform) {
                continue;
            }
            let link = self.pairing_link(*kind, pairing_uri);
            if self.try_open(kind.as_str(), &link) {
                info!(wallet = %self.profile.name, kind = kind.as_str(), "opened wallet for pairing");
                return OpenOutcome::Opened;
            }
        }

        let store = self.profile.store_url(self.platform);
        if !self.try_open("store", store) {
            warn!(wallet = %self.profile.name, "could not open wallet or its store page");
        }
        OpenOutcome::StoreFallback
    }

    /// Bring an already-paired wallet to the foreground. Carries no payload
    /// and never falls back to the store.
    pub fn bring_to_front(&self) -> OpenOutcome {
        let mut links = vec![("native_root", self.profile.scheme.clone())];
        if self.platform == Platform::Android {
            links.push((
                "android_launch",
                format!("intent://#Intent;package={};end", self.profile.android_package),
            ));
        }
        links.push(("universal_root", format!("{}/", self.profile.universal_link)));

        for (kind, link) in links {
            if self.try_open(kind, &link) {
                debug!(wallet = %self.profile.name, kind, "brought wallet to front");
                return OpenOutcome::Opened;
            }
        }
        OpenOutcome::NoEffect
    }

    fn pairing_link(&self, kind: LinkKind, pairing_uri: &str) -> String {
        match kind {
            LinkKind::NativeScheme => format!(
                "{}wc?uri={}&redirect={}",
                self.profile.scheme,
                encode(pairing_uri),
                encode(&self.return_url)
            ),
            LinkKind::AndroidIntent => {
                let rest = pairing_uri.strip_prefix("wc:").unwrap_or(pairing_uri);
                let rest = rest.trim_start_matches('/');
                format!(
                    "intent://{rest}#Intent;scheme=wc;package={};end",
                    self.profile.android_package
                )
            }
            LinkKind::UniversalLink => {
                format!("{}/wc?uri={}", self.profile.universal_link, encode(pairing_uri))
            }
            LinkKind::GenericScheme => pairing_uri.to_string(),
        }
    }

    fn try_open(&self, kind: &str, link: &str) -> bool {
        match self.opener.open(link) {
            Ok(()) => true,
            Err(e) => {
                // The link embeds the pairing key, so only the kind is logged.
                debug!(kind, error = %e, "wallet link not opened");
                false
            }
        }
    }
}

fn encode(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::testing::RecordingOpener;

    const PAIRING: &str = "wc:7f6e504bfad60b485450578e05678ed3@2?relay-protocol=irn&symKey=587d5484ce2a2a6ee3ba1962fdd7e8588e06200c46823bd18fbd67def96ad303";

    fn resolver(opener: Arc<RecordingOpener>, platform: Platform) -> DeepLinkResolver {
        DeepLinkResolver::new(opener, "biddrop://wc").with_platform(platform)
    }

    #[test]
    fn empty_or_invalid_uri_has_no_effect() {
        let opener = RecordingOpener::accepting(|_| true);
        let resolver = resolver(opener.clone(), Platform::Ios);

        assert_eq!(resolver.attempt_open(""), OpenOutcome::NoEffect);
        assert_eq!(resolver.attempt_open("   "), OpenOutcome::NoEffect);
        assert_eq!(resolver.attempt_open("not a uri"), OpenOutcome::NoEffect);
        assert!(opener.attempts().is_empty());
    }

    #[test]
    fn native_scheme_is_tried_first_with_return_url() {
        let opener = RecordingOpener::accepting(|_| true);
        let outcome = resolver(opener.clone(), Platform::Ios).attempt_open(PAIRING);

        assert_eq!(outcome, OpenOutcome::Opened);
        let attempts = opener.attempts();
        assert_eq!(attempts.len(), 1);
        assert!(attempts[0].starts_with("subwallet://wc?uri=wc%3A7f6e504b"));
        assert!(attempts[0].ends_with("&redirect=biddrop%3A%2F%2Fwc"));
    }

    #[test]
    fn android_tries_intent_before_universal_link() {
        let opener = RecordingOpener::accepting(|url| url.starts_with("https://mobile.subwallet.app"));
        let outcome = resolver(opener.clone(), Platform::Android).attempt_open(PAIRING);

        assert_eq!(outcome, OpenOutcome::Opened);
        let attempts = opener.attempts();
        assert_eq!(attempts.len(), 3);
        assert!(attempts[1].starts_with("intent://7f6e504bfad60b485450578e05678ed3@2?"));
        assert!(attempts[1].ends_with("#Intent;scheme=wc;package=app.subwallet.mobile;end"));
        assert!(attempts[2].starts_with("https://mobile.subwallet.app/wc?uri="));
    }

    #[test]
    fn ios_skips_android_intent() {
        let opener = RecordingOpener::accepting(|url| url == PAIRING);
        let outcome = resolver(opener.clone(), Platform::Ios).attempt_open(PAIRING);

        assert_eq!(outcome, OpenOutcome::Opened);
        let attempts = opener.attempts();
        assert_eq!(attempts.len(), 3);
        assert!(attempts.iter().all(|url| !url.starts_with("intent://")));
        assert_eq!(attempts[2], PAIRING);
    }

    #[test]
    fn falls_back_to_platform_store() {
        let opener = RecordingOpener::accepting(|_| false);
        let outcome = resolver(opener.clone(), Platform::Android).attempt_open(PAIRING);
        assert_eq!(outcome, OpenOutcome::StoreFallback);
        assert_eq!(
            opener.attempts().last().map(String::as_str),
            Some("https://play.google.com/store/apps/details?id=app.subwallet.mobile")
        );

        let opener = RecordingOpener::accepting(|_| false);
        resolver(opener.clone(), Platform::Desktop).attempt_open(PAIRING);
        assert_eq!(
            opener.attempts().last().map(String::as_str),
            Some("https://www.subwallet.app/download.html")
        );
    }

    #[test]
    fn bring_to_front_never_uses_store() {
        let opener = RecordingOpener::accepting(|_| false);
        let outcome = resolver(opener.clone(), Platform::Android).bring_to_front();

        assert_eq!(outcome, OpenOutcome::NoEffect);
        assert_eq!(
            opener.attempts(),
            vec![
                "subwallet://".to_string(),
                "intent://#Intent;package=app.subwallet.mobile;end".to_string(),
                "https://mobile.subwallet.app/".to_string(),
            ]
        );

        let opener = RecordingOpener::accepting(|_| true);
        assert_eq!(
            resolver(opener.clone(), Platform::Ios).bring_to_front(),
            OpenOutcome::Opened
        );
        assert_eq!(opener.attempts(), vec!["subwallet://".to_string()]);
    }
}
