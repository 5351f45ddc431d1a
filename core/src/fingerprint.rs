//! Device fingerprinting
//!
//! A fingerprint is a SHA-256 over browser/device signals. It is an
//! anti-abuse signal for spotting one device driving several accounts, not an
//! identity. Missing optional signals are replaced by fixed sentinels so the
//! hash stays stable.

use crate::account::AccountId;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

const UNKNOWN: &str = "unknown";
const NO_CANVAS: &str = "no-canvas";
const NO_WEBGL: &str = "no-webgl";

/// Length of a hex-encoded fingerprint
pub const FINGERPRINT_HEX_LEN: usize = 64;

/// Raw signals collected by the client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSignals {
    pub user_agent: String,
    pub screen_width: u32,
    pub screen_height: u32,
    pub color_depth: u32,
    pub timezone: String,
    pub language: String,
    pub platform: String,
    pub hardware_concurrency: Option<u32>,
    pub device_memory: Option<f32>,
    /// Data URL of a rendered canvas
    pub canvas: Option<String>,
    /// GPU renderer string
    pub webgl_renderer: Option<String>,
}

fn or_unknown(value: &str) -> &str {
    if value.trim().is_empty() {
        UNKNOWN
    } else {
        value
    }
}

/// Normalize a client-presented fingerprint: exactly
/// [`FINGERPRINT_HEX_LEN`] ASCII hex digits, returned lower-cased.
/// Anything else yields `None`.
pub fn parse_fingerprint(hash: &str) -> Option<String> {
    let hash = hash.trim();
    if hash.len() == FINGERPRINT_HEX_LEN && hash.bytes().all(|b| b.is_ascii_hexdigit()) {
        Some(hash.to_ascii_lowercase())
    } else {
        None
    }
}

/// Deterministic 64-char hex fingerprint of the given signals
pub fn compute_fingerprint(signals: &DeviceSignals) -> String {
    let cores = signals
        .hardware_concurrency
        .map(|c| c.to_string())
        .unwrap_or_else(|| UNKNOWN.to_string());
    let memory = signals
        .device_memory
        .map(|m| m.to_string())
        .unwrap_or_else(|| UNKNOWN.to_string());
    let canvas = signals
        .canvas
        .as_deref()
        .filter(|c| !c.is_empty())
        .unwrap_or(NO_CANVAS);
    let webgl = signals
        .webgl_renderer
        .as_deref()
        .filter(|r| !r.is_empty())
        .unwrap_or(NO_WEBGL);

    let components = [
        or_unknown(&signals.user_agent).to_string(),
        format!(
            "{}x{}x{}",
            signals.screen_width, signals.screen_height, signals.color_depth
        ),
        or_unknown(&signals.timezone).to_string(),
        or_unknown(&signals.language).to_string(),
        or_unknown(&signals.platform).to_string(),
        cores,
        memory,
        canvas.to_string(),
        webgl.to_string(),
    ];

    let mut hasher = Sha256::new();
    hasher.update(components.join("|").as_bytes());
    hex::encode(hasher.finalize())
}

/// Browser details stored alongside a fingerprint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserInfo {
    pub user_agent: String,
    pub platform: String,
    pub language: String,
    pub timezone: String,
    pub screen: String,
}

impl From<&DeviceSignals> for BrowserInfo {
    fn from(signals: &DeviceSignals) -> Self {
        Self {
            user_agent: signals.user_agent.clone(),
            platform: signals.platform.clone(),
            language: signals.language.clone(),
            timezone: signals.timezone.clone(),
            screen: format!("{}x{}", signals.screen_width, signals.screen_height),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFingerprint {
    pub hash: String,
    pub browser_info: BrowserInfo,
    /// The account that first presented this hash
    pub account_id: AccountId,
    pub seen_accounts: Vec<AccountId>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub is_trusted: bool,
}

/// Result of recording a fingerprint sighting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintObservation {
    pub first_account: AccountId,
    pub is_new: bool,
    /// The hash is bound to a different account
    pub collision: bool,
}

#[derive(Default)]
pub struct FingerprintRegistry {
    entries: DashMap<String, DeviceFingerprint>,
}

impl FingerprintRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn restore(fingerprints: Vec<DeviceFingerprint>) -> Self {
        let registry = Self::new();
        for fp in fingerprints {
            registry.entries.insert(fp.hash.clone(), fp);
        }
        registry
    }

    /// Record that `account` presented `hash`
    pub fn observe(
        &self,
        hash: &str,
        account: &str,
        browser_info: BrowserInfo,
        now: DateTime<Utc>,
    ) -> FingerprintObservation {
        match self.entries.entry(hash.to_string()) {
            Entry::Occupied(mut slot) => {
                let fp = slot.get_mut();
                fp.last_seen = now;
                fp.browser_info = browser_info;
                if !fp.seen_accounts.iter().any(|a| a == account) {
                    fp.seen_accounts.push(account.to_string());
                }
                let collision = fp.account_id != account;
                if collision {
                    warn!(
                        fingerprint = %short(hash),
                        first_account = %fp.account_id,
                        account = %account,
                        "Fingerprint shared between accounts"
                    );
                }
                FingerprintObservation {
                    first_account: fp.account_id.clone(),
                    is_new: false,
                    collision,
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(DeviceFingerprint {
                    hash: hash.to_string(),
                    browser_info,
                    account_id: account.to_string(),
                    seen_accounts: vec![account.to_string()],
                    first_seen: now,
                    last_seen: now,
                    is_trusted: true,
                });
                FingerprintObservation {
                    first_account: account.to_string(),
                    is_new: true,
                    collision: false,
                }
            }
        }
    }

    /// The owning account if the hash is bound to someone other than `account`
    pub fn bound_elsewhere(&self, hash: &str, account: &str) -> Option<AccountId> {
        self.entries
            .get(hash)
            .filter(|fp| fp.account_id != account)
            .map(|fp| fp.account_id.clone())
    }

    pub fn mark_untrusted(&self, hash: &str) {
        if let Some(mut fp) = self.entries.get_mut(hash) {
            fp.is_trusted = false;
        }
    }

    pub fn is_trusted(&self, hash: &str) -> bool {
        self.entries.get(hash).map(|fp| fp.is_trusted).unwrap_or(true)
    }

    pub fn lookup(&self, hash: &str) -> Option<DeviceFingerprint> {
        self.entries.get(hash).map(|fp| fp.clone())
    }

    pub fn accounts_for(&self, hash: &str) -> Vec<AccountId> {
        self.entries
            .get(hash)
            .map(|fp| fp.seen_accounts.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn snapshot(&self) -> Vec<DeviceFingerprint> {
        let mut all: Vec<DeviceFingerprint> =
            self.entries.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.first_seen.cmp(&b.first_seen).then(a.hash.cmp(&b.hash)));
        all
    }
}

/// First 16 characters, cut on a char boundary
fn short(hash: &str) -> &str {
    match hash.char_indices().nth(16) {
        Some((end, _)) => &hash[..end],
        None => hash,
    }
}
