//! Economy configuration
//!
//! Every field has a default so a partial `[economy]` table is enough.

use crate::error::{EconomyError, Result};
use chrono::Duration;
use points_core::{
    AccountId, NftTier, MINING_COOLDOWN_SECS, MINING_CYCLE_REWARD, POINT_SCALE,
    REFERRAL_FIRST_MINING_BONUS, REFERRAL_SIGNUP_BONUS, STREAK_WINDOW_SECS, WELCOME_BONUS,
    WELCOME_WINDOW_SECS,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// What to do when a device fingerprint shows up on a second account
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FingerprintPolicy {
    Allow,
    #[default]
    Flag,
    Block,
}

/// Balance change applied when upgrading `from` units into one `to` unit.
/// A negative delta is a cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeRule {
    pub from: NftTier,
    pub to: NftTier,
    pub delta: i64,
}

fn default_upgrade_rules() -> Vec<UpgradeRule> {
    let scale = POINT_SCALE as i64;
    vec![
        UpgradeRule {
            from: NftTier::Basic,
            to: NftTier::Silver,
            delta: -50 * scale,
        },
        UpgradeRule {
            from: NftTier::Silver,
            to: NftTier::Gold,
            delta: -150 * scale,
        },
        UpgradeRule {
            from: NftTier::Gold,
            to: NftTier::Diamond,
            delta: -400 * scale,
        },
        UpgradeRule {
            from: NftTier::Diamond,
            to: NftTier::Legendary,
            delta: -1000 * scale,
        },
    ]
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    pub mining_reward: u64,
    pub mining_cooldown_secs: i64,
    pub streak_window_secs: i64,
    pub welcome_bonus: u64,
    pub welcome_window_secs: i64,
    pub referral_signup_bonus: u64,
    pub referral_first_mining_bonus: u64,
    pub fingerprint_policy: FingerprintPolicy,
    pub upgrade_rules: Vec<UpgradeRule>,
    /// Accounts granted admin rights when they register
    pub bootstrap_admins: Vec<AccountId>,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            mining_reward: MINING_CYCLE_REWARD,
            mining_cooldown_secs: MINING_COOLDOWN_SECS,
            streak_window_secs: STREAK_WINDOW_SECS,
            welcome_bonus: WELCOME_BONUS,
            welcome_window_secs: WELCOME_WINDOW_SECS,
            referral_signup_bonus: REFERRAL_SIGNUP_BONUS,
            referral_first_mining_bonus: REFERRAL_FIRST_MINING_BONUS,
            fingerprint_policy: FingerprintPolicy::default(),
            upgrade_rules: default_upgrade_rules(),
            bootstrap_admins: Vec::new(),
        }
    }
}

impl EconomyConfig {
    pub fn validate(&self) -> Result<()> {
        if self.mining_reward == 0 {
            return Err(EconomyError::InvalidConfig(
                "mining_reward must be positive".to_string(),
            ));
        }
        if self.mining_cooldown_secs <= 0 {
            return Err(EconomyError::InvalidConfig(
                "mining_cooldown_secs must be positive".to_string(),
            ));
        }
        if self.streak_window_secs < self.mining_cooldown_secs {
            return Err(EconomyError::InvalidConfig(
                "streak_window_secs must not be shorter than the cooldown".to_string(),
            ));
        }
        if self.welcome_window_secs < 0 {
            return Err(EconomyError::InvalidConfig(
                "welcome_window_secs must not be negative".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for rule in &self.upgrade_rules {
            if rule.from.next() != Some(rule.to) {
                return Err(EconomyError::InvalidConfig(format!(
                    "upgrade rule {} -> {} skips a tier",
                    rule.from, rule.to
                )));
            }
            if !seen.insert(rule.from) {
                return Err(EconomyError::InvalidConfig(format!(
                    "duplicate upgrade rule for {}",
                    rule.from
                )));
            }
        }
        Ok(())
    }

    pub fn cooldown(&self) -> Duration {
        Duration::seconds(self.mining_cooldown_secs)
    }

    pub fn streak_window(&self) -> Duration {
        Duration::seconds(self.streak_window_secs)
    }

    pub fn welcome_window(&self) -> Duration {
        Duration::seconds(self.welcome_window_secs)
    }

    pub fn upgrade_rule(&self, from: NftTier, to: NftTier) -> Option<UpgradeRule> {
        self.upgrade_rules
            .iter()
            .copied()
            .find(|rule| rule.from == from && rule.to == to)
    }

    pub fn is_bootstrap_admin(&self, account: &str) -> bool {
        self.bootstrap_admins.iter().any(|a| a == account)
    }
}
