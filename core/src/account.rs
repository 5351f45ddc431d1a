//! Account records

use crate::constants::REFERRAL_CODE_LEN;
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use rand::{distr::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque identifier issued by the identity provider
pub type AccountId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    Suspended,
    Banned,
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountStatus::Active => write!(f, "active"),
            AccountStatus::Suspended => write!(f, "suspended"),
            AccountStatus::Banned => write!(f, "banned"),
        }
    }
}

impl FromStr for AccountStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Ok(AccountStatus::Active),
            "suspended" => Ok(AccountStatus::Suspended),
            "banned" => Ok(AccountStatus::Banned),
            other => Err(format!("unknown account status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub display_name: String,
    /// Only `AccountBook::adjust` may change this
    balance: u64,
    pub total_mined: u64,
    pub mining_count: u64,
    pub last_mining_at: Option<DateTime<Utc>>,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub referral_code: String,
    pub referred_by: Option<AccountId>,
    pub status: AccountStatus,
    pub welcome_bonus_claimed: bool,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn new(
        id: AccountId,
        display_name: String,
        referral_code: String,
        now: DateTime<Utc>,
    ) -> Self {
        Account {
            id,
            display_name,
            balance: 0,
            total_mined: 0,
            mining_count: 0,
            last_mining_at: None,
            current_streak: 0,
            longest_streak: 0,
            referral_code,
            referred_by: None,
            status: AccountStatus::Active,
            welcome_bonus_claimed: false,
            is_admin: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn balance(&self) -> u64 {
        self.balance
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    /// Apply a signed delta, refusing to go below zero or overflow
    pub(crate) fn apply_delta(&mut self, delta: i64) -> Result<u64> {
        let magnitude = delta.unsigned_abs();
        let next = if delta >= 0 {
            self.balance
                .checked_add(magnitude)
                .ok_or(LedgerError::Overflow)?
        } else {
            if self.balance < magnitude {
                return Err(LedgerError::InsufficientFunds {
                    balance: self.balance,
                    requested: magnitude,
                });
            }
            self.balance - magnitude
        };
        self.balance = next;
        Ok(next)
    }
}

/// Random upper-case alphanumeric referral code
pub fn generate_referral_code() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(REFERRAL_CODE_LEN)
        .map(char::from)
        .collect::<String>()
        .to_ascii_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account() -> Account {
        Account::new(
            "alice".to_string(),
            "Alice".to_string(),
            "ALICE001".to_string(),
            Utc::now(),
        )
    }

    #[test]
    fn test_new_account_defaults() {
        let acc = account();
        assert_eq!(acc.balance(), 0);
        assert!(acc.is_active());
        assert!(!acc.welcome_bonus_claimed);
        assert!(acc.last_mining_at.is_none());
    }

    #[test]
    fn test_apply_delta() {
        let mut acc = account();
        assert_eq!(acc.apply_delta(500).unwrap(), 500);
        assert_eq!(acc.apply_delta(-200).unwrap(), 300);

        let err = acc.apply_delta(-301).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientFunds {
                balance: 300,
                requested: 301
            }
        );
        assert_eq!(acc.balance(), 300);
    }

    #[test]
    fn test_apply_delta_overflow() {
        let mut acc = account();
        acc.apply_delta(i64::MAX).unwrap();
        acc.apply_delta(i64::MAX).unwrap();
        assert_eq!(acc.apply_delta(i64::MAX), Err(LedgerError::Overflow));
    }

    #[test]
    fn test_status_round_trip() {
        assert_eq!("Suspended".parse::<AccountStatus>(), Ok(AccountStatus::Suspended));
        assert!("deleted".parse::<AccountStatus>().is_err());
        assert_eq!(AccountStatus::Banned.to_string(), "banned");
    }

    #[test]
    fn test_generate_referral_code() {
        let code = generate_referral_code();
        assert_eq!(code.len(), REFERRAL_CODE_LEN);
        assert!(code
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_uppercase()));
    }
}
