//! Referral engine
//!
//! Each referral row has its own lock. Bonus latches are checked and set
//! while that lock is held, and the referrer credit goes through the ledger
//! inside the same section, so lock order is always row -> account.

use crate::config::EconomyConfig;
use crate::error::{EconomyError, Result};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use points_core::{AccountId, AuditAction, AuditLog, AuditLogEntry, LedgerStore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferralStatus {
    Pending,
    Active,
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Referral {
    pub id: String,
    pub referrer: AccountId,
    pub referred: AccountId,
    pub signup_bonus_paid: bool,
    pub first_mining_bonus_paid: bool,
    pub status: ReferralStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EarningType {
    Signup,
    Mining,
    Bonus,
}

impl fmt::Display for EarningType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EarningType::Signup => write!(f, "signup"),
            EarningType::Mining => write!(f, "mining"),
            EarningType::Bonus => write!(f, "bonus"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralEarning {
    pub id: String,
    pub referral_id: String,
    /// The referrer
    pub beneficiary: AccountId,
    /// The referred account whose action produced the earning
    pub source: AccountId,
    pub amount: u64,
    pub earning_type: EarningType,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralStats {
    pub total_referrals: usize,
    pub active_referrals: usize,
    pub pending_referrals: usize,
    pub total_referral_earnings: u64,
}

type ReferralCell = Arc<Mutex<Referral>>;

pub struct ReferralEngine {
    config: Arc<EconomyConfig>,
    ledger: Arc<LedgerStore>,
    audit: Arc<AuditLog>,
    rows: DashMap<String, ReferralCell>,
    /// referred account -> referral id
    by_referred: DashMap<AccountId, String>,
    earnings: RwLock<Vec<ReferralEarning>>,
}

impl ReferralEngine {
    pub fn new(config: Arc<EconomyConfig>, ledger: Arc<LedgerStore>, audit: Arc<AuditLog>) -> Self {
        Self {
            config,
            ledger,
            audit,
            rows: DashMap::new(),
            by_referred: DashMap::new(),
            earnings: RwLock::new(Vec::new()),
        }
    }

    pub fn restore(
        config: Arc<EconomyConfig>,
        ledger: Arc<LedgerStore>,
        audit: Arc<AuditLog>,
        referrals: Vec<Referral>,
        earnings: Vec<ReferralEarning>,
    ) -> Self {
        let engine = Self::new(config, ledger, audit);
        for referral in referrals {
            engine
                .by_referred
                .insert(referral.referred.clone(), referral.id.clone());
            engine
                .rows
                .insert(referral.id.clone(), Arc::new(Mutex::new(referral)));
        }
        *engine.earnings.write() = earnings;
        engine
    }

    /// Resolve a referral code to the referrer's account id
    pub fn resolve_code(&self, code: &str) -> Result<AccountId> {
        self.ledger
            .find_by_referral_code(code)
            .ok_or_else(|| EconomyError::InvalidReferral(format!("unknown code {}", code.trim())))
    }

    /// Create a pending referral from the owner of `referrer_code` to `referred`
    pub fn link(&self, referrer_code: &str, referred: &str, now: DateTime<Utc>) -> Result<Referral> {
        let referrer = self.resolve_code(referrer_code)?;
        if referrer == referred {
            return Err(EconomyError::InvalidReferral(
                "an account cannot refer itself".to_string(),
            ));
        }

        let referral = match self.by_referred.entry(referred.to_string()) {
            Entry::Occupied(_) => {
                return Err(EconomyError::InvalidReferral(format!(
                    "{} already has a referrer",
                    referred
                )))
            }
            Entry::Vacant(slot) => {
                self.ledger.transact(referred, |book| {
                    if book.account.referred_by.is_some() {
                        return Err(EconomyError::InvalidReferral(format!(
                            "{} already has a referrer",
                            referred
                        )));
                    }
                    book.account.referred_by = Some(referrer.clone());
                    book.account.updated_at = now;
                    Ok(())
                })?;

                let referral = Referral {
                    id: Uuid::new_v4().to_string(),
                    referrer: referrer.clone(),
                    referred: referred.to_string(),
                    signup_bonus_paid: false,
                    first_mining_bonus_paid: false,
                    status: ReferralStatus::Pending,
                    created_at: now,
                    updated_at: now,
                };
                self.rows
                    .insert(referral.id.clone(), Arc::new(Mutex::new(referral.clone())));
                slot.insert(referral.id.clone());
                referral
            }
        };

        self.audit.append(
            AuditLogEntry::new(AuditAction::ReferralLinked, now)
                .actor(referred)
                .target(referrer.as_str())
                .meta("referral_id", &referral.id),
        );
        info!(referrer = %referrer, referred = %referred, "Referral linked");
        Ok(referral)
    }

    fn cell(&self, referral_id: &str) -> Result<ReferralCell> {
        self.rows
            .get(referral_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| EconomyError::ReferralNotFound(referral_id.to_string()))
    }

    /// Move a pending referral to active (paying the signup bonus) or invalid.
    /// Non-pending referrals are returned unchanged.
    pub fn activate(
        &self,
        referral_id: &str,
        referred_is_valid: bool,
        now: DateTime<Utc>,
    ) -> Result<Referral> {
        let cell = self.cell(referral_id)?;
        let mut row = cell.lock();
        if row.status != ReferralStatus::Pending {
            return Ok(row.clone());
        }

        let mut staged = row.clone();
        staged.updated_at = now;

        if !referred_is_valid {
            staged.status = ReferralStatus::Invalid;
            *row = staged.clone();
            self.audit.append(
                AuditLogEntry::new(AuditAction::ReferralInvalidated, now)
                    .actor(staged.referred.as_str())
                    .target(staged.referrer.as_str())
                    .meta("referral_id", &staged.id),
            );
            info!(referral = %staged.id, "Referral marked invalid");
            return Ok(staged);
        }

        staged.status = ReferralStatus::Active;
        if !staged.signup_bonus_paid {
            self.pay(&staged, EarningType::Signup, self.config.referral_signup_bonus, None, now)?;
            staged.signup_bonus_paid = true;
        }
        *row = staged.clone();

        self.audit.append(
            AuditLogEntry::new(AuditAction::ReferralActivated, now)
                .actor(staged.referred.as_str())
                .target(staged.referrer.as_str())
                .meta("referral_id", &staged.id),
        );
        Ok(staged)
    }

    /// Pay the referrer's first-mining bonus for `referred`, at most once.
    /// Returns the earning when a payment was made.
    pub fn pay_first_mining_bonus(
        &self,
        referred: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ReferralEarning>> {
        let Some(referral_id) = self.by_referred.get(referred).map(|e| e.value().clone()) else {
            return Ok(None);
        };
        let cell = self.cell(&referral_id)?;
        let mut row = cell.lock();
        if row.status != ReferralStatus::Active || row.first_mining_bonus_paid {
            return Ok(None);
        }

        let earning = self.pay(
            &row,
            EarningType::Mining,
            self.config.referral_first_mining_bonus,
            None,
            now,
        )?;
        row.first_mining_bonus_paid = true;
        row.updated_at = now;
        Ok(earning)
    }

    /// Discretionary bonus credited to the referrer of `referral_id`
    pub fn grant_bonus(
        &self,
        referral_id: &str,
        amount: u64,
        actor: &str,
        now: DateTime<Utc>,
    ) -> Result<ReferralEarning> {
        if amount == 0 {
            return Err(EconomyError::InvalidInput(
                "bonus amount must be positive".to_string(),
            ));
        }
        let cell = self.cell(referral_id)?;
        let mut row = cell.lock();
        if row.status != ReferralStatus::Active {
            return Err(EconomyError::InvalidReferral(format!(
                "referral {} is not active",
                referral_id
            )));
        }
        let earning = self
            .pay(&row, EarningType::Bonus, amount, Some(actor), now)?
            .ok_or_else(|| EconomyError::Integrity("bonus payment not recorded".to_string()))?;
        row.updated_at = now;
        Ok(earning)
    }

    /// Credit the referrer and record the earning. Must be called with the
    /// referral row locked.
    fn pay(
        &self,
        referral: &Referral,
        earning_type: EarningType,
        amount: u64,
        actor: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Option<ReferralEarning>> {
        if amount == 0 {
            debug!(referral = %referral.id, %earning_type, "Zero referral bonus configured");
            return Ok(None);
        }

        let new_balance = self.ledger.credit(&referral.referrer, amount)?;
        let earning = ReferralEarning {
            id: Uuid::new_v4().to_string(),
            referral_id: referral.id.clone(),
            beneficiary: referral.referrer.clone(),
            source: referral.referred.clone(),
            amount,
            earning_type,
            created_at: now,
        };
        self.earnings.write().push(earning.clone());

        let mut entry = AuditLogEntry::new(AuditAction::ReferralBonusPaid, now)
            .target(referral.referrer.as_str())
            .meta("referral_id", &referral.id)
            .meta("earning_type", earning_type)
            .meta("amount", amount)
            .meta("new_balance", new_balance);
        if let Some(actor) = actor {
            entry = entry.actor(actor);
        }
        self.audit.append(entry);

        info!(
            referrer = %referral.referrer,
            referred = %referral.referred,
            %earning_type,
            amount,
            "Referral bonus paid"
        );
        Ok(Some(earning))
    }

    pub fn get(&self, referral_id: &str) -> Option<Referral> {
        self.cell(referral_id).ok().map(|cell| cell.lock().clone())
    }

    /// The referral under which `referred` joined, if any
    pub fn referral_for(&self, referred: &str) -> Option<Referral> {
        let id = self.by_referred.get(referred).map(|e| e.value().clone())?;
        self.get(&id)
    }

    /// Referrals made by `referrer`, oldest first
    pub fn referrals_of(&self, referrer: &str) -> Vec<Referral> {
        let mut out: Vec<Referral> = self
            .all_cells()
            .iter()
            .map(|cell| cell.lock().clone())
            .filter(|r| r.referrer == referrer)
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        out
    }

    pub fn earnings_of(&self, beneficiary: &str) -> Vec<ReferralEarning> {
        self.earnings
            .read()
            .iter()
            .filter(|e| e.beneficiary == beneficiary)
            .cloned()
            .collect()
    }

    pub fn stats(&self, referrer: &str) -> ReferralStats {
        let referrals = self.referrals_of(referrer);
        ReferralStats {
            total_referrals: referrals.len(),
            active_referrals: referrals
                .iter()
                .filter(|r| r.status == ReferralStatus::Active)
                .count(),
            pending_referrals: referrals
                .iter()
                .filter(|r| r.status == ReferralStatus::Pending)
                .count(),
            total_referral_earnings: self
                .earnings_of(referrer)
                .iter()
                .fold(0u64, |acc, e| acc.saturating_add(e.amount)),
        }
    }

    fn all_cells(&self) -> Vec<ReferralCell> {
        self.rows.iter().map(|e| e.value().clone()).collect()
    }

    pub fn snapshot(&self) -> (Vec<Referral>, Vec<ReferralEarning>) {
        let mut referrals: Vec<Referral> = self
            .all_cells()
            .iter()
            .map(|cell| cell.lock().clone())
            .collect();
        referrals.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        (referrals, self.earnings.read().clone())
    }
}
