//! Append-only audit trail
//!
//! Every balance- or privilege-affecting operation appends one entry.
//! Entries are never mutated or removed.

use crate::account::AccountId;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    AccountOpened,
    AdminGranted,
    MiningCycleCompleted,
    WelcomeBonusClaimed,
    FingerprintCollision,
    ReferralLinked,
    ReferralActivated,
    ReferralInvalidated,
    ReferralBonusPaid,
    TaskCreated,
    TaskStatusChanged,
    TaskSubmitted,
    TaskVerified,
    TaskRejected,
    CatalogItemAdded,
    CatalogItemToggled,
    NftPurchased,
    NftUpgraded,
    BalanceAdjusted,
    StatusChanged,
    WithdrawalRequested,
    IntegrityFault,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::AccountOpened => "account_opened",
            AuditAction::AdminGranted => "admin_granted",
            AuditAction::MiningCycleCompleted => "mining_cycle_completed",
            AuditAction::WelcomeBonusClaimed => "welcome_bonus_claimed",
            AuditAction::FingerprintCollision => "fingerprint_collision",
            AuditAction::ReferralLinked => "referral_linked",
            AuditAction::ReferralActivated => "referral_activated",
            AuditAction::ReferralInvalidated => "referral_invalidated",
            AuditAction::ReferralBonusPaid => "referral_bonus_paid",
            AuditAction::TaskCreated => "task_created",
            AuditAction::TaskStatusChanged => "task_status_changed",
            AuditAction::TaskSubmitted => "task_submitted",
            AuditAction::TaskVerified => "task_verified",
            AuditAction::TaskRejected => "task_rejected",
            AuditAction::CatalogItemAdded => "catalog_item_added",
            AuditAction::CatalogItemToggled => "catalog_item_toggled",
            AuditAction::NftPurchased => "nft_purchased",
            AuditAction::NftUpgraded => "nft_upgraded",
            AuditAction::BalanceAdjusted => "balance_adjusted",
            AuditAction::StatusChanged => "status_changed",
            AuditAction::WithdrawalRequested => "withdrawal_requested",
            AuditAction::IntegrityFault => "integrity_fault",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: String,
    /// `None` for system actions
    pub actor: Option<AccountId>,
    pub action: AuditAction,
    pub target: Option<AccountId>,
    pub metadata: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl AuditLogEntry {
    pub fn new(action: AuditAction, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            actor: None,
            action,
            target: None,
            metadata: BTreeMap::new(),
            created_at: now,
        }
    }

    pub fn actor(mut self, actor: impl Into<AccountId>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    pub fn target(mut self, target: impl Into<AccountId>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn meta(mut self, key: &str, value: impl ToString) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }
}

#[derive(Default)]
pub struct AuditLog {
    entries: RwLock<Vec<AuditLogEntry>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn restore(entries: Vec<AuditLogEntry>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Append an entry and return its id
    pub fn append(&self, entry: AuditLogEntry) -> String {
        debug!(
            action = %entry.action,
            actor = entry.actor.as_deref().unwrap_or("system"),
            target = entry.target.as_deref().unwrap_or("-"),
            "Audit entry"
        );
        let id = entry.id.clone();
        self.entries.write().push(entry);
        id
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Most recent entries first
    pub fn recent(&self, limit: usize) -> Vec<AuditLogEntry> {
        self.entries.read().iter().rev().take(limit).cloned().collect()
    }

    /// Entries where the account is actor or target, oldest first
    pub fn for_account(&self, account: &str) -> Vec<AuditLogEntry> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.actor.as_deref() == Some(account) || e.target.as_deref() == Some(account))
            .cloned()
            .collect()
    }

    pub fn count_action(&self, action: AuditAction) -> usize {
        self.entries
            .read()
            .iter()
            .filter(|e| e.action == action)
            .count()
    }

    pub fn snapshot(&self) -> Vec<AuditLogEntry> {
        self.entries.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_query() {
        let log = AuditLog::new();
        let now = Utc::now();

        log.append(
            AuditLogEntry::new(AuditAction::BalanceAdjusted, now)
                .actor("admin")
                .target("alice")
                .meta("prior", 100)
                .meta("result", 200),
        );
        log.append(AuditLogEntry::new(AuditAction::MiningCycleCompleted, now).target("bob"));

        assert_eq!(log.len(), 2);
        assert_eq!(log.recent(1)[0].action, AuditAction::MiningCycleCompleted);

        let alice = log.for_account("alice");
        assert_eq!(alice.len(), 1);
        assert_eq!(alice[0].metadata.get("prior").map(String::as_str), Some("100"));
        assert_eq!(log.for_account("admin").len(), 1);
        assert_eq!(log.count_action(AuditAction::BalanceAdjusted), 1);
    }

    #[test]
    fn test_action_serializes_as_tag() {
        let json = serde_json::to_string(&AuditAction::NftUpgraded).unwrap();
        assert_eq!(json, "\"nft_upgraded\"");
        assert_eq!(AuditAction::NftUpgraded.to_string(), "nft_upgraded");
    }
}
