//! Point-in-time copy of every economy table

use crate::marketplace::NftCatalogItem;
use crate::mining::MiningSession;
use crate::referral::{Referral, ReferralEarning};
use crate::tasks::{Task, TaskSubmission};
use chrono::{DateTime, Utc};
use points_core::{AccountBook, AuditLogEntry, DeviceFingerprint};
use serde::{Deserialize, Serialize};

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomySnapshot {
    pub version: u32,
    pub taken_at: DateTime<Utc>,
    /// Accounts with their inventories
    pub accounts: Vec<AccountBook>,
    pub mining_sessions: Vec<MiningSession>,
    pub referrals: Vec<Referral>,
    pub referral_earnings: Vec<ReferralEarning>,
    pub tasks: Vec<Task>,
    pub task_submissions: Vec<TaskSubmission>,
    pub catalog: Vec<NftCatalogItem>,
    pub audit_log: Vec<AuditLogEntry>,
    pub fingerprints: Vec<DeviceFingerprint>,
}

impl EconomySnapshot {
    pub fn total_balance(&self) -> u64 {
        self.accounts
            .iter()
            .fold(0u64, |acc, book| acc.saturating_add(book.balance()))
    }
}
