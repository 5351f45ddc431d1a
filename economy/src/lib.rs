//! Points Economy
//!
//! The mutators that move balances (mining, referrals, tasks, marketplace,
//! admin overrides) and the `Economy` facade that sequences them.

pub mod admin;
pub mod config;
pub mod error;
pub mod identity;
pub mod marketplace;
pub mod mining;
pub mod referral;
pub mod snapshot;
pub mod tasks;
pub mod withdrawal;

pub use admin::{authorize_admin, AdminConsole};
pub use config::{EconomyConfig, FingerprintPolicy, UpgradeRule};
pub use error::{EconomyError, ErrorKind, Result};
pub use identity::{IdentityProvider, StaticTokenIdentity};
pub use marketplace::{Marketplace, NftCatalogItem, PurchaseOutcome, UpgradeOutcome};
pub use mining::{
    MiningManager, MiningOutcome, MiningRequest, MiningSession, MiningState, MiningStatus,
    WelcomeBonus,
};
pub use referral::{
    EarningType, Referral, ReferralEarning, ReferralEngine, ReferralStats, ReferralStatus,
};
pub use snapshot::{EconomySnapshot, SNAPSHOT_VERSION};
pub use tasks::{
    CheckOutcome, MembershipCheck, NewTask, ReviewDecision, SubmissionStatus, Task, TaskBoard,
    TaskStatus, TaskSubmission, TaskType, UnavailableCheck, VerificationType,
};
pub use withdrawal::{LockedWithdrawals, WithdrawalError, WithdrawalGateway, WithdrawalTicket};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use points_core::account::generate_referral_code;
use points_core::{
    parse_fingerprint, Account, AccountId, AccountStatus, AuditAction, AuditLog, AuditLogEntry,
    BrowserInfo, FingerprintRegistry, LedgerError, LedgerStore, NftTier, UserNft,
};
use std::sync::Arc;
use tracing::{error, info, warn};

const MAX_DISPLAY_NAME_LEN: usize = 64;
const REFERRAL_CODE_ATTEMPTS: usize = 16;

/// Registration request
#[derive(Debug, Clone, Default)]
pub struct NewAccount {
    pub account_id: AccountId,
    pub display_name: String,
    pub referral_code: Option<String>,
    /// Device fingerprint presented at signup, used to vet the referral
    pub fingerprint_hash: Option<String>,
}

/// The economy engine: shared stores plus every mutator.
///
/// Mutators hold `gate` shared for their whole synchronous section;
/// `snapshot` holds it exclusively, so a snapshot never sees one store
/// updated and another not.
pub struct Economy {
    config: Arc<EconomyConfig>,
    ledger: Arc<LedgerStore>,
    audit: Arc<AuditLog>,
    fingerprints: Arc<FingerprintRegistry>,
    mining: MiningManager,
    referrals: ReferralEngine,
    tasks: TaskBoard,
    marketplace: Marketplace,
    admin: AdminConsole,
    withdrawals: Box<dyn WithdrawalGateway>,
    membership: Arc<dyn MembershipCheck>,
    gate: RwLock<()>,
}

impl Economy {
    pub fn new(config: EconomyConfig) -> Result<Self> {
        config.validate()?;
        let snapshot = EconomySnapshot {
            version: SNAPSHOT_VERSION,
            taken_at: Utc::now(),
            accounts: Vec::new(),
            mining_sessions: Vec::new(),
            referrals: Vec::new(),
            referral_earnings: Vec::new(),
            tasks: Vec::new(),
            task_submissions: Vec::new(),
            catalog: Vec::new(),
            audit_log: Vec::new(),
            fingerprints: Vec::new(),
        };
        Self::restore(config, snapshot)
    }

    /// Rebuild an economy from a snapshot
    pub fn restore(config: EconomyConfig, snapshot: EconomySnapshot) -> Result<Self> {
        config.validate()?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(EconomyError::Integrity(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }

        let config = Arc::new(config);
        let ledger = Arc::new(LedgerStore::restore(snapshot.accounts)?);
        let audit = Arc::new(AuditLog::restore(snapshot.audit_log));
        let fingerprints = Arc::new(FingerprintRegistry::restore(snapshot.fingerprints));

        let economy = Self {
            mining: MiningManager::restore(
                config.clone(),
                ledger.clone(),
                audit.clone(),
                fingerprints.clone(),
                snapshot.mining_sessions,
            ),
            referrals: ReferralEngine::restore(
                config.clone(),
                ledger.clone(),
                audit.clone(),
                snapshot.referrals,
                snapshot.referral_earnings,
            ),
            tasks: TaskBoard::restore(
                ledger.clone(),
                audit.clone(),
                snapshot.tasks,
                snapshot.task_submissions,
            ),
            marketplace: Marketplace::restore(
                config.clone(),
                ledger.clone(),
                audit.clone(),
                snapshot.catalog,
            ),
            admin: AdminConsole::new(ledger.clone(), audit.clone()),
            withdrawals: Box::new(LockedWithdrawals),
            membership: Arc::new(UnavailableCheck),
            gate: RwLock::new(()),
            config,
            ledger,
            audit,
            fingerprints,
        };
        info!(
            accounts = economy.ledger.len(),
            audit_entries = economy.audit.len(),
            "Economy ready"
        );
        Ok(economy)
    }

    pub fn with_membership_check(mut self, check: Arc<dyn MembershipCheck>) -> Self {
        self.membership = check;
        self
    }

    pub fn with_withdrawal_gateway(mut self, gateway: Box<dyn WithdrawalGateway>) -> Self {
        self.withdrawals = gateway;
        self
    }

    pub fn config(&self) -> &EconomyConfig {
        &self.config
    }

    pub fn ledger(&self) -> &LedgerStore {
        &self.ledger
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn fingerprints(&self) -> &FingerprintRegistry {
        &self.fingerprints
    }

    /// Integrity faults are logged and recorded before being returned
    fn observe<T>(&self, operation: &str, result: Result<T>) -> Result<T> {
        if let Err(EconomyError::Integrity(detail)) = &result {
            error!(operation, detail = %detail, "Integrity fault");
            self.audit.append(
                AuditLogEntry::new(AuditAction::IntegrityFault, Utc::now())
                    .meta("operation", operation)
                    .meta("detail", detail),
            );
        }
        result
    }

    // ----- accounts -----

    pub fn register_account(&self, new: NewAccount, now: DateTime<Utc>) -> Result<Account> {
        let _gate = self.gate.read();
        let result = self.register_inner(new, now);
        self.observe("register_account", result)
    }

    fn register_inner(&self, new: NewAccount, now: DateTime<Utc>) -> Result<Account> {
        let account_id = new.account_id.trim().to_string();
        if account_id.is_empty() {
            return Err(EconomyError::InvalidInput("account id is required".to_string()));
        }
        let display_name = new.display_name.trim().to_string();
        if display_name.is_empty() || display_name.chars().count() > MAX_DISPLAY_NAME_LEN {
            return Err(EconomyError::InvalidInput(format!(
                "display name must be 1 to {} characters",
                MAX_DISPLAY_NAME_LEN
            )));
        }
        let fingerprint = match new.fingerprint_hash.as_deref().map(str::trim) {
            Some(hash) if !hash.is_empty() => Some(parse_fingerprint(hash).ok_or_else(|| {
                EconomyError::InvalidInput("fingerprint_hash must be 64 hex characters".to_string())
            })?),
            _ => None,
        };
        if self.ledger.exists(&account_id) {
            return Err(EconomyError::AccountExists(account_id));
        }

        let referral_code = new
            .referral_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty());
        if let Some(code) = referral_code {
            self.referrals.resolve_code(code)?;
        }

        self.open_with_fresh_code(&account_id, &display_name, now)?;

        if self.config.is_bootstrap_admin(&account_id) {
            self.ledger.transact(&account_id, |book| {
                book.account.is_admin = true;
                Ok::<_, EconomyError>(())
            })?;
            self.audit.append(
                AuditLogEntry::new(AuditAction::AdminGranted, now)
                    .target(account_id.as_str())
                    .meta("source", "bootstrap"),
            );
            info!(account = %account_id, "Bootstrap admin registered");
        }

        self.audit.append(
            AuditLogEntry::new(AuditAction::AccountOpened, now)
                .actor(account_id.as_str())
                .target(account_id.as_str()),
        );

        let collision = match fingerprint.as_deref() {
            Some(hash) => {
                self.fingerprints
                    .observe(hash, &account_id, BrowserInfo::default(), now)
                    .collision
            }
            None => false,
        };

        if let Some(code) = referral_code {
            match self.referrals.link(code, &account_id, now) {
                Ok(referral) => {
                    let valid =
                        !collision || self.config.fingerprint_policy == FingerprintPolicy::Allow;
                    let activated = self.referrals.activate(&referral.id, valid, now);
                    if let Err(err) = self.observe("activate_referral", activated) {
                        warn!(
                            account = %account_id,
                            referral = %referral.id,
                            error = %err,
                            "Referral left pending"
                        );
                    }
                }
                Err(err) => {
                    warn!(account = %account_id, error = %err, "Referral could not be linked");
                }
            }
        }

        self.account(&account_id)
    }

    fn open_with_fresh_code(
        &self,
        account_id: &str,
        display_name: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        for _ in 0..REFERRAL_CODE_ATTEMPTS {
            let account = Account::new(
                account_id.to_string(),
                display_name.to_string(),
                generate_referral_code(),
                now,
            );
            match self.ledger.open_account(account) {
                Ok(()) => return Ok(()),
                Err(LedgerError::DuplicateReferralCode(_)) => continue,
                Err(err) => return Err(err.into()),
            }
        }
        Err(EconomyError::Integrity(
            "could not allocate a unique referral code".to_string(),
        ))
    }

    pub fn account(&self, account_id: &str) -> Result<Account> {
        self.ledger
            .get(account_id)
            .ok_or_else(|| EconomyError::UserNotFound(account_id.to_string()))
    }

    // ----- mining -----

    /// Run a mining cycle, then pay the referrer's first-mining bonus if it
    /// is still owed
    pub fn start_mining(&self, request: MiningRequest, now: DateTime<Utc>) -> Result<MiningOutcome> {
        let _gate = self.gate.read();
        let outcome = self.observe("start_mining", self.mining.start_cycle(&request, now))?;

        match self.referrals.pay_first_mining_bonus(&request.account_id, now) {
            Ok(_) => {}
            Err(err @ EconomyError::Integrity(_)) => {
                let _ = self.observe::<()>("first_mining_bonus", Err(err));
            }
            Err(err) => {
                warn!(
                    account = %request.account_id,
                    error = %err,
                    "First-mining referral bonus deferred"
                );
            }
        }
        Ok(outcome)
    }

    pub fn mining_status(&self, account_id: &str, now: DateTime<Utc>) -> Result<MiningStatus> {
        self.mining.cycle_status(account_id, now)
    }

    pub fn claim_welcome_bonus(&self, account_id: &str, now: DateTime<Utc>) -> Result<WelcomeBonus> {
        let _gate = self.gate.read();
        self.observe(
            "claim_welcome_bonus",
            self.mining.claim_welcome_bonus(account_id, now),
        )
    }

    pub fn mining_sessions(&self, account_id: &str) -> Vec<MiningSession> {
        self.mining.sessions_of(account_id)
    }

    // ----- referrals -----

    pub fn referral_stats(&self, account_id: &str) -> ReferralStats {
        self.referrals.stats(account_id)
    }

    pub fn referrals_of(&self, account_id: &str) -> Vec<Referral> {
        self.referrals.referrals_of(account_id)
    }

    pub fn referral_earnings(&self, account_id: &str) -> Vec<ReferralEarning> {
        self.referrals.earnings_of(account_id)
    }

    pub fn grant_referral_bonus(
        &self,
        caller: &str,
        referral_id: &str,
        amount: u64,
        now: DateTime<Utc>,
    ) -> Result<ReferralEarning> {
        let _gate = self.gate.read();
        authorize_admin(&self.ledger, caller)?;
        self.observe(
            "grant_referral_bonus",
            self.referrals.grant_bonus(referral_id, amount, caller, now),
        )
    }

    // ----- tasks -----

    pub fn open_tasks(&self, now: DateTime<Utc>) -> Vec<Task> {
        self.tasks.open_tasks(now)
    }

    /// Submit proof for a task. Auto-verified tasks consult the membership
    /// check first, outside any lock.
    pub async fn submit_task(
        &self,
        account_id: &str,
        task_id: &str,
        proof: String,
        now: DateTime<Utc>,
    ) -> Result<TaskSubmission> {
        let task = self
            .tasks
            .task(task_id)
            .ok_or_else(|| EconomyError::TaskNotFound(task_id.to_string()))?;

        let auto_check = if task.verification_type == VerificationType::Auto && task.is_open(now)
        {
            Some(self.membership.check(account_id, &task, &proof).await)
        } else {
            None
        };

        let _gate = self.gate.read();
        self.observe(
            "submit_task",
            self.tasks.submit(account_id, task_id, proof, auto_check, now),
        )
    }

    pub fn submissions_of(&self, account_id: &str) -> Vec<TaskSubmission> {
        self.tasks.submissions_of(account_id)
    }

    pub fn review_submission(
        &self,
        caller: &str,
        submission_id: &str,
        decision: ReviewDecision,
        now: DateTime<Utc>,
    ) -> Result<TaskSubmission> {
        let _gate = self.gate.read();
        authorize_admin(&self.ledger, caller)?;
        self.observe(
            "review_submission",
            self.tasks.review(submission_id, decision, caller, now),
        )
    }

    pub fn create_task(&self, caller: &str, new: NewTask, now: DateTime<Utc>) -> Result<Task> {
        let _gate = self.gate.read();
        authorize_admin(&self.ledger, caller)?;
        self.tasks.create_task(caller, new, now)
    }

    pub fn set_task_status(
        &self,
        caller: &str,
        task_id: &str,
        status: TaskStatus,
        now: DateTime<Utc>,
    ) -> Result<Task> {
        let _gate = self.gate.read();
        authorize_admin(&self.ledger, caller)?;
        self.tasks.set_task_status(caller, task_id, status, now)
    }

    pub fn all_tasks(&self, caller: &str) -> Result<Vec<Task>> {
        authorize_admin(&self.ledger, caller)?;
        Ok(self.tasks.list_tasks())
    }

    pub fn pending_submissions(&self, caller: &str) -> Result<Vec<TaskSubmission>> {
        authorize_admin(&self.ledger, caller)?;
        Ok(self.tasks.pending_submissions())
    }

    // ----- marketplace -----

    pub fn catalog(&self) -> Vec<NftCatalogItem> {
        self.marketplace.catalog(false)
    }

    pub fn inventory(&self, account_id: &str) -> Result<Vec<UserNft>> {
        self.marketplace.inventory_of(account_id)
    }

    pub fn purchase(
        &self,
        account_id: &str,
        item_id: &str,
        now: DateTime<Utc>,
    ) -> Result<PurchaseOutcome> {
        let _gate = self.gate.read();
        self.observe("purchase", self.marketplace.purchase(account_id, item_id, now))
    }

    pub fn toggle_equip(&self, account_id: &str, unit_id: &str) -> Result<bool> {
        let _gate = self.gate.read();
        self.observe("toggle_equip", self.marketplace.toggle_equip(account_id, unit_id))
    }

    pub fn upgrade(
        &self,
        account_id: &str,
        unit_ids: &[String],
        target_tier: NftTier,
        now: DateTime<Utc>,
    ) -> Result<UpgradeOutcome> {
        let _gate = self.gate.read();
        self.observe(
            "upgrade",
            self.marketplace.upgrade(account_id, unit_ids, target_tier, now),
        )
    }

    pub fn add_catalog_item(
        &self,
        caller: &str,
        name: &str,
        tier: NftTier,
        cost: u64,
        now: DateTime<Utc>,
    ) -> Result<NftCatalogItem> {
        let _gate = self.gate.read();
        authorize_admin(&self.ledger, caller)?;
        self.marketplace.add_item(caller, name, tier, cost, now)
    }

    pub fn set_catalog_item_active(
        &self,
        caller: &str,
        item_id: &str,
        active: bool,
        now: DateTime<Utc>,
    ) -> Result<NftCatalogItem> {
        let _gate = self.gate.read();
        authorize_admin(&self.ledger, caller)?;
        self.marketplace.set_item_active(caller, item_id, active, now)
    }

    // ----- admin -----

    pub fn adjust_balance(
        &self,
        caller: &str,
        target: &str,
        delta: i64,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        let _gate = self.gate.read();
        self.observe(
            "adjust_balance",
            self.admin.adjust_balance(caller, target, delta, reason, now),
        )
    }

    pub fn set_status(
        &self,
        caller: &str,
        target: &str,
        status: AccountStatus,
        now: DateTime<Utc>,
    ) -> Result<Account> {
        let _gate = self.gate.read();
        self.observe("set_status", self.admin.set_status(caller, target, status, now))
    }

    pub fn set_admin(
        &self,
        caller: &str,
        target: &str,
        is_admin: bool,
        now: DateTime<Utc>,
    ) -> Result<Account> {
        let _gate = self.gate.read();
        self.observe("set_admin", self.admin.set_admin(caller, target, is_admin, now))
    }

    /// Most recent audit entries, newest first
    pub fn audit_log(&self, caller: &str, limit: usize) -> Result<Vec<AuditLogEntry>> {
        authorize_admin(&self.ledger, caller)?;
        Ok(self.audit.recent(limit))
    }

    // ----- withdrawals -----

    pub fn prepare_withdrawal(
        &self,
        account_id: &str,
        amount: u64,
        now: DateTime<Utc>,
    ) -> Result<WithdrawalTicket> {
        let _gate = self.gate.read();
        self.account(account_id)?;
        let result = self.withdrawals.prepare_withdrawal(account_id, amount);
        self.audit.append(
            AuditLogEntry::new(AuditAction::WithdrawalRequested, now)
                .actor(account_id)
                .target(account_id)
                .meta("amount", amount)
                .meta("outcome", if result.is_ok() { "prepared" } else { "locked" }),
        );
        Ok(result?)
    }

    // ----- persistence -----

    pub fn snapshot(&self, now: DateTime<Utc>) -> EconomySnapshot {
        let _quiet = self.gate.write();
        let (referrals, referral_earnings) = self.referrals.snapshot();
        let (tasks, task_submissions) = self.tasks.snapshot();
        EconomySnapshot {
            version: SNAPSHOT_VERSION,
            taken_at: now,
            accounts: self.ledger.snapshot(),
            mining_sessions: self.mining.snapshot(),
            referrals,
            referral_earnings,
            tasks,
            task_submissions,
            catalog: self.marketplace.snapshot(),
            audit_log: self.audit.snapshot(),
            fingerprints: self.fingerprints.snapshot(),
        }
    }
}
