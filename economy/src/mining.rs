//! Mining cycles
//!
//! An account may complete one cycle per cooldown window. The credit, the
//! counters and the streak are written in a single ledger transaction; the
//! session record, fingerprint sighting and audit entry follow the commit.
//! Between cycles the "accruing" amount is a display value only.

use crate::config::{EconomyConfig, FingerprintPolicy};
use crate::error::{EconomyError, Result};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use points_core::{
    parse_fingerprint, AccountId, AuditAction, AuditLog, AuditLogEntry, BrowserInfo,
    FingerprintRegistry, LedgerStore, FINGERPRINT_HEX_LEN,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Immutable record of one completed cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiningSession {
    pub id: String,
    pub account_id: AccountId,
    pub points_earned: u64,
    pub fingerprint_hash: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct MiningRequest {
    pub account_id: AccountId,
    pub fingerprint_hash: String,
    pub browser_info: BrowserInfo,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiningOutcome {
    pub new_balance: u64,
    pub cycle_reward: u64,
    pub streak: u32,
    pub first_cycle: bool,
    pub session_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MiningState {
    Idle,
    Accruing,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MiningStatus {
    pub state: MiningState,
    pub can_mine: bool,
    /// Fraction of the current window elapsed, 0.0 to 1.0
    pub progress: f64,
    /// Nominal amount accrued so far; not credited
    pub accrued: u64,
    pub cycle_reward: u64,
    pub last_mining_at: Option<DateTime<Utc>>,
    pub next_cycle_at: Option<DateTime<Utc>>,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub mining_count: u64,
    pub welcome_bonus_claimed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WelcomeBonus {
    pub amount: u64,
    pub new_balance: u64,
}

pub struct MiningManager {
    config: Arc<EconomyConfig>,
    ledger: Arc<LedgerStore>,
    audit: Arc<AuditLog>,
    fingerprints: Arc<FingerprintRegistry>,
    sessions: RwLock<Vec<MiningSession>>,
}

impl MiningManager {
    pub fn new(
        config: Arc<EconomyConfig>,
        ledger: Arc<LedgerStore>,
        audit: Arc<AuditLog>,
        fingerprints: Arc<FingerprintRegistry>,
    ) -> Self {
        Self::restore(config, ledger, audit, fingerprints, Vec::new())
    }

    pub fn restore(
        config: Arc<EconomyConfig>,
        ledger: Arc<LedgerStore>,
        audit: Arc<AuditLog>,
        fingerprints: Arc<FingerprintRegistry>,
        sessions: Vec<MiningSession>,
    ) -> Self {
        Self {
            config,
            ledger,
            audit,
            fingerprints,
            sessions: RwLock::new(sessions),
        }
    }

    /// Complete one mining cycle for the requesting account
    pub fn start_cycle(&self, request: &MiningRequest, now: DateTime<Utc>) -> Result<MiningOutcome> {
        let account_id = request.account_id.as_str();
        let hash = parse_fingerprint(&request.fingerprint_hash).ok_or_else(|| {
            EconomyError::InvalidInput(format!(
                "fingerprint_hash must be {} hex characters",
                FINGERPRINT_HEX_LEN
            ))
        })?;
        let hash = hash.as_str();
        if !self.ledger.exists(account_id) {
            return Err(EconomyError::UserNotFound(account_id.to_string()));
        }

        self.fingerprint_gate(hash, account_id, now)?;

        let reward = self.config.mining_reward;
        let cooldown = self.config.cooldown();
        let streak_window = self.config.streak_window();

        let (new_balance, streak, first_cycle) = self.ledger.transact(account_id, |book| {
            if !book.account.is_active() {
                return Err(EconomyError::AccountSuspended(account_id.to_string()));
            }
            let last = book.account.last_mining_at;
            if let Some(last) = last {
                let ready_at = last + cooldown;
                if now < ready_at {
                    return Err(EconomyError::CooldownActive {
                        retry_after: ready_at,
                    });
                }
            }

            let first_cycle = book.account.mining_count == 0;
            let new_balance = book.credit(reward)?;

            let account = &mut book.account;
            let streak = match last {
                Some(last) if now - last < streak_window => account.current_streak.saturating_add(1),
                _ => 1,
            };
            account.current_streak = streak;
            account.longest_streak = account.longest_streak.max(streak);
            account.mining_count += 1;
            account.total_mined = account.total_mined.saturating_add(reward);
            account.last_mining_at = Some(now);
            account.updated_at = now;

            Ok((new_balance, streak, first_cycle))
        })?;

        let session = MiningSession {
            id: Uuid::new_v4().to_string(),
            account_id: account_id.to_string(),
            points_earned: reward,
            fingerprint_hash: hash.to_string(),
            ip_address: request.ip_address.clone(),
            user_agent: request.user_agent.clone(),
            created_at: now,
        };
        let session_id = session.id.clone();
        self.sessions.write().push(session);

        self.fingerprints
            .observe(hash, account_id, request.browser_info.clone(), now);

        self.audit.append(
            AuditLogEntry::new(AuditAction::MiningCycleCompleted, now)
                .actor(account_id)
                .target(account_id)
                .meta("amount", reward)
                .meta("streak", streak)
                .meta("session_id", &session_id)
                .meta("new_balance", new_balance),
        );

        info!(
            account = %account_id,
            amount = reward,
            streak,
            new_balance,
            "Mining cycle completed"
        );

        Ok(MiningOutcome {
            new_balance,
            cycle_reward: reward,
            streak,
            first_cycle,
            session_id,
        })
    }

    fn fingerprint_gate(&self, hash: &str, account_id: &str, now: DateTime<Utc>) -> Result<()> {
        let Some(owner) = self.fingerprints.bound_elsewhere(hash, account_id) else {
            return Ok(());
        };

        match self.config.fingerprint_policy {
            FingerprintPolicy::Allow => Ok(()),
            FingerprintPolicy::Flag => {
                self.fingerprints.mark_untrusted(hash);
                self.audit.append(
                    AuditLogEntry::new(AuditAction::FingerprintCollision, now)
                        .actor(account_id)
                        .target(owner.as_str())
                        .meta("fingerprint", hash)
                        .meta("policy", "flag"),
                );
                Ok(())
            }
            FingerprintPolicy::Block => {
                warn!(
                    account = %account_id,
                    owner = %owner,
                    "Mining blocked by fingerprint collision"
                );
                self.audit.append(
                    AuditLogEntry::new(AuditAction::FingerprintCollision, now)
                        .actor(account_id)
                        .target(owner.as_str())
                        .meta("fingerprint", hash)
                        .meta("policy", "block"),
                );
                Err(EconomyError::FingerprintConflict)
            }
        }
    }

    /// Current cycle state for display
    pub fn cycle_status(&self, account_id: &str, now: DateTime<Utc>) -> Result<MiningStatus> {
        let account = self
            .ledger
            .get(account_id)
            .ok_or_else(|| EconomyError::UserNotFound(account_id.to_string()))?;

        let reward = self.config.mining_reward;
        let cooldown = self.config.cooldown();

        let (state, progress, accrued, next_cycle_at) = match account.last_mining_at {
            Some(last) if now - last < cooldown => {
                let elapsed = (now - last).num_seconds().max(0) as f64;
                let window = cooldown.num_seconds().max(1) as f64;
                let progress = (elapsed / window).clamp(0.0, 1.0);
                let accrued = (reward as f64 * progress).floor() as u64;
                (MiningState::Accruing, progress, accrued, Some(last + cooldown))
            }
            Some(last) => (MiningState::Idle, 1.0, reward, Some(last + cooldown)),
            None => (MiningState::Idle, 0.0, 0, None),
        };

        Ok(MiningStatus {
            state,
            can_mine: state == MiningState::Idle && account.is_active(),
            progress,
            accrued,
            cycle_reward: reward,
            last_mining_at: account.last_mining_at,
            next_cycle_at,
            current_streak: account.current_streak,
            longest_streak: account.longest_streak,
            mining_count: account.mining_count,
            welcome_bonus_claimed: account.welcome_bonus_claimed,
        })
    }

    /// One-shot bonus available for a limited time after registration
    pub fn claim_welcome_bonus(&self, account_id: &str, now: DateTime<Utc>) -> Result<WelcomeBonus> {
        let amount = self.config.welcome_bonus;
        let window = self.config.welcome_window();

        let new_balance = self.ledger.transact(account_id, |book| {
            if now - book.account.created_at > window {
                return Err(EconomyError::WindowExpired);
            }
            if book.account.welcome_bonus_claimed {
                return Err(EconomyError::AlreadyClaimed);
            }
            if !book.account.is_active() {
                return Err(EconomyError::AccountSuspended(account_id.to_string()));
            }
            book.account.welcome_bonus_claimed = true;
            book.account.updated_at = now;
            Ok(book.credit(amount)?)
        })?;

        self.audit.append(
            AuditLogEntry::new(AuditAction::WelcomeBonusClaimed, now)
                .actor(account_id)
                .target(account_id)
                .meta("amount", amount)
                .meta("new_balance", new_balance),
        );
        info!(account = %account_id, amount, "Welcome bonus claimed");

        Ok(WelcomeBonus {
            amount,
            new_balance,
        })
    }

    pub fn sessions_of(&self, account_id: &str) -> Vec<MiningSession> {
        self.sessions
            .read()
            .iter()
            .filter(|s| s.account_id == account_id)
            .cloned()
            .collect()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn snapshot(&self) -> Vec<MiningSession> {
        self.sessions.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use points_core::Account;

    fn setup(policy: FingerprintPolicy) -> (MiningManager, Arc<LedgerStore>, Arc<AuditLog>, DateTime<Utc>) {
        let now = Utc::now();
        let config = Arc::new(EconomyConfig {
            fingerprint_policy: policy,
            ..Default::default()
        });
        let ledger = Arc::new(LedgerStore::new());
        let audit = Arc::new(AuditLog::new());
        for id in ["alice", "bob"] {
            ledger
                .open_account(Account::new(
                    id.to_string(),
                    id.to_string(),
                    format!("{}CODE", id.to_ascii_uppercase()),
                    now,
                ))
                .unwrap();
        }
        let manager = MiningManager::new(
            config,
            ledger.clone(),
            audit.clone(),
            Arc::new(FingerprintRegistry::new()),
        );
        (manager, ledger, audit, now)
    }

    fn hash(digit: char) -> String {
        digit.to_string().repeat(FINGERPRINT_HEX_LEN)
    }

    fn request(account: &str, hash: &str) -> MiningRequest {
        MiningRequest {
            account_id: account.to_string(),
            fingerprint_hash: hash.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_cycle_then_cooldown() {
        let (mining, ledger, _, now) = setup(FingerprintPolicy::Flag);

        let outcome = mining.start_cycle(&request("alice", &hash('a')), now).unwrap();
        assert_eq!(outcome.new_balance, 1_000);
        assert!(outcome.first_cycle);
        assert_eq!(outcome.streak, 1);

        let later = now + Duration::hours(23);
        let err = mining.start_cycle(&request("alice", &hash('a')), later).unwrap_err();
        assert_eq!(
            err,
            EconomyError::CooldownActive {
                retry_after: now + Duration::hours(24)
            }
        );
        assert_eq!(ledger.balance("alice").unwrap(), 1_000);
        assert_eq!(mining.session_count(), 1);
    }

    #[test]
    fn test_streak_extends_and_resets() {
        let (mining, ledger, _, now) = setup(FingerprintPolicy::Flag);

        mining.start_cycle(&request("alice", &hash('a')), now).unwrap();
        let second = mining
            .start_cycle(&request("alice", &hash('a')), now + Duration::hours(25))
            .unwrap();
        assert_eq!(second.streak, 2);
        assert!(!second.first_cycle);

        let third = mining
            .start_cycle(&request("alice", &hash('a')), now + Duration::hours(25 + 72))
            .unwrap();
        assert_eq!(third.streak, 1);

        let account = ledger.get("alice").unwrap();
        assert_eq!(account.longest_streak, 2);
        assert_eq!(account.mining_count, 3);
        assert_eq!(account.total_mined, 3_000);
    }

    #[test]
    fn test_suspended_account_cannot_mine() {
        let (mining, ledger, _, now) = setup(FingerprintPolicy::Flag);
        ledger
            .transact::<_, EconomyError, _>("alice", |book| {
                book.account.status = points_core::AccountStatus::Suspended;
                Ok(())
            })
            .unwrap();

        assert_eq!(
            mining.start_cycle(&request("alice", &hash('a')), now),
            Err(EconomyError::AccountSuspended("alice".to_string()))
        );
        assert_eq!(ledger.balance("alice").unwrap(), 0);
    }

    #[test]
    fn test_flag_policy_records_collision() {
        let (mining, ledger, audit, now) = setup(FingerprintPolicy::Flag);

        mining.start_cycle(&request("alice", &hash('5')), now).unwrap();
        mining.start_cycle(&request("bob", &hash('5')), now).unwrap();

        assert_eq!(ledger.balance("bob").unwrap(), 1_000);
        assert_eq!(audit.count_action(AuditAction::FingerprintCollision), 1);
        assert!(!mining.fingerprints.is_trusted(&hash('5')));
    }

    #[test]
    fn test_block_policy_rejects_collision() {
        let (mining, ledger, _, now) = setup(FingerprintPolicy::Block);

        mining.start_cycle(&request("alice", &hash('5')), now).unwrap();
        assert_eq!(
            mining.start_cycle(&request("bob", &hash('5')), now),
            Err(EconomyError::FingerprintConflict)
        );
        assert_eq!(ledger.balance("bob").unwrap(), 0);
    }

    #[test]
    fn test_malformed_fingerprint_changes_nothing() {
        let (mining, ledger, audit, now) = setup(FingerprintPolicy::Flag);
        let not_hex = hash('z');
        let too_long = "a".repeat(10_000);

        for bad in ["", "fp-a", "aéééééééé", not_hex.as_str(), too_long.as_str()] {
            assert!(matches!(
                mining.start_cycle(&request("alice", bad), now),
                Err(EconomyError::InvalidInput(_))
            ));
        }

        assert_eq!(ledger.get("alice").unwrap().mining_count, 0);
        assert_eq!(ledger.balance("alice").unwrap(), 0);
        assert_eq!(mining.session_count(), 0);
        assert!(mining.fingerprints.is_empty());
        assert!(audit.is_empty());
    }

    #[test]
    fn test_fingerprint_case_is_normalized() {
        let (mining, _, _, now) = setup(FingerprintPolicy::Block);

        mining.start_cycle(&request("alice", &hash('a')), now).unwrap();
        assert_eq!(
            mining.start_cycle(&request("bob", &hash('A')), now),
            Err(EconomyError::FingerprintConflict)
        );
        assert_eq!(mining.sessions_of("alice")[0].fingerprint_hash, hash('a'));
    }

    #[test]
    fn test_cycle_status_accrual() {
        let (mining, _, _, now) = setup(FingerprintPolicy::Flag);

        let idle = mining.cycle_status("alice", now).unwrap();
        assert_eq!(idle.state, MiningState::Idle);
        assert!(idle.can_mine);
        assert!(idle.next_cycle_at.is_none());

        mining.start_cycle(&request("alice", &hash('a')), now).unwrap();
        let half = mining
            .cycle_status("alice", now + Duration::hours(12))
            .unwrap();
        assert_eq!(half.state, MiningState::Accruing);
        assert!(!half.can_mine);
        assert_eq!(half.accrued, 500);
        assert_eq!(half.next_cycle_at, Some(now + Duration::hours(24)));
    }

    #[test]
    fn test_welcome_bonus_once_within_window() {
        let (mining, ledger, _, now) = setup(FingerprintPolicy::Flag);

        let bonus = mining.claim_welcome_bonus("alice", now).unwrap();
        assert_eq!(bonus.new_balance, 5_000);
        assert_eq!(
            mining.claim_welcome_bonus("alice", now),
            Err(EconomyError::AlreadyClaimed)
        );

        assert_eq!(
            mining.claim_welcome_bonus("bob", now + Duration::hours(25)),
            Err(EconomyError::WindowExpired)
        );
        assert_eq!(ledger.balance("bob").unwrap(), 0);
    }
}
