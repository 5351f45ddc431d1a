//! Admin overrides
//!
//! `authorize_admin` is the one privilege predicate. It reads the caller's
//! current ledger record, so a revoked or suspended admin loses access on
//! the next call.

use crate::error::{EconomyError, Result};
use chrono::{DateTime, Utc};
use points_core::{Account, AccountStatus, AuditAction, AuditLog, AuditLogEntry, LedgerStore};
use std::sync::Arc;
use tracing::{info, warn};

const MAX_REASON_LEN: usize = 500;

/// Succeeds with the caller's account only for an active admin
pub fn authorize_admin(ledger: &LedgerStore, caller: &str) -> Result<Account> {
    match ledger.get(caller) {
        Some(account) if account.is_admin && account.is_active() => Ok(account),
        Some(_) => {
            warn!(caller = %caller, "Admin operation refused");
            Err(EconomyError::Forbidden(format!("{} is not an admin", caller)))
        }
        None => Err(EconomyError::Forbidden(format!("unknown caller {}", caller))),
    }
}

pub struct AdminConsole {
    ledger: Arc<LedgerStore>,
    audit: Arc<AuditLog>,
}

impl AdminConsole {
    pub fn new(ledger: Arc<LedgerStore>, audit: Arc<AuditLog>) -> Self {
        Self { ledger, audit }
    }

    /// Apply a signed delta to `target`; debits below zero are refused
    pub fn adjust_balance(
        &self,
        caller: &str,
        target: &str,
        delta: i64,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<u64> {
        authorize_admin(&self.ledger, caller)?;
        if delta == 0 {
            return Err(EconomyError::InvalidInput("delta must be non-zero".to_string()));
        }
        let reason = validate_reason(reason)?;

        let (prior, result) = self.ledger.transact(target, |book| {
            let prior = book.balance();
            let result = book.adjust(delta)?;
            book.account.updated_at = now;
            Ok::<_, EconomyError>((prior, result))
        })?;

        self.audit.append(
            AuditLogEntry::new(AuditAction::BalanceAdjusted, now)
                .actor(caller)
                .target(target)
                .meta("delta", delta)
                .meta("prior", prior)
                .meta("result", result)
                .meta("reason", reason.unwrap_or_default()),
        );
        info!(admin = %caller, account = %target, delta, prior, result, "Balance adjusted by admin");
        Ok(result)
    }

    pub fn set_status(
        &self,
        caller: &str,
        target: &str,
        status: AccountStatus,
        now: DateTime<Utc>,
    ) -> Result<Account> {
        authorize_admin(&self.ledger, caller)?;
        if caller == target && status != AccountStatus::Active {
            return Err(EconomyError::InvalidInput(
                "admins cannot deactivate themselves".to_string(),
            ));
        }

        let (prior, account) = self.ledger.transact(target, |book| {
            let prior = book.account.status;
            book.account.status = status;
            book.account.updated_at = now;
            Ok::<_, EconomyError>((prior, book.account.clone()))
        })?;

        self.audit.append(
            AuditLogEntry::new(AuditAction::StatusChanged, now)
                .actor(caller)
                .target(target)
                .meta("prior", prior)
                .meta("result", status),
        );
        info!(admin = %caller, account = %target, %prior, result = %status, "Account status changed");
        Ok(account)
    }

    pub fn set_admin(
        &self,
        caller: &str,
        target: &str,
        is_admin: bool,
        now: DateTime<Utc>,
    ) -> Result<Account> {
        authorize_admin(&self.ledger, caller)?;
        if caller == target && !is_admin {
            return Err(EconomyError::InvalidInput(
                "admins cannot revoke their own rights".to_string(),
            ));
        }

        let (prior, account) = self.ledger.transact(target, |book| {
            let prior = book.account.is_admin;
            book.account.is_admin = is_admin;
            book.account.updated_at = now;
            Ok::<_, EconomyError>((prior, book.account.clone()))
        })?;

        self.audit.append(
            AuditLogEntry::new(AuditAction::AdminGranted, now)
                .actor(caller)
                .target(target)
                .meta("prior", prior)
                .meta("result", is_admin),
        );
        Ok(account)
    }
}

fn validate_reason(reason: Option<&str>) -> Result<Option<String>> {
    match reason.map(str::trim).filter(|r| !r.is_empty()) {
        Some(r) if r.len() > MAX_REASON_LEN => Err(EconomyError::InvalidInput(format!(
            "reason exceeds {} bytes",
            MAX_REASON_LEN
        ))),
        other => Ok(other.map(str::to_string)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (AdminConsole, Arc<LedgerStore>, Arc<AuditLog>, DateTime<Utc>) {
        let now = Utc::now();
        let ledger = Arc::new(LedgerStore::new());
        for (id, code) in [("root", "ROOT0001"), ("alice", "ALICE001")] {
            ledger
                .open_account(Account::new(id.into(), id.into(), code.into(), now))
                .unwrap();
        }
        ledger
            .transact::<_, EconomyError, _>("root", |book| {
                book.account.is_admin = true;
                Ok(())
            })
            .unwrap();
        let audit = Arc::new(AuditLog::new());
        (AdminConsole::new(ledger.clone(), audit.clone()), ledger, audit, now)
    }

    #[test]
    fn test_adjust_balance_is_audited() {
        let (admin, ledger, audit, now) = setup();

        assert_eq!(admin.adjust_balance("root", "alice", 500, Some("promo"), now), Ok(500));
        assert_eq!(admin.adjust_balance("root", "alice", -200, None, now), Ok(300));
        assert_eq!(ledger.balance("alice").unwrap(), 300);

        let entries = audit.for_account("alice");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].metadata.get("reason").map(String::as_str), Some("promo"));
        assert_eq!(entries[1].metadata.get("prior").map(String::as_str), Some("500"));
    }

    #[test]
    fn test_adjust_balance_refuses_negative_result() {
        let (admin, ledger, audit, now) = setup();
        assert!(matches!(
            admin.adjust_balance("root", "alice", -1, None, now),
            Err(EconomyError::InsufficientFunds { .. })
        ));
        assert_eq!(ledger.balance("alice").unwrap(), 0);
        assert!(audit.is_empty());
    }

    #[test]
    fn test_non_admin_is_forbidden() {
        let (admin, _, _, now) = setup();
        assert!(matches!(
            admin.adjust_balance("alice", "alice", 100, None, now),
            Err(EconomyError::Forbidden(_))
        ));
        assert!(matches!(
            admin.adjust_balance("ghost", "alice", 100, None, now),
            Err(EconomyError::Forbidden(_))
        ));
        assert!(matches!(
            admin.adjust_balance("root", "ghost", 100, None, now),
            Err(EconomyError::UserNotFound(_))
        ));
    }

    #[test]
    fn test_privilege_is_read_at_call_time() {
        let (admin, ledger, _, now) = setup();
        admin.set_admin("root", "alice", true, now).unwrap();
        assert!(authorize_admin(&ledger, "alice").is_ok());

        admin
            .set_status("root", "alice", AccountStatus::Suspended, now)
            .unwrap();
        assert!(matches!(
            authorize_admin(&ledger, "alice"),
            Err(EconomyError::Forbidden(_))
        ));
    }

    #[test]
    fn test_admin_cannot_lock_self_out() {
        let (admin, _, _, now) = setup();
        assert!(admin
            .set_status("root", "root", AccountStatus::Banned, now)
            .is_err());
        assert!(admin.set_admin("root", "root", false, now).is_err());
    }
}
