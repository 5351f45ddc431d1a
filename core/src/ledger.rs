//! Ledger store
//!
//! Every balance lives in an `AccountBook` guarded by its own mutex, keyed by
//! account id. Nothing outside this module can write a balance directly:
//! changes go through `LedgerStore::adjust` or through `AccountBook::adjust`
//! inside `LedgerStore::transact`, which stages the closure's changes on a
//! copy of the book and commits them only when the closure succeeds.
//!
//! Critical sections are plain synchronous closures. Callers must finish any
//! slow or async work before entering one.

use crate::account::{Account, AccountId};
use crate::error::{LedgerError, Result};
use crate::nft::UserNft;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Convert an unsigned amount into a signed ledger delta
pub fn amount_to_delta(amount: u64) -> Result<i64> {
    i64::try_from(amount).map_err(|_| LedgerError::AmountOutOfRange(amount))
}

/// The unit of serialization: one account and the inventory it owns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBook {
    pub account: Account,
    pub inventory: Vec<UserNft>,
}

impl AccountBook {
    pub fn new(account: Account) -> Self {
        Self {
            account,
            inventory: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.account.id
    }

    pub fn balance(&self) -> u64 {
        self.account.balance()
    }

    /// The balance mutation primitive
    pub fn adjust(&mut self, delta: i64) -> Result<u64> {
        self.account.apply_delta(delta)
    }

    pub fn credit(&mut self, amount: u64) -> Result<u64> {
        self.adjust(amount_to_delta(amount)?)
    }

    pub fn debit(&mut self, amount: u64) -> Result<u64> {
        self.adjust(-amount_to_delta(amount)?)
    }

    pub fn unit(&self, unit_id: &str) -> Option<&UserNft> {
        self.inventory.iter().find(|u| u.id == unit_id)
    }

    pub fn unit_mut(&mut self, unit_id: &str) -> Option<&mut UserNft> {
        self.inventory.iter_mut().find(|u| u.id == unit_id)
    }

    /// Units that have not been burned
    pub fn live_units(&self) -> impl Iterator<Item = &UserNft> {
        self.inventory.iter().filter(|u| !u.is_burned)
    }
}

type BookCell = Arc<Mutex<AccountBook>>;

#[derive(Default)]
pub struct LedgerStore {
    books: DashMap<AccountId, BookCell>,
    referral_codes: DashMap<String, AccountId>,
}

impl LedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new account with a zero balance
    pub fn open_account(&self, account: Account) -> Result<()> {
        let id = account.id.clone();
        let code = account.referral_code.to_ascii_uppercase();

        match self.books.entry(id.clone()) {
            Entry::Occupied(_) => Err(LedgerError::AccountExists(id)),
            Entry::Vacant(slot) => {
                match self.referral_codes.entry(code.clone()) {
                    Entry::Occupied(_) => return Err(LedgerError::DuplicateReferralCode(code)),
                    Entry::Vacant(code_slot) => {
                        code_slot.insert(id.clone());
                    }
                }
                slot.insert(Arc::new(Mutex::new(AccountBook::new(account))));
                info!(account = %id, referral_code = %code, "Account opened");
                Ok(())
            }
        }
    }

    /// Clone the cell out of the map so the shard lock is not held while
    /// the account mutex is
    fn cell(&self, id: &str) -> Result<BookCell> {
        self.books
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| LedgerError::AccountNotFound(id.to_string()))
    }

    /// Adjust a balance by `delta` and return the new balance.
    ///
    /// Concurrent calls for the same account are serialized; a debit that
    /// would leave the balance negative fails with `InsufficientFunds` and
    /// changes nothing.
    pub fn adjust(&self, id: &str, delta: i64) -> Result<u64> {
        let cell = self.cell(id)?;
        let mut book = cell.lock();
        let before = book.balance();
        let after = book.adjust(delta)?;
        book.account.updated_at = Utc::now();
        debug!(account = %id, delta, before, after, "Balance adjusted");
        Ok(after)
    }

    pub fn credit(&self, id: &str, amount: u64) -> Result<u64> {
        self.adjust(id, amount_to_delta(amount)?)
    }

    pub fn debit(&self, id: &str, amount: u64) -> Result<u64> {
        self.adjust(id, -amount_to_delta(amount)?)
    }

    /// Run `f` against a staged copy of the account's book while holding
    /// the account lock. The copy replaces the book only if `f` returns
    /// `Ok`; on error nothing is written.
    pub fn transact<T, E, F>(&self, id: &str, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut AccountBook) -> std::result::Result<T, E>,
        E: From<LedgerError>,
    {
        let cell = self.cell(id)?;
        let mut book = cell.lock();
        let mut staged = book.clone();

        let out = f(&mut staged)?;

        if staged.account.id != book.account.id
            || staged.account.referral_code != book.account.referral_code
        {
            error!(account = %id, "Transaction attempted to rewrite account identity");
            return Err(LedgerError::Integrity(format!(
                "identity of account {} changed inside a transaction",
                id
            ))
            .into());
        }

        *book = staged;
        Ok(out)
    }

    /// Read-only access under the account lock
    pub fn read<T>(&self, id: &str, f: impl FnOnce(&AccountBook) -> T) -> Result<T> {
        let cell = self.cell(id)?;
        let book = cell.lock();
        Ok(f(&book))
    }

    pub fn get(&self, id: &str) -> Option<Account> {
        self.read(id, |book| book.account.clone()).ok()
    }

    pub fn book(&self, id: &str) -> Option<AccountBook> {
        self.read(id, |book| book.clone()).ok()
    }

    pub fn balance(&self, id: &str) -> Result<u64> {
        self.read(id, |book| book.balance())
    }

    pub fn exists(&self, id: &str) -> bool {
        self.books.contains_key(id)
    }

    pub fn find_by_referral_code(&self, code: &str) -> Option<AccountId> {
        self.referral_codes
            .get(&code.trim().to_ascii_uppercase())
            .map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    /// Sum of all balances
    pub fn total_balance(&self) -> u64 {
        self.snapshot()
            .iter()
            .map(|book| book.balance())
            .fold(0u64, |acc, b| acc.saturating_add(b))
    }

    pub fn accounts(&self) -> Vec<Account> {
        self.snapshot().into_iter().map(|book| book.account).collect()
    }

    /// Copy of every book, ordered by account id
    pub fn snapshot(&self) -> Vec<AccountBook> {
        let cells: Vec<BookCell> = self.books.iter().map(|e| e.value().clone()).collect();
        let mut books: Vec<AccountBook> = cells.iter().map(|cell| cell.lock().clone()).collect();
        books.sort_by(|a, b| a.account.id.cmp(&b.account.id));
        books
    }

    /// Rebuild a store from snapshot books
    pub fn restore(books: Vec<AccountBook>) -> Result<Self> {
        let store = Self::new();
        for book in books {
            let id = book.account.id.clone();
            let code = book.account.referral_code.to_ascii_uppercase();
            if store.books.contains_key(&id) {
                return Err(LedgerError::AccountExists(id));
            }
            if store.referral_codes.insert(code.clone(), id.clone()).is_some() {
                return Err(LedgerError::DuplicateReferralCode(code));
            }
            store.books.insert(id, Arc::new(Mutex::new(book)));
        }
        info!(accounts = store.len(), "Ledger restored");
        Ok(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nft::NftTier;
    use std::thread;

    fn open(store: &LedgerStore, id: &str, balance: u64) {
        let account = Account::new(
            id.to_string(),
            id.to_string(),
            format!("{}CODE", id.to_ascii_uppercase()),
            Utc::now(),
        );
        store.open_account(account).unwrap();
        if balance > 0 {
            store.credit(id, balance).unwrap();
        }
    }

    #[test]
    fn test_adjust_and_insufficient_funds() {
        let store = LedgerStore::new();
        open(&store, "alice", 100);

        assert_eq!(store.adjust("alice", 50).unwrap(), 150);
        let err = store.adjust("alice", -151).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientFunds {
                balance: 150,
                requested: 151
            }
        );
        assert_eq!(store.balance("alice").unwrap(), 150);
    }

    #[test]
    fn test_adjust_unknown_account() {
        let store = LedgerStore::new();
        assert_eq!(
            store.adjust("ghost", 10),
            Err(LedgerError::AccountNotFound("ghost".to_string()))
        );
    }

    #[test]
    fn test_duplicate_account_and_code() {
        let store = LedgerStore::new();
        open(&store, "alice", 0);

        let again = Account::new("alice".into(), "A".into(), "OTHER".into(), Utc::now());
        assert!(matches!(
            store.open_account(again),
            Err(LedgerError::AccountExists(_))
        ));

        let clash = Account::new("bob".into(), "B".into(), "aliceCODE".into(), Utc::now());
        assert!(matches!(
            store.open_account(clash),
            Err(LedgerError::DuplicateReferralCode(_))
        ));
        assert!(!store.exists("bob"));
    }

    #[test]
    fn test_concurrent_adjust_is_linearizable() {
        let store = Arc::new(LedgerStore::new());
        open(&store, "alice", 500);

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || store.adjust("alice", 100).unwrap())
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(store.balance("alice").unwrap(), 700);
    }

    #[test]
    fn test_many_concurrent_debits_never_go_negative() {
        let store = Arc::new(LedgerStore::new());
        open(&store, "alice", 1_000);

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || store.debit("alice", 100).is_ok())
            })
            .collect();
        let succeeded = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();

        assert_eq!(succeeded, 10);
        assert_eq!(store.balance("alice").unwrap(), 0);
    }

    #[test]
    fn test_transact_rolls_back_on_error() {
        let store = LedgerStore::new();
        open(&store, "alice", 100);

        let result: Result<()> = store.transact("alice", |book| {
            book.credit(1_000)?;
            book.inventory.push(UserNft::mint(
                "alice".into(),
                "item".into(),
                NftTier::Basic,
                Utc::now(),
            ));
            book.debit(5_000)?;
            Ok(())
        });

        assert!(matches!(result, Err(LedgerError::InsufficientFunds { .. })));
        let book = store.book("alice").unwrap();
        assert_eq!(book.balance(), 100);
        assert!(book.inventory.is_empty());
    }

    #[test]
    fn test_transact_commits_on_success() {
        let store = LedgerStore::new();
        open(&store, "alice", 100);

        let balance: Result<u64> = store.transact("alice", |book| {
            book.inventory.push(UserNft::mint(
                "alice".into(),
                "item".into(),
                NftTier::Basic,
                Utc::now(),
            ));
            book.debit(40)
        });

        assert_eq!(balance.unwrap(), 60);
        assert_eq!(store.book("alice").unwrap().inventory.len(), 1);
    }

    #[test]
    fn test_transact_rejects_identity_rewrite() {
        let store = LedgerStore::new();
        open(&store, "alice", 0);

        let result: Result<()> = store.transact("alice", |book| {
            book.account.referral_code = "STOLEN".to_string();
            Ok(())
        });

        assert!(matches!(result, Err(LedgerError::Integrity(_))));
        assert_eq!(store.get("alice").unwrap().referral_code, "ALICECODE");
    }

    #[test]
    fn test_snapshot_restore() {
        let store = LedgerStore::new();
        open(&store, "bob", 20);
        open(&store, "alice", 10);

        let books = store.snapshot();
        assert_eq!(books[0].account.id, "alice");

        let restored = LedgerStore::restore(books).unwrap();
        assert_eq!(restored.balance("bob").unwrap(), 20);
        assert_eq!(
            restored.find_by_referral_code("alicecode"),
            Some("alice".to_string())
        );
        assert_eq!(restored.total_balance(), 30);
    }
}
