//! Ledger error types

use crate::account::AccountId;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Account already exists: {0}")]
    AccountExists(AccountId),

    #[error("Referral code already in use: {0}")]
    DuplicateReferralCode(String),

    #[error("Insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: u64, requested: u64 },

    #[error("Balance overflow")]
    Overflow,

    #[error("Amount out of range: {0}")]
    AmountOutOfRange(u64),

    #[error("Ledger integrity violation: {0}")]
    Integrity(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
