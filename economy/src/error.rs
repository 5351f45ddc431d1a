//! Economy error types

use chrono::{DateTime, Utc};
use points_core::{AccountId, LedgerError};
use thiserror::Error;

/// Coarse classification used by transports to pick a status code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authorization,
    Validation,
    StateConflict,
    Resource,
    NotFound,
    Integrity,
    Unavailable,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EconomyError {
    #[error("Missing or unknown credential")]
    Unauthenticated,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Device fingerprint already bound to another account")]
    FingerprintConflict,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid referral: {0}")]
    InvalidReferral(String),

    #[error("Invalid upgrade combination: {0}")]
    InvalidCombination(String),

    #[error("Account already exists: {0}")]
    AccountExists(AccountId),

    #[error("Referral code already in use: {0}")]
    ReferralCodeTaken(String),

    #[error("Account is not active: {0}")]
    AccountSuspended(AccountId),

    #[error("Mining cooldown active until {retry_after}")]
    CooldownActive { retry_after: DateTime<Utc> },

    #[error("Welcome bonus window has expired")]
    WindowExpired,

    #[error("Bonus already claimed")]
    AlreadyClaimed,

    #[error("Task is not accepting submissions: {0}")]
    TaskInactive(String),

    #[error("Task already submitted: {0}")]
    AlreadySubmitted(String),

    #[error("Submission already finalized: {0}")]
    AlreadyFinalized(String),

    #[error("Catalog item is not for sale: {0}")]
    ItemInactive(String),

    #[error("Item has been burned: {0}")]
    ItemBurned(String),

    #[error("Insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: u64, requested: u64 },

    #[error("User not found: {0}")]
    UserNotFound(AccountId),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Submission not found: {0}")]
    SubmissionNotFound(String),

    #[error("Catalog item not found: {0}")]
    ItemNotFound(String),

    #[error("Item not owned: {0}")]
    NotOwned(String),

    #[error("Referral not found: {0}")]
    ReferralNotFound(String),

    #[error("Integrity violation: {0}")]
    Integrity(String),

    #[error("Withdrawals are locked")]
    Locked,
}

impl EconomyError {
    pub fn kind(&self) -> ErrorKind {
        use EconomyError::*;
        match self {
            Unauthenticated | Forbidden(_) | FingerprintConflict => ErrorKind::Authorization,
            InvalidInput(_) | InvalidConfig(_) | InvalidReferral(_) | InvalidCombination(_) => {
                ErrorKind::Validation
            }
            AccountExists(_)
            | ReferralCodeTaken(_)
            | AccountSuspended(_)
            | CooldownActive { .. }
            | WindowExpired
            | AlreadyClaimed
            | TaskInactive(_)
            | AlreadySubmitted(_)
            | AlreadyFinalized(_)
            | ItemInactive(_)
            | ItemBurned(_) => ErrorKind::StateConflict,
            InsufficientFunds { .. } => ErrorKind::Resource,
            UserNotFound(_)
            | TaskNotFound(_)
            | SubmissionNotFound(_)
            | ItemNotFound(_)
            | NotOwned(_)
            | ReferralNotFound(_) => ErrorKind::NotFound,
            Integrity(_) => ErrorKind::Integrity,
            Locked => ErrorKind::Unavailable,
        }
    }

    /// Stable snake_case tag for wire formats
    pub fn tag(&self) -> &'static str {
        use EconomyError::*;
        match self {
            Unauthenticated => "unauthenticated",
            Forbidden(_) => "forbidden",
            FingerprintConflict => "fingerprint_conflict",
            InvalidInput(_) => "invalid_input",
            InvalidConfig(_) => "invalid_config",
            InvalidReferral(_) => "invalid_referral",
            InvalidCombination(_) => "invalid_combination",
            AccountExists(_) => "account_exists",
            ReferralCodeTaken(_) => "referral_code_taken",
            AccountSuspended(_) => "account_suspended",
            CooldownActive { .. } => "cooldown_active",
            WindowExpired => "window_expired",
            AlreadyClaimed => "already_claimed",
            TaskInactive(_) => "task_inactive",
            AlreadySubmitted(_) => "already_submitted",
            AlreadyFinalized(_) => "already_finalized",
            ItemInactive(_) => "item_inactive",
            ItemBurned(_) => "item_burned",
            InsufficientFunds { .. } => "insufficient_funds",
            UserNotFound(_) => "user_not_found",
            TaskNotFound(_) => "task_not_found",
            SubmissionNotFound(_) => "submission_not_found",
            ItemNotFound(_) => "item_not_found",
            NotOwned(_) => "not_owned",
            ReferralNotFound(_) => "referral_not_found",
            Integrity(_) => "integrity",
            Locked => "locked",
        }
    }
}

impl From<LedgerError> for EconomyError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::AccountNotFound(id) => EconomyError::UserNotFound(id),
            LedgerError::AccountExists(id) => EconomyError::AccountExists(id),
            LedgerError::DuplicateReferralCode(code) => EconomyError::ReferralCodeTaken(code),
            LedgerError::InsufficientFunds { balance, requested } => {
                EconomyError::InsufficientFunds { balance, requested }
            }
            LedgerError::Overflow => EconomyError::InvalidInput("balance overflow".to_string()),
            LedgerError::AmountOutOfRange(amount) => {
                EconomyError::InvalidInput(format!("amount out of range: {}", amount))
            }
            LedgerError::Integrity(msg) => EconomyError::Integrity(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, EconomyError>;
