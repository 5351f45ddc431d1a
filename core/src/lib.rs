//! Points Core Library
//!
//! Account records, the ledger store that owns every balance, the
//! append-only audit log and the device fingerprint service.

pub mod account;
pub mod audit;
pub mod constants;
pub mod error;
pub mod fingerprint;
pub mod ledger;
pub mod nft;

// Re-export main types
pub use account::{Account, AccountId, AccountStatus};
pub use audit::{AuditAction, AuditLog, AuditLogEntry};
pub use constants::*;
pub use error::{LedgerError, Result};
pub use fingerprint::{
    compute_fingerprint, parse_fingerprint, BrowserInfo, DeviceFingerprint, DeviceSignals,
    FingerprintObservation, FingerprintRegistry, FINGERPRINT_HEX_LEN,
};
pub use ledger::{AccountBook, LedgerStore};
pub use nft::{NftTier, UserNft};
