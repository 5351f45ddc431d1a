//! On-chain withdrawal gateway
//!
//! Settlement is not live. The shipped gateway refuses every request.

use points_core::AccountId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WithdrawalError {
    #[error("Withdrawals are locked")]
    Locked,
}

/// A withdrawal accepted for settlement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalTicket {
    pub id: String,
    pub account_id: AccountId,
    pub amount: u64,
}

pub trait WithdrawalGateway: Send + Sync {
    fn prepare_withdrawal(
        &self,
        account_id: &str,
        amount: u64,
    ) -> Result<WithdrawalTicket, WithdrawalError>;
}

pub struct LockedWithdrawals;

impl WithdrawalGateway for LockedWithdrawals {
    fn prepare_withdrawal(
        &self,
        _account_id: &str,
        _amount: u64,
    ) -> Result<WithdrawalTicket, WithdrawalError> {
        Err(WithdrawalError::Locked)
    }
}

impl From<WithdrawalError> for crate::error::EconomyError {
    fn from(err: WithdrawalError) -> Self {
        match err {
            WithdrawalError::Locked => crate::error::EconomyError::Locked,
        }
    }
}
