//! Economy constants
//!
//! Amounts are ledger units. One whole point is `POINT_SCALE` units.

/// Ledger units per displayed point
pub const POINT_SCALE: u64 = 100;

/// Reward credited for one completed mining cycle
pub const MINING_CYCLE_REWARD: u64 = 10 * POINT_SCALE;

/// Minimum gap between two mining cycles (24h)
pub const MINING_COOLDOWN_SECS: i64 = 24 * 60 * 60;

/// A cycle started within this gap of the previous one extends the streak (48h)
pub const STREAK_WINDOW_SECS: i64 = 48 * 60 * 60;

/// One-shot bonus for new accounts
pub const WELCOME_BONUS: u64 = 50 * POINT_SCALE;

/// How long after account creation the welcome bonus can be claimed (24h)
pub const WELCOME_WINDOW_SECS: i64 = 24 * 60 * 60;

/// Paid to the referrer when a referral becomes valid
pub const REFERRAL_SIGNUP_BONUS: u64 = 5 * POINT_SCALE;

/// Paid to the referrer when the referred account completes its first cycle
pub const REFERRAL_FIRST_MINING_BONUS: u64 = 10 * POINT_SCALE;

/// Number of same-tier units consumed by one upgrade
pub const UPGRADE_BATCH_SIZE: usize = 3;

/// Length of generated referral codes
pub const REFERRAL_CODE_LEN: usize = 8;

/// Render ledger units as a decimal point amount, e.g. `1050` -> `"10.50"`
pub fn format_points(units: u64) -> String {
    format!("{}.{:02}", units / POINT_SCALE, units % POINT_SCALE)
}
