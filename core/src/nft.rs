//! Collectible tiers and inventory units

use crate::account::AccountId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NftTier {
    Basic,
    Silver,
    Gold,
    Diamond,
    Legendary,
}

impl NftTier {
    pub const ALL: [NftTier; 5] = [
        NftTier::Basic,
        NftTier::Silver,
        NftTier::Gold,
        NftTier::Diamond,
        NftTier::Legendary,
    ];

    /// The tier an upgrade of this tier produces
    pub fn next(&self) -> Option<NftTier> {
        match self {
            NftTier::Basic => Some(NftTier::Silver),
            NftTier::Silver => Some(NftTier::Gold),
            NftTier::Gold => Some(NftTier::Diamond),
            NftTier::Diamond => Some(NftTier::Legendary),
            NftTier::Legendary => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NftTier::Basic => "basic",
            NftTier::Silver => "silver",
            NftTier::Gold => "gold",
            NftTier::Diamond => "diamond",
            NftTier::Legendary => "legendary",
        }
    }
}

impl fmt::Display for NftTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NftTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NftTier::ALL
            .iter()
            .copied()
            .find(|tier| tier.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown tier: {}", s))
    }
}

/// One owned inventory unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserNft {
    pub id: String,
    pub owner: AccountId,
    pub catalog_item_id: String,
    /// Copied from the catalog item at mint time
    pub tier: NftTier,
    pub is_equipped: bool,
    pub is_burned: bool,
    pub acquired_at: DateTime<Utc>,
    pub burned_at: Option<DateTime<Utc>>,
}

impl UserNft {
    pub fn mint(
        owner: AccountId,
        catalog_item_id: String,
        tier: NftTier,
        now: DateTime<Utc>,
    ) -> Self {
        UserNft {
            id: Uuid::new_v4().to_string(),
            owner,
            catalog_item_id,
            tier,
            is_equipped: false,
            is_burned: false,
            acquired_at: now,
            burned_at: None,
        }
    }

    /// Burning is one-way; a burned unit is also unequipped
    pub fn burn(&mut self, now: DateTime<Utc>) {
        if !self.is_burned {
            self.is_burned = true;
            self.is_equipped = false;
            self.burned_at = Some(now);
        }
    }
}
