//! Collectible marketplace
//!
//! Purchases and upgrades run inside one ledger transaction on the buyer's
//! book, so the balance change and the inventory change commit together.

use crate::config::EconomyConfig;
use crate::error::{EconomyError, Result};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use points_core::{
    AuditAction, AuditLog, AuditLogEntry, LedgerStore, NftTier, UserNft, UPGRADE_BATCH_SIZE,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftCatalogItem {
    pub id: String,
    pub name: String,
    pub tier: NftTier,
    pub cost: u64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOutcome {
    pub unit: UserNft,
    pub new_balance: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeOutcome {
    pub minted: UserNft,
    pub burned: Vec<String>,
    pub delta: i64,
    pub new_balance: u64,
}

pub struct Marketplace {
    config: Arc<EconomyConfig>,
    ledger: Arc<LedgerStore>,
    audit: Arc<AuditLog>,
    catalog: DashMap<String, NftCatalogItem>,
}

impl Marketplace {
    pub fn new(config: Arc<EconomyConfig>, ledger: Arc<LedgerStore>, audit: Arc<AuditLog>) -> Self {
        Self::restore(config, ledger, audit, Vec::new())
    }

    pub fn restore(
        config: Arc<EconomyConfig>,
        ledger: Arc<LedgerStore>,
        audit: Arc<AuditLog>,
        items: Vec<NftCatalogItem>,
    ) -> Self {
        let catalog = DashMap::new();
        for item in items {
            catalog.insert(item.id.clone(), item);
        }
        Self {
            config,
            ledger,
            audit,
            catalog,
        }
    }

    pub fn add_item(
        &self,
        actor: &str,
        name: &str,
        tier: NftTier,
        cost: u64,
        now: DateTime<Utc>,
    ) -> Result<NftCatalogItem> {
        let name = name.trim();
        if name.is_empty() {
            return Err(EconomyError::InvalidInput("name is required".to_string()));
        }
        let item = NftCatalogItem {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            tier,
            cost,
            is_active: true,
            created_at: now,
        };
        self.catalog.insert(item.id.clone(), item.clone());

        self.audit.append(
            AuditLogEntry::new(AuditAction::CatalogItemAdded, now)
                .actor(actor)
                .meta("item_id", &item.id)
                .meta("tier", tier)
                .meta("cost", cost),
        );
        info!(item = %item.id, %tier, cost, "Catalog item added");
        Ok(item)
    }

    pub fn set_item_active(
        &self,
        actor: &str,
        item_id: &str,
        active: bool,
        now: DateTime<Utc>,
    ) -> Result<NftCatalogItem> {
        let (prior, item) = {
            let mut item = self
                .catalog
                .get_mut(item_id)
                .ok_or_else(|| EconomyError::ItemNotFound(item_id.to_string()))?;
            let prior = item.is_active;
            item.is_active = active;
            (prior, item.clone())
        };
        self.audit.append(
            AuditLogEntry::new(AuditAction::CatalogItemToggled, now)
                .actor(actor)
                .meta("item_id", item_id)
                .meta("prior", prior)
                .meta("result", active),
        );
        Ok(item)
    }

    pub fn item(&self, item_id: &str) -> Option<NftCatalogItem> {
        self.catalog.get(item_id).map(|i| i.clone())
    }

    /// Catalog ordered by tier then cost
    pub fn catalog(&self, include_inactive: bool) -> Vec<NftCatalogItem> {
        let mut items: Vec<NftCatalogItem> = self
            .catalog
            .iter()
            .map(|i| i.value().clone())
            .filter(|i| include_inactive || i.is_active)
            .collect();
        items.sort_by(|a, b| {
            a.tier
                .cmp(&b.tier)
                .then(a.cost.cmp(&b.cost))
                .then(a.id.cmp(&b.id))
        });
        items
    }

    pub fn inventory_of(&self, account_id: &str) -> Result<Vec<UserNft>> {
        Ok(self
            .ledger
            .read(account_id, |book| book.inventory.clone())?)
    }

    /// Debit the item's cost and mint one unit
    pub fn purchase(&self, account_id: &str, item_id: &str, now: DateTime<Utc>) -> Result<PurchaseOutcome> {
        let item = self
            .item(item_id)
            .ok_or_else(|| EconomyError::ItemNotFound(item_id.to_string()))?;
        if !item.is_active {
            return Err(EconomyError::ItemInactive(item_id.to_string()));
        }

        let outcome = self.ledger.transact(account_id, |book| {
            if !book.account.is_active() {
                return Err(EconomyError::AccountSuspended(account_id.to_string()));
            }
            let new_balance = book.debit(item.cost)?;
            let unit = UserNft::mint(account_id.to_string(), item.id.clone(), item.tier, now);
            book.inventory.push(unit.clone());
            book.account.updated_at = now;
            Ok(PurchaseOutcome { unit, new_balance })
        })?;

        self.audit.append(
            AuditLogEntry::new(AuditAction::NftPurchased, now)
                .actor(account_id)
                .target(account_id)
                .meta("item_id", item_id)
                .meta("unit_id", &outcome.unit.id)
                .meta("cost", item.cost)
                .meta("new_balance", outcome.new_balance),
        );
        info!(account = %account_id, item = %item_id, cost = item.cost, "Item purchased");
        Ok(outcome)
    }

    /// Flip the equipped flag of one owned unit; returns the new state
    pub fn toggle_equip(&self, account_id: &str, unit_id: &str) -> Result<bool> {
        self.ledger.transact(account_id, |book| {
            let unit = book
                .unit_mut(unit_id)
                .ok_or_else(|| EconomyError::NotOwned(unit_id.to_string()))?;
            if unit.is_burned {
                return Err(EconomyError::ItemBurned(unit_id.to_string()));
            }
            unit.is_equipped = !unit.is_equipped;
            Ok(unit.is_equipped)
        })
    }

    /// The item minted by an upgrade into `tier`: the cheapest active one
    fn upgrade_target(&self, tier: NftTier) -> Option<NftCatalogItem> {
        self.catalog(false).into_iter().find(|i| i.tier == tier)
    }

    /// Burn three same-tier units, apply the configured balance delta and
    /// mint one unit of the next tier
    pub fn upgrade(
        &self,
        account_id: &str,
        unit_ids: &[String],
        target_tier: NftTier,
        now: DateTime<Utc>,
    ) -> Result<UpgradeOutcome> {
        if unit_ids.len() != UPGRADE_BATCH_SIZE {
            return Err(EconomyError::InvalidCombination(format!(
                "exactly {} units are required",
                UPGRADE_BATCH_SIZE
            )));
        }
        let distinct: HashSet<&str> = unit_ids.iter().map(String::as_str).collect();
        if distinct.len() != UPGRADE_BATCH_SIZE {
            return Err(EconomyError::InvalidCombination(
                "units must be distinct".to_string(),
            ));
        }
        let target_item = self.upgrade_target(target_tier).ok_or_else(|| {
            EconomyError::InvalidCombination(format!("no {} item available to mint", target_tier))
        })?;

        let outcome = self.ledger.transact(account_id, |book| {
            if !book.account.is_active() {
                return Err(EconomyError::AccountSuspended(account_id.to_string()));
            }

            let mut source_tier = None;
            for unit_id in unit_ids {
                let unit = book.unit(unit_id).ok_or_else(|| {
                    EconomyError::InvalidCombination(format!("unit {} is not owned", unit_id))
                })?;
                if unit.is_burned {
                    return Err(EconomyError::InvalidCombination(format!(
                        "unit {} is already burned",
                        unit_id
                    )));
                }
                match source_tier {
                    None => source_tier = Some(unit.tier),
                    Some(tier) if tier != unit.tier => {
                        return Err(EconomyError::InvalidCombination(
                            "units must share a tier".to_string(),
                        ))
                    }
                    Some(_) => {}
                }
            }
            let source_tier = source_tier
                .ok_or_else(|| EconomyError::InvalidCombination("no units".to_string()))?;
            if source_tier.next() != Some(target_tier) {
                return Err(EconomyError::InvalidCombination(format!(
                    "{} units cannot be upgraded to {}",
                    source_tier, target_tier
                )));
            }
            let rule = self
                .config
                .upgrade_rule(source_tier, target_tier)
                .ok_or_else(|| {
                    EconomyError::InvalidCombination(format!(
                        "no upgrade rule for {} -> {}",
                        source_tier, target_tier
                    ))
                })?;

            let burned_before = book.inventory.iter().filter(|u| u.is_burned).count();
            let units_before = book.inventory.len();

            for unit_id in unit_ids {
                if let Some(unit) = book.unit_mut(unit_id) {
                    unit.burn(now);
                }
            }
            let new_balance = book.adjust(rule.delta)?;
            let minted = UserNft::mint(
                account_id.to_string(),
                target_item.id.clone(),
                target_tier,
                now,
            );
            book.inventory.push(minted.clone());
            book.account.updated_at = now;

            let burned_after = book.inventory.iter().filter(|u| u.is_burned).count();
            if burned_after != burned_before + UPGRADE_BATCH_SIZE
                || book.inventory.len() != units_before + 1
            {
                error!(account = %account_id, "Upgrade post-condition failed");
                return Err(EconomyError::Integrity(format!(
                    "upgrade for {} burned {} units and added {}",
                    account_id,
                    burned_after - burned_before,
                    book.inventory.len() - units_before
                )));
            }

            Ok(UpgradeOutcome {
                minted,
                burned: unit_ids.to_vec(),
                delta: rule.delta,
                new_balance,
            })
        })?;

        self.audit.append(
            AuditLogEntry::new(AuditAction::NftUpgraded, now)
                .actor(account_id)
                .target(account_id)
                .meta("burned", outcome.burned.join(","))
                .meta("minted", &outcome.minted.id)
                .meta("tier", target_tier)
                .meta("delta", outcome.delta)
                .meta("new_balance", outcome.new_balance),
        );
        info!(
            account = %account_id,
            tier = %target_tier,
            delta = outcome.delta,
            "Units upgraded"
        );
        Ok(outcome)
    }

    pub fn snapshot(&self) -> Vec<NftCatalogItem> {
        let mut items = self.catalog(true);
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use points_core::Account;

    struct Fixture {
        market: Marketplace,
        ledger: Arc<LedgerStore>,
        basic: NftCatalogItem,
        now: DateTime<Utc>,
    }

    fn fixture(balance: u64) -> Fixture {
        let now = Utc::now();
        let ledger = Arc::new(LedgerStore::new());
        ledger
            .open_account(Account::new("alice".into(), "Alice".into(), "ALICE001".into(), now))
            .unwrap();
        ledger.credit("alice", balance).unwrap();
        let market = Marketplace::new(
            Arc::new(EconomyConfig::default()),
            ledger.clone(),
            Arc::new(AuditLog::new()),
        );
        let basic = market
            .add_item("admin", "Pebble", NftTier::Basic, 0, now)
            .unwrap();
        market
            .add_item("admin", "Silver Coin", NftTier::Silver, 2_000, now)
            .unwrap();
        Fixture {
            market,
            ledger,
            basic,
            now,
        }
    }

    fn buy_basics(f: &Fixture, n: usize) -> Vec<String> {
        (0..n)
            .map(|_| f.market.purchase("alice", &f.basic.id, f.now).unwrap().unit.id)
            .collect()
    }

    #[test]
    fn test_purchase_insufficient_funds_changes_nothing() {
        let f = fixture(100);
        let gem = f
            .market
            .add_item("admin", "Gem", NftTier::Gold, 500, f.now)
            .unwrap();

        assert_eq!(
            f.market.purchase("alice", &gem.id, f.now),
            Err(EconomyError::InsufficientFunds {
                balance: 100,
                requested: 500
            })
        );
        assert_eq!(f.ledger.balance("alice").unwrap(), 100);
        assert!(f.market.inventory_of("alice").unwrap().is_empty());
    }

    #[test]
    fn test_inactive_and_unknown_items() {
        let f = fixture(1_000);
        f.market
            .set_item_active("admin", &f.basic.id, false, f.now)
            .unwrap();
        assert_eq!(
            f.market.purchase("alice", &f.basic.id, f.now),
            Err(EconomyError::ItemInactive(f.basic.id.clone()))
        );
        assert!(matches!(
            f.market.purchase("alice", "nope", f.now),
            Err(EconomyError::ItemNotFound(_))
        ));
    }

    #[test]
    fn test_upgrade_burns_three_and_mints_one() {
        let f = fixture(10_000);
        let units = buy_basics(&f, 3);

        let outcome = f
            .market
            .upgrade("alice", &units, NftTier::Silver, f.now)
            .unwrap();
        assert_eq!(outcome.new_balance, 5_000);
        assert_eq!(outcome.minted.tier, NftTier::Silver);

        let inventory = f.market.inventory_of("alice").unwrap();
        assert_eq!(inventory.len(), 4);
        assert_eq!(inventory.iter().filter(|u| u.is_burned).count(), 3);
        assert_eq!(
            inventory
                .iter()
                .filter(|u| !u.is_burned && u.tier == NftTier::Silver)
                .count(),
            1
        );
    }

    #[test]
    fn test_upgrade_rejects_bad_combinations() {
        let f = fixture(10_000);
        let units = buy_basics(&f, 3);

        let dup = vec![units[0].clone(), units[0].clone(), units[1].clone()];
        assert!(matches!(
            f.market.upgrade("alice", &dup, NftTier::Silver, f.now),
            Err(EconomyError::InvalidCombination(_))
        ));
        assert!(matches!(
            f.market.upgrade("alice", &units[..2], NftTier::Silver, f.now),
            Err(EconomyError::InvalidCombination(_))
        ));
        assert!(matches!(
            f.market.upgrade("alice", &units, NftTier::Gold, f.now),
            Err(EconomyError::InvalidCombination(_))
        ));

        f.market.upgrade("alice", &units, NftTier::Silver, f.now).unwrap();
        assert!(matches!(
            f.market.upgrade("alice", &units, NftTier::Silver, f.now),
            Err(EconomyError::InvalidCombination(_))
        ));
    }

    #[test]
    fn test_upgrade_insufficient_funds_aborts_everything() {
        let f = fixture(0);
        let units = buy_basics(&f, 3);

        assert!(matches!(
            f.market.upgrade("alice", &units, NftTier::Silver, f.now),
            Err(EconomyError::InsufficientFunds { .. })
        ));
        let inventory = f.market.inventory_of("alice").unwrap();
        assert_eq!(inventory.len(), 3);
        assert!(inventory.iter().all(|u| !u.is_burned));
    }

    #[test]
    fn test_toggle_equip() {
        let f = fixture(0);
        let units = buy_basics(&f, 3);

        assert_eq!(f.market.toggle_equip("alice", &units[0]), Ok(true));
        assert_eq!(f.market.toggle_equip("alice", &units[1]), Ok(true));
        assert_eq!(f.market.toggle_equip("alice", &units[0]), Ok(false));
        assert!(matches!(
            f.market.toggle_equip("alice", "foreign"),
            Err(EconomyError::NotOwned(_))
        ));
    }

    #[test]
    fn test_catalog_ordering_and_filter() {
        let f = fixture(0);
        f.market
            .set_item_active("admin", &f.basic.id, false, f.now)
            .unwrap();
        let visible = f.market.catalog(false);
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].tier, NftTier::Silver);
        assert_eq!(f.market.catalog(true)[0].tier, NftTier::Basic);
    }
}
