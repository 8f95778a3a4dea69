use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use fundcat_core::{
    AssetComposition, CatalogFund, ClassificationInput, Dividend, FundRecord, Holding,
    IndustryComposition, ManagedFund, ManagerAttribution, ManagerProfile, SyncMetadata,
};
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

use crate::{
    content_fingerprint, CatalogRepository, CatalogTransaction, ChildCollection, KeyedChild,
    StorageError,
};

#[derive(Debug, Clone)]
struct StoredFund {
    record: FundRecord,
    fingerprint: String,
    is_4433: bool,
    sync: SyncMetadata,
    created_at: DateTime<Utc>,
    holdings: Vec<Holding>,
    managers: BTreeMap<String, ManagerAttribution>,
    dividends: Vec<Dividend>,
    assets: BTreeMap<NaiveDate, AssetComposition>,
    industries: Vec<IndustryComposition>,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    funds: BTreeMap<String, StoredFund>,
    managers: BTreeMap<String, ManagerProfile>,
    managed_funds: HashMap<String, Vec<ManagedFund>>,
    industries: Vec<String>,
}

impl MemoryState {
    fn fund_mut(&mut self, code: &str) -> Result<&mut StoredFund, StorageError> {
        self.funds
            .get_mut(code)
            .ok_or_else(|| StorageError::MissingFund(code.to_string()))
    }
}

/// In-process catalog with the same transactional contract as [`crate::PgCatalog`].
///
/// A transaction holds the write lock until it commits or is dropped, so readers only
/// ever observe committed states.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Places a fund directly into the committed state, bypassing the sync path.
    pub async fn seed_fund(&self, record: FundRecord, sync: SyncMetadata, is_4433: bool) {
        let fingerprint = content_fingerprint(&record).unwrap_or_default();
        let created_at = sync.last_sync_time.unwrap_or_else(Utc::now);
        let mut state = self.state.write().await;
        state.funds.insert(
            record.code.clone(),
            StoredFund {
                record,
                fingerprint,
                is_4433,
                sync,
                created_at,
                holdings: Vec::new(),
                managers: BTreeMap::new(),
                dividends: Vec::new(),
                assets: BTreeMap::new(),
                industries: Vec::new(),
            },
        );
    }

    pub async fn fund_count(&self) -> usize {
        self.state.read().await.funds.len()
    }

    pub async fn all_funds(&self) -> Vec<CatalogFund> {
        let state = self.state.read().await;
        state.funds.values().map(to_catalog_fund).collect()
    }
}

fn to_catalog_fund(stored: &StoredFund) -> CatalogFund {
    CatalogFund {
        record: stored.record.clone(),
        is_4433: stored.is_4433,
        sync: stored.sync,
        created_at: stored.created_at,
    }
}

#[async_trait]
impl CatalogRepository for MemoryCatalog {
    async fn begin(&self) -> Result<Box<dyn CatalogTransaction>, StorageError> {
        let guard = self.state.clone().write_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTransaction { guard, working }))
    }

    async fn select_new_candidates(
        &self,
        upstream_codes: &[String],
    ) -> Result<Vec<String>, StorageError> {
        let state = self.state.read().await;
        let mut seen = HashSet::new();
        Ok(upstream_codes
            .iter()
            .filter(|code| seen.insert(code.as_str()))
            .filter(|code| {
                state
                    .funds
                    .get(code.as_str())
                    .map_or(true, |fund| fund.sync.sync_version == 0)
            })
            .cloned()
            .collect())
    }

    async fn select_stale_candidates(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<String>, StorageError> {
        let state = self.state.read().await;
        let mut stale = state
            .funds
            .values()
            .filter(|fund| fund.sync.sync_version > 0)
            .filter_map(|fund| {
                fund.sync
                    .last_sync_time
                    .filter(|synced| *synced < cutoff)
                    .map(|synced| (synced, fund.record.code.clone()))
            })
            .collect::<Vec<_>>();
        stale.sort();
        Ok(stale.into_iter().take(limit).map(|(_, code)| code).collect())
    }

    async fn classification_inputs(&self) -> Result<Vec<ClassificationInput>, StorageError> {
        let state = self.state.read().await;
        Ok(state
            .funds
            .values()
            .map(|fund| ClassificationInput {
                code: fund.record.code.clone(),
                category: fund.record.category.clone(),
                performance: fund.record.performance.clone(),
            })
            .collect())
    }

    async fn fund(&self, code: &str) -> Result<Option<CatalogFund>, StorageError> {
        let state = self.state.read().await;
        Ok(state.funds.get(code).map(to_catalog_fund))
    }

    async fn holdings(&self, code: &str) -> Result<Vec<Holding>, StorageError> {
        let state = self.state.read().await;
        Ok(state
            .funds
            .get(code)
            .map(|fund| fund.holdings.clone())
            .unwrap_or_default())
    }

    async fn managers(&self, code: &str) -> Result<Vec<ManagerAttribution>, StorageError> {
        let state = self.state.read().await;
        Ok(state
            .funds
            .get(code)
            .map(|fund| fund.managers.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn dividends(&self, code: &str) -> Result<Vec<Dividend>, StorageError> {
        let state = self.state.read().await;
        Ok(state
            .funds
            .get(code)
            .map(|fund| fund.dividends.clone())
            .unwrap_or_default())
    }

    async fn asset_compositions(&self, code: &str) -> Result<Vec<AssetComposition>, StorageError> {
        let state = self.state.read().await;
        Ok(state
            .funds
            .get(code)
            .map(|fund| fund.assets.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn industry_compositions(
        &self,
        code: &str,
    ) -> Result<Vec<IndustryComposition>, StorageError> {
        let state = self.state.read().await;
        Ok(state
            .funds
            .get(code)
            .map(|fund| fund.industries.clone())
            .unwrap_or_default())
    }

    async fn manager_profile(
        &self,
        manager_id: &str,
    ) -> Result<Option<ManagerProfile>, StorageError> {
        let state = self.state.read().await;
        Ok(state.managers.get(manager_id).map(|stored| {
            let mut profile = stored.clone();
            profile.funds = state
                .managed_funds
                .get(manager_id)
                .cloned()
                .unwrap_or_default();
            profile
        }))
    }

    async fn industry_list(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.state.read().await.industries.clone())
    }
}

struct MemoryTransaction {
    guard: OwnedRwLockWriteGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl CatalogTransaction for MemoryTransaction {
    async fn upsert_fund_record(
        &mut self,
        record: &FundRecord,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let fingerprint = content_fingerprint(record)?;
        match self.working.funds.get_mut(&record.code) {
            Some(existing) => {
                if existing.fingerprint != fingerprint {
                    existing.sync.last_update_time = Some(at);
                }
                existing.record = record.clone();
                existing.fingerprint = fingerprint;
            }
            None => {
                self.working.funds.insert(
                    record.code.clone(),
                    StoredFund {
                        record: record.clone(),
                        fingerprint,
                        is_4433: false,
                        sync: SyncMetadata {
                            last_sync_time: None,
                            last_update_time: Some(at),
                            sync_version: 0,
                        },
                        created_at: at,
                        holdings: Vec::new(),
                        managers: BTreeMap::new(),
                        dividends: Vec::new(),
                        assets: BTreeMap::new(),
                        industries: Vec::new(),
                    },
                );
            }
        }
        Ok(())
    }

    async fn replace_child_collection(
        &mut self,
        fund_code: &str,
        rows: ChildCollection<'_>,
    ) -> Result<(), StorageError> {
        let fund = self.working.fund_mut(fund_code)?;
        match rows {
            ChildCollection::Holdings(rows) => fund.holdings = rows.to_vec(),
            ChildCollection::Dividends(rows) => fund.dividends = rows.to_vec(),
            ChildCollection::IndustryComposition(rows) => fund.industries = rows.to_vec(),
        }
        Ok(())
    }

    async fn upsert_by_natural_key(
        &mut self,
        fund_code: &str,
        row: KeyedChild<'_>,
    ) -> Result<(), StorageError> {
        let fund = self.working.fund_mut(fund_code)?;
        match row {
            KeyedChild::Manager(manager) => {
                fund.managers
                    .insert(manager.manager_id.clone(), manager.clone());
            }
            KeyedChild::AssetComposition(assets) => {
                fund.assets.insert(assets.pub_date, assets.clone());
            }
        }
        Ok(())
    }

    async fn retain_managers(
        &mut self,
        fund_code: &str,
        keep: Option<&str>,
    ) -> Result<(), StorageError> {
        let fund = self.working.fund_mut(fund_code)?;
        fund.managers.retain(|id, _| Some(id.as_str()) == keep);
        Ok(())
    }

    async fn mark_synced(&mut self, fund_code: &str, at: DateTime<Utc>) -> Result<(), StorageError> {
        let fund = self.working.fund_mut(fund_code)?;
        fund.sync.sync_version += 1;
        fund.sync.last_sync_time = Some(at);
        fund.sync.last_update_time.get_or_insert(at);
        Ok(())
    }

    async fn batch_update_flag(
        &mut self,
        codes: &[String],
        value: bool,
    ) -> Result<u64, StorageError> {
        let mut updated = 0;
        for code in codes {
            if let Some(fund) = self.working.funds.get_mut(code) {
                fund.is_4433 = value;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn batch_update_flag_except(
        &mut self,
        codes: &[String],
        value: bool,
    ) -> Result<u64, StorageError> {
        let excluded = codes.iter().map(String::as_str).collect::<HashSet<_>>();
        let mut updated = 0;
        for (code, fund) in self.working.funds.iter_mut() {
            if !excluded.contains(code.as_str()) {
                fund.is_4433 = value;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn upsert_manager_profile(
        &mut self,
        profile: &ManagerProfile,
        _at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let mut profile = profile.clone();
        profile.funds.clear();
        self.working
            .managers
            .insert(profile.manager_id.clone(), profile);
        Ok(())
    }

    async fn replace_managed_funds(
        &mut self,
        manager_id: &str,
        funds: &[ManagedFund],
        _at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.working
            .managed_funds
            .insert(manager_id.to_string(), funds.to_vec());
        Ok(())
    }

    async fn replace_industry_list(
        &mut self,
        names: &[String],
        _at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.working.industries = names.to_vec();
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        let MemoryTransaction { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StorageError> {
        Ok(())
    }
}
