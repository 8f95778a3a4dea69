//! Scripted provider and fault-injecting catalog shared by the pipeline tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use fundcat_adapters::{FundProvider, ProviderError};
use fundcat_core::{
    AssetComposition, CatalogFund, ClassificationInput, Dividend, FundAggregate, FundRecord,
    Holding, IndustryComposition, ManagedFund, ManagerAttribution, ManagerProfile, PeriodReturn,
    Performance, RiskMetrics, UniverseEntry,
};
use fundcat_storage::{
    CatalogRepository, CatalogTransaction, ChildCollection, KeyedChild, MemoryCatalog,
    StorageError,
};

pub fn record(code: &str) -> FundRecord {
    FundRecord {
        code: code.into(),
        name: format!("Fund {code}"),
        category: "债券型".into(),
        established_date: NaiveDate::from_ymd_opt(2015, 1, 5),
        net_assets_scale: Some(1.0e9),
        index_code: None,
        index_name: None,
        fee_rate: Some("0.08%".into()),
        fixed_investment_available: true,
        stddev: RiskMetrics::from_horizons(Some(1.2), Some(1.4), None),
        max_retracement: RiskMetrics::from_horizons(Some(0.8), None, None),
        sharp: RiskMetrics::from_horizons(Some(2.1), None, None),
        performance: Performance::default(),
    }
}

pub fn ranked(rank: u32, peers: u32) -> PeriodReturn {
    PeriodReturn {
        profit_ratio: Some(3.0),
        rank: Some(rank),
        peer_count: Some(peers),
    }
}

pub fn passing_performance() -> Performance {
    Performance {
        year_1: ranked(10, 100),
        this_year: ranked(15, 100),
        year_3: ranked(20, 100),
        month_6: ranked(25, 100),
        month_3: ranked(30, 100),
        ..Default::default()
    }
}

pub fn failing_performance() -> Performance {
    Performance {
        year_1: ranked(60, 100),
        ..passing_performance()
    }
}

/// Deterministic aggregate so repeated fetches return identical payloads.
pub fn aggregate(code: &str, holdings: usize) -> FundAggregate {
    let pub_date = NaiveDate::from_ymd_opt(2025, 12, 31).unwrap_or_default();
    FundAggregate {
        record: record(code),
        holdings: (0..holdings)
            .map(|i| Holding {
                stock_code: format!("{:06}", 600_000 + i),
                stock_name: format!("stock {i}"),
                industry: Some("银行".into()),
                exchange_suffix: Some("SH".into()),
                hold_ratio: 2.5,
                adjust_ratio: None,
            })
            .collect(),
        manager: Some(ManagerAttribution {
            manager_id: format!("m-{code}"),
            manager_name: "Li".into(),
            working_days: Some(2000.0),
            manage_days: Some(700.0),
            manage_return: Some(18.0),
            years_avg_return: Some(5.0),
        }),
        dividends: vec![Dividend {
            reg_date: NaiveDate::from_ymd_opt(2025, 6, 20).unwrap_or_default(),
            value: 0.01,
            ration_date: None,
        }],
        asset_composition: Some(AssetComposition {
            pub_date,
            stock: Some(1.0),
            bond: Some(96.0),
            cash: Some(2.0),
            other: Some(1.0),
            net_assets: Some(10.0),
        }),
        industry_composition: vec![
            IndustryComposition {
                pub_date,
                industry: "金融业".into(),
                proportion: Some(0.8),
            },
            IndustryComposition {
                pub_date,
                industry: "制造业".into(),
                proportion: None,
            },
        ],
    }
}

pub fn universe(codes: &[&str]) -> Vec<UniverseEntry> {
    codes
        .iter()
        .map(|code| UniverseEntry {
            code: code.to_string(),
            name: format!("Fund {code}"),
            category: "zq".into(),
        })
        .collect()
}

fn scripted_error(code: &str) -> ProviderError {
    ProviderError::EmptyPayload {
        endpoint: "scripted",
        subject: code.to_string(),
    }
}

/// Provider double with per-code failure scripts and in-flight accounting.
#[derive(Default)]
pub struct ScriptedProvider {
    universe: Vec<UniverseEntry>,
    universe_fails: bool,
    universe_panics: bool,
    /// `fetch_detail` panics for this code.
    panics_on: Option<String>,
    details: HashMap<String, FundAggregate>,
    /// Number of leading failures per code; `usize::MAX` never recovers.
    failures: HashMap<String, usize>,
    managers: Vec<ManagerProfile>,
    industries: Vec<String>,
    delay: Duration,
    calls: Mutex<HashMap<String, usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(entries: Vec<UniverseEntry>) -> Self {
        Self {
            universe: entries,
            ..Default::default()
        }
    }

    pub fn failing_universe() -> Self {
        Self {
            universe_fails: true,
            ..Default::default()
        }
    }

    pub fn panicking_universe() -> Self {
        Self {
            universe_panics: true,
            ..Default::default()
        }
    }

    pub fn with_panic(mut self, code: &str) -> Self {
        self.panics_on = Some(code.to_string());
        self
    }

    pub fn with_industries(mut self, names: Vec<String>) -> Self {
        self.industries = names;
        self
    }

    pub fn with_detail(mut self, aggregate: FundAggregate) -> Self {
        self.details.insert(aggregate.record.code.clone(), aggregate);
        self
    }

    pub fn with_failures(mut self, code: &str, leading_failures: usize) -> Self {
        self.failures.insert(code.to_string(), leading_failures);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_managers(mut self, managers: Vec<ManagerProfile>) -> Self {
        self.managers = managers;
        self
    }

    pub fn calls(&self, code: &str) -> usize {
        self.calls
            .lock()
            .expect("calls lock")
            .get(code)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().expect("calls lock").values().sum()
    }

    pub fn fetched_codes(&self) -> Vec<String> {
        let mut codes = self
            .calls
            .lock()
            .expect("calls lock")
            .keys()
            .cloned()
            .collect::<Vec<_>>();
        codes.sort();
        codes
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FundProvider for ScriptedProvider {
    async fn fetch_universe(&self, category: &str) -> Result<Vec<UniverseEntry>, ProviderError> {
        assert!(!self.universe_panics, "scripted universe panic");
        if self.universe_fails {
            return Err(ProviderError::Upstream {
                endpoint: "scripted",
                code: 500,
                message: format!("universe {category} unavailable"),
            });
        }
        Ok(self.universe.clone())
    }

    async fn fetch_detail(&self, code: &str) -> Result<FundAggregate, ProviderError> {
        if self.panics_on.as_deref() == Some(code) {
            panic!("scripted panic for {code}");
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let attempt = {
            let mut calls = self.calls.lock().expect("calls lock");
            let entry = calls.entry(code.to_string()).or_insert(0);
            *entry += 1;
            *entry
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let leading_failures = self.failures.get(code).copied().unwrap_or(0);
        if attempt <= leading_failures {
            return Err(scripted_error(code));
        }
        Ok(self
            .details
            .get(code)
            .cloned()
            .unwrap_or_else(|| aggregate(code, 2)))
    }

    async fn fetch_managers(&self, _category: &str) -> Result<Vec<ManagerProfile>, ProviderError> {
        if self.universe_fails {
            return Err(scripted_error("managers"));
        }
        Ok(self.managers.clone())
    }

    async fn fetch_industry_list(&self) -> Result<Vec<String>, ProviderError> {
        if self.universe_fails {
            return Err(scripted_error("industries"));
        }
        Ok(self.industries.clone())
    }
}

pub fn manager_profile(id: &str, funds: &[&str]) -> ManagerProfile {
    ManagerProfile {
        manager_id: id.into(),
        name: format!("manager {id}"),
        company_id: Some("80000229".into()),
        company_name: Some("Example AMC".into()),
        working_years: Some(7.5),
        current_best_return: Some(30.2),
        current_best_fund_code: funds.first().map(|c| c.to_string()),
        current_best_fund_name: None,
        current_fund_scale: Some(5.0e9),
        working_best_return: Some(55.0),
        yieldse: Some(6.1),
        current_best_fund_category: Some("债券型".into()),
        score: Some(80.0),
        resume: None,
        award_num: Some(1),
        funds: funds
            .iter()
            .map(|code| ManagedFund {
                fund_code: code.to_string(),
                fund_name: format!("Fund {code}"),
            })
            .collect(),
    }
}

fn injected_failure() -> StorageError {
    let source = serde_json::from_str::<u8>("injected").expect_err("invalid json");
    StorageError::Encode {
        what: "holdings",
        source,
    }
}

/// Wraps a [`MemoryCatalog`] and fails every holdings replacement for one fund code.
#[derive(Clone)]
pub struct FailingCatalog {
    inner: MemoryCatalog,
    failing_code: String,
}

impl FailingCatalog {
    pub fn new(inner: MemoryCatalog, failing_code: &str) -> Self {
        Self {
            inner,
            failing_code: failing_code.to_string(),
        }
    }
}

struct FailingTransaction {
    inner: Box<dyn CatalogTransaction>,
    failing_code: String,
}

#[async_trait]
impl CatalogRepository for FailingCatalog {
    async fn begin(&self) -> Result<Box<dyn CatalogTransaction>, StorageError> {
        Ok(Box::new(FailingTransaction {
            inner: self.inner.begin().await?,
            failing_code: self.failing_code.clone(),
        }))
    }

    async fn select_new_candidates(
        &self,
        upstream_codes: &[String],
    ) -> Result<Vec<String>, StorageError> {
        self.inner.select_new_candidates(upstream_codes).await
    }

    async fn select_stale_candidates(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<String>, StorageError> {
        self.inner.select_stale_candidates(cutoff, limit).await
    }

    async fn classification_inputs(&self) -> Result<Vec<ClassificationInput>, StorageError> {
        self.inner.classification_inputs().await
    }

    async fn fund(&self, code: &str) -> Result<Option<CatalogFund>, StorageError> {
        self.inner.fund(code).await
    }

    async fn holdings(&self, code: &str) -> Result<Vec<Holding>, StorageError> {
        self.inner.holdings(code).await
    }

    async fn managers(&self, code: &str) -> Result<Vec<ManagerAttribution>, StorageError> {
        self.inner.managers(code).await
    }

    async fn dividends(&self, code: &str) -> Result<Vec<Dividend>, StorageError> {
        self.inner.dividends(code).await
    }

    async fn asset_compositions(&self, code: &str) -> Result<Vec<AssetComposition>, StorageError> {
        self.inner.asset_compositions(code).await
    }

    async fn industry_compositions(
        &self,
        code: &str,
    ) -> Result<Vec<IndustryComposition>, StorageError> {
        self.inner.industry_compositions(code).await
    }

    async fn manager_profile(
        &self,
        manager_id: &str,
    ) -> Result<Option<ManagerProfile>, StorageError> {
        self.inner.manager_profile(manager_id).await
    }

    async fn industry_list(&self) -> Result<Vec<String>, StorageError> {
        self.inner.industry_list().await
    }
}

#[async_trait]
impl CatalogTransaction for FailingTransaction {
    async fn upsert_fund_record(
        &mut self,
        record: &FundRecord,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.inner.upsert_fund_record(record, at).await
    }

    async fn replace_child_collection(
        &mut self,
        fund_code: &str,
        rows: ChildCollection<'_>,
    ) -> Result<(), StorageError> {
        if fund_code == self.failing_code && matches!(rows, ChildCollection::Holdings(_)) {
            return Err(injected_failure());
        }
        self.inner.replace_child_collection(fund_code, rows).await
    }

    async fn upsert_by_natural_key(
        &mut self,
        fund_code: &str,
        row: KeyedChild<'_>,
    ) -> Result<(), StorageError> {
        self.inner.upsert_by_natural_key(fund_code, row).await
    }

    async fn retain_managers(
        &mut self,
        fund_code: &str,
        keep: Option<&str>,
    ) -> Result<(), StorageError> {
        self.inner.retain_managers(fund_code, keep).await
    }

    async fn mark_synced(&mut self, fund_code: &str, at: DateTime<Utc>) -> Result<(), StorageError> {
        self.inner.mark_synced(fund_code, at).await
    }

    async fn batch_update_flag(
        &mut self,
        codes: &[String],
        value: bool,
    ) -> Result<u64, StorageError> {
        self.inner.batch_update_flag(codes, value).await
    }

    async fn batch_update_flag_except(
        &mut self,
        codes: &[String],
        value: bool,
    ) -> Result<u64, StorageError> {
        self.inner.batch_update_flag_except(codes, value).await
    }

    async fn upsert_manager_profile(
        &mut self,
        profile: &ManagerProfile,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.inner.upsert_manager_profile(profile, at).await
    }

    async fn replace_managed_funds(
        &mut self,
        manager_id: &str,
        funds: &[ManagedFund],
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.inner.replace_managed_funds(manager_id, funds, at).await
    }

    async fn replace_industry_list(
        &mut self,
        names: &[String],
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.inner.replace_industry_list(names, at).await
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        self.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<(), StorageError> {
        self.inner.rollback().await
    }
}
