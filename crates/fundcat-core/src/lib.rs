//! Core domain model for the fund catalog: fund records, their child collections and sync metadata.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const CRATE_NAME: &str = "fundcat-core";

/// Fund codes are six ASCII digits. Anything else is upstream noise.
pub fn is_fund_code(code: &str) -> bool {
    code.len() == 6 && code.bytes().all(|b| b.is_ascii_digit())
}

/// One entry of the externally reported fund universe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniverseEntry {
    pub code: String,
    pub name: String,
    pub category: String,
}

/// Volatility, max-drawdown and sharpe-like metrics share the same horizon layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub avg_135: Option<f64>,
    pub year_1: Option<f64>,
    pub year_3: Option<f64>,
    pub year_5: Option<f64>,
}

impl RiskMetrics {
    /// Builds the bundle and derives `avg_135` as the mean of whichever horizons are published.
    pub fn from_horizons(year_1: Option<f64>, year_3: Option<f64>, year_5: Option<f64>) -> Self {
        let present = [year_1, year_3, year_5]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>();
        let avg_135 = if present.is_empty() {
            None
        } else {
            Some(present.iter().sum::<f64>() / present.len() as f64)
        };
        Self {
            avg_135,
            year_1,
            year_3,
            year_5,
        }
    }
}

/// Return over one trailing period plus the fund's rank among same-category peers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodReturn {
    pub profit_ratio: Option<f64>,
    pub rank: Option<u32>,
    pub peer_count: Option<u32>,
}

impl PeriodReturn {
    /// Rank as a percentage of the peer group; 1.0 means top 1%.
    pub fn rank_ratio(&self) -> Option<f64> {
        match (self.rank, self.peer_count) {
            (Some(rank), Some(peers)) if rank > 0 && peers > 0 => {
                Some(f64::from(rank) / f64::from(peers) * 100.0)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Performance {
    pub week: PeriodReturn,
    pub month_1: PeriodReturn,
    pub month_3: PeriodReturn,
    pub month_6: PeriodReturn,
    pub year_1: PeriodReturn,
    pub year_2: PeriodReturn,
    pub year_3: PeriodReturn,
    pub year_5: PeriodReturn,
    pub this_year: PeriodReturn,
    pub historical: PeriodReturn,
}

/// Canonical fund attributes as last reported by the provider.
///
/// Sync metadata and the classification flag are owned by the catalog and live in
/// [`CatalogFund`], so upserting a record can never clobber them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundRecord {
    pub code: String,
    pub name: String,
    pub category: String,
    pub established_date: Option<NaiveDate>,
    pub net_assets_scale: Option<f64>,
    pub index_code: Option<String>,
    pub index_name: Option<String>,
    pub fee_rate: Option<String>,
    pub fixed_investment_available: bool,
    pub stddev: RiskMetrics,
    pub max_retracement: RiskMetrics,
    pub sharp: RiskMetrics,
    pub performance: Performance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub stock_code: String,
    pub stock_name: String,
    pub industry: Option<String>,
    pub exchange_suffix: Option<String>,
    pub hold_ratio: f64,
    pub adjust_ratio: Option<f64>,
}

/// Current manager of a fund with tenure and realized-return metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagerAttribution {
    pub manager_id: String,
    pub manager_name: String,
    pub working_days: Option<f64>,
    pub manage_days: Option<f64>,
    pub manage_return: Option<f64>,
    pub years_avg_return: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dividend {
    pub reg_date: NaiveDate,
    pub value: f64,
    pub ration_date: Option<NaiveDate>,
}

/// Asset allocation snapshot, percentages of net assets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetComposition {
    pub pub_date: NaiveDate,
    pub stock: Option<f64>,
    pub bond: Option<f64>,
    pub cash: Option<f64>,
    pub other: Option<f64>,
    pub net_assets: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndustryComposition {
    pub pub_date: NaiveDate,
    pub industry: String,
    pub proportion: Option<f64>,
}

/// Everything one provider detail fetch yields for one fund, committed as a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundAggregate {
    pub record: FundRecord,
    pub holdings: Vec<Holding>,
    pub manager: Option<ManagerAttribution>,
    pub dividends: Vec<Dividend>,
    pub asset_composition: Option<AssetComposition>,
    pub industry_composition: Vec<IndustryComposition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncMetadata {
    pub last_sync_time: Option<DateTime<Utc>>,
    pub last_update_time: Option<DateTime<Utc>>,
    /// 0 until the first committed refresh.
    pub sync_version: i64,
}

/// A persisted fund as readers see it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogFund {
    pub record: FundRecord,
    pub is_4433: bool,
    pub sync: SyncMetadata,
    pub created_at: DateTime<Utc>,
}

/// Input row for the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationInput {
    pub code: String,
    pub category: String,
    pub performance: Performance,
}

/// Top-percentile thresholds for the 4433 rule.
///
/// Long horizons (1 year, this year, 2/3/5 years) must rank within the top
/// `long_horizon_top_percent` of same-category peers; short horizons (6 and 3 months)
/// within the top `short_horizon_top_percent`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RankThresholds {
    pub long_horizon_top_percent: f64,
    pub short_horizon_top_percent: f64,
}

impl Default for RankThresholds {
    fn default() -> Self {
        Self {
            long_horizon_top_percent: 25.0,
            short_horizon_top_percent: 33.33,
        }
    }
}

impl RankThresholds {
    pub fn passes(&self, performance: &Performance) -> bool {
        let within = |period: &PeriodReturn, limit: f64| {
            period.rank_ratio().is_some_and(|ratio| ratio <= limit)
        };
        // 2/3/5 year ranks do not exist for young funds and are only checked when published.
        let within_if_published = |period: &PeriodReturn, limit: f64| {
            period.rank_ratio().map_or(true, |ratio| ratio <= limit)
        };

        let long = self.long_horizon_top_percent;
        let short = self.short_horizon_top_percent;

        within(&performance.year_1, long)
            && within(&performance.this_year, long)
            && within_if_published(&performance.year_2, long)
            && within_if_published(&performance.year_3, long)
            && within_if_published(&performance.year_5, long)
            && within(&performance.month_6, short)
            && within(&performance.month_3, short)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedFund {
    pub fund_code: String,
    pub fund_name: String,
}

/// Manager profile from the ranked manager list, with the funds currently under management.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagerProfile {
    pub manager_id: String,
    pub name: String,
    pub company_id: Option<String>,
    pub company_name: Option<String>,
    pub working_years: Option<f64>,
    pub current_best_return: Option<f64>,
    pub current_best_fund_code: Option<String>,
    pub current_best_fund_name: Option<String>,
    pub current_fund_scale: Option<f64>,
    pub working_best_return: Option<f64>,
    pub yieldse: Option<f64>,
    pub current_best_fund_category: Option<String>,
    pub score: Option<f64>,
    pub resume: Option<String>,
    pub award_num: Option<i32>,
    pub funds: Vec<ManagedFund>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranked(rank: u32, peers: u32) -> PeriodReturn {
        PeriodReturn {
            profit_ratio: Some(1.0),
            rank: Some(rank),
            peer_count: Some(peers),
        }
    }

    fn strong_performance() -> Performance {
        Performance {
            year_1: ranked(10, 100),
            this_year: ranked(20, 100),
            year_2: ranked(5, 80),
            year_3: ranked(12, 60),
            year_5: ranked(9, 40),
            month_6: ranked(30, 100),
            month_3: ranked(33, 100),
            ..Default::default()
        }
    }

    #[test]
    fn fund_code_shape() {
        assert!(is_fund_code("000001"));
        assert!(!is_fund_code("00001"));
        assert!(!is_fund_code("0000012"));
        assert!(!is_fund_code("00000a"));
        assert!(!is_fund_code(""));
    }

    #[test]
    fn rank_ratio_needs_rank_and_peers() {
        assert_eq!(ranked(25, 100).rank_ratio(), Some(25.0));
        assert_eq!(PeriodReturn::default().rank_ratio(), None);
        assert_eq!(ranked(3, 0).rank_ratio(), None);
    }

    #[test]
    fn avg_135_uses_published_horizons() {
        let metrics = RiskMetrics::from_horizons(Some(1.0), None, Some(3.0));
        assert_eq!(metrics.avg_135, Some(2.0));
        assert_eq!(RiskMetrics::from_horizons(None, None, None).avg_135, None);
    }

    #[test]
    fn rule_4433_accepts_top_ranked_fund() {
        assert!(RankThresholds::default().passes(&strong_performance()));
    }

    #[test]
    fn rule_4433_rejects_any_horizon_out_of_range() {
        let thresholds = RankThresholds::default();

        let mut weak_year = strong_performance();
        weak_year.year_3 = ranked(30, 100);
        assert!(!thresholds.passes(&weak_year));

        let mut weak_quarter = strong_performance();
        weak_quarter.month_3 = ranked(34, 100);
        assert!(!thresholds.passes(&weak_quarter));
    }

    #[test]
    fn rule_4433_skips_unpublished_long_horizons_only() {
        let thresholds = RankThresholds::default();

        let mut young = strong_performance();
        young.year_2 = PeriodReturn::default();
        young.year_3 = PeriodReturn::default();
        young.year_5 = PeriodReturn::default();
        assert!(thresholds.passes(&young));

        let mut unranked = strong_performance();
        unranked.month_6 = PeriodReturn::default();
        assert!(!thresholds.passes(&unranked));
    }
}
