//! Provider contract + the EastMoney mobile API client.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::NaiveDate;
use fundcat_core::{
    AssetComposition, Dividend, FundAggregate, FundRecord, Holding, IndustryComposition,
    ManagedFund, ManagerAttribution, ManagerProfile, PeriodReturn, Performance, RiskMetrics,
    UniverseEntry,
};
use fundcat_storage::{FetchError, HttpFetcher};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

pub const CRATE_NAME: &str = "fundcat-adapters";

pub const DEFAULT_BASE_URL: &str = "https://fundmobapi.eastmoney.com/FundMNewApi";
pub const DEFAULT_PAGE_SIZE: usize = 200;
/// Quote-list endpoint that serves the board (industry) listing.
pub const DEFAULT_INDUSTRY_LIST_URL: &str = "https://push2.eastmoney.com/api/qt/clist/get";

const INDUSTRY_PAGE_SIZE: usize = 500;

const APP_VERSION: &str = "6.6.8";

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("{endpoint} answered ErrCode {code}: {message}")]
    Upstream {
        endpoint: &'static str,
        code: i64,
        message: String,
    },
    #[error("{endpoint} returned no data for {subject}")]
    EmptyPayload {
        endpoint: &'static str,
        subject: String,
    },
}

/// External source of fund data. Implementations must be cheap to share across workers.
#[async_trait]
pub trait FundProvider: Send + Sync {
    /// Full list of funds in `category`. A failure here aborts the sync run.
    async fn fetch_universe(&self, category: &str) -> Result<Vec<UniverseEntry>, ProviderError>;

    /// Everything needed to persist one fund. Side-effect free, so safe to retry.
    async fn fetch_detail(&self, code: &str) -> Result<FundAggregate, ProviderError>;

    /// Ranked manager list for `category`, best yield first.
    async fn fetch_managers(&self, category: &str) -> Result<Vec<ManagerProfile>, ProviderError>;

    /// Names of the stock industry boards, deduplicated, provider order.
    async fn fetch_industry_list(&self) -> Result<Vec<String>, ProviderError>;
}

/// Envelope of the push2 quote-list API, which does not share the mobile API's shape.
#[derive(Debug, Deserialize)]
struct QuoteList {
    #[serde(default)]
    rc: i64,
    data: Option<QuoteListData>,
}

#[derive(Debug, Deserialize)]
struct QuoteListData {
    #[serde(default)]
    diff: Vec<QuoteListItem>,
}

#[derive(Debug, Deserialize)]
struct QuoteListItem {
    #[serde(default, deserialize_with = "lenient_string")]
    f14: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(rename = "Datas")]
    datas: Option<T>,
    #[serde(rename = "ErrCode", default)]
    err_code: i64,
    #[serde(rename = "ErrMsg", default)]
    err_msg: Option<String>,
    #[serde(rename = "TotalCount", default)]
    total_count: Option<u64>,
}

/// Parses the provider's loosely typed numbers: JSON numbers, numeric strings,
/// percent strings, and `"--"`/empty for "not published".
pub fn parse_num(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => {
            let trimmed = s.trim().trim_end_matches('%');
            if trimmed.is_empty() || trimmed == "--" {
                None
            } else {
                trimmed.parse().ok()
            }
        }
        _ => None,
    }
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let value = Option::<JsonValue>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(parse_num))
}

fn lenient_u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    let value = Option::<JsonValue>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(parse_num)
        .filter(|n| n.is_finite() && *n >= 0.0 && *n <= f64::from(u32::MAX))
        .map(|n| n as u32))
}

fn lenient_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    let value = Option::<JsonValue>::deserialize(deserializer)?;
    Ok(match value {
        Some(JsonValue::String(s)) => {
            let trimmed = s.trim();
            (!trimmed.is_empty() && trimmed != "--").then(|| trimmed.to_string())
        }
        Some(JsonValue::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_date<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<NaiveDate>, D::Error> {
    let value = lenient_string(deserializer)?;
    Ok(value.and_then(|s| {
        // Some endpoints append a time component.
        let day = s.get(..10).unwrap_or(&s);
        NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
    }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
struct RankItem {
    #[serde(default, deserialize_with = "lenient_string")]
    fcode: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    shortname: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
struct BasicInformation {
    #[serde(default, deserialize_with = "lenient_string")]
    fcode: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    shortname: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    ftype: Option<String>,
    #[serde(default, deserialize_with = "lenient_date")]
    estabdate: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient_f64")]
    endnav: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    indexcode: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    indexname: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    rate: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    dtzt: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PeriodIncrease {
    #[serde(default)]
    title: String,
    #[serde(default, deserialize_with = "lenient_f64")]
    syl: Option<f64>,
    #[serde(default, deserialize_with = "lenient_u32")]
    rank: Option<u32>,
    #[serde(default, deserialize_with = "lenient_u32")]
    sc: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
struct SpecialData {
    #[serde(default, deserialize_with = "lenient_f64")]
    stddev1: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    stddev3: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    stddev5: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    sharp1: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    sharp3: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    sharp5: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    maxretra1: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    maxretra3: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    maxretra5: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct InvestPosition {
    #[serde(rename = "fundStocks", default)]
    fund_stocks: Option<Vec<PositionStock>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
struct PositionStock {
    #[serde(default, deserialize_with = "lenient_string")]
    gpdm: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    gpjc: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    indexname: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    newtexch: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    jzbl: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pctnvchg: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
struct ManagerItem {
    #[serde(default, deserialize_with = "lenient_string")]
    mgrid: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    mgrname: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    totaldays: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    days: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    penavgrowth: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    yieldse: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
struct DividendItem {
    #[serde(default, deserialize_with = "lenient_date")]
    djr: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient_f64")]
    fhfcz: Option<f64>,
    #[serde(default, deserialize_with = "lenient_date")]
    ffr: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
struct AssetAllocationItem {
    #[serde(default, deserialize_with = "lenient_date")]
    fsrq: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient_f64")]
    gp: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    zq: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    hb: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    qt: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    jzc: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
struct SectorItem {
    #[serde(default, deserialize_with = "lenient_date")]
    fsrq: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient_string")]
    hymc: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    zjzbl: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
struct ManagerRankItem {
    #[serde(default, deserialize_with = "lenient_string")]
    mgrid: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    mgrname: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    jjgsid: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    jjgs: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    totaldays: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    penavgrowth: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    fcode: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    shortname: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    netnav: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    maxprofit: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    yieldse: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    ftype: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    score: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    resume: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    awardnum: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    fcodes: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    shortnames: Option<String>,
}

fn exchange_suffix(code: &str) -> String {
    match code {
        "0" => "SZ".to_string(),
        "1" => "SH".to_string(),
        "116" => "HK".to_string(),
        other => other.to_string(),
    }
}

fn performance_from(periods: &[PeriodIncrease]) -> Performance {
    let mut performance = Performance::default();
    for period in periods {
        let slot = match period.title.as_str() {
            "Z" => &mut performance.week,
            "Y" => &mut performance.month_1,
            "3Y" => &mut performance.month_3,
            "6Y" => &mut performance.month_6,
            "1N" => &mut performance.year_1,
            "2N" => &mut performance.year_2,
            "3N" => &mut performance.year_3,
            "5N" => &mut performance.year_5,
            "JN" => &mut performance.this_year,
            "LN" => &mut performance.historical,
            _ => continue,
        };
        *slot = PeriodReturn {
            profit_ratio: period.syl,
            rank: period.rank,
            peer_count: period.sc,
        };
    }
    performance
}

fn split_list(joined: Option<&str>) -> Vec<String> {
    joined
        .map(|s| {
            s.split(',')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn manager_profile_from(item: ManagerRankItem) -> Option<ManagerProfile> {
    let manager_id = item.mgrid?;
    let codes = split_list(item.fcodes.as_deref());
    let names = split_list(item.shortnames.as_deref());
    let funds = codes
        .into_iter()
        .enumerate()
        .map(|(i, fund_code)| ManagedFund {
            fund_name: names.get(i).cloned().unwrap_or_default(),
            fund_code,
        })
        .collect();
    Some(ManagerProfile {
        name: item.mgrname.unwrap_or_default(),
        manager_id,
        company_id: item.jjgsid,
        company_name: item.jjgs,
        working_years: item.totaldays.map(|days| days / 365.0),
        current_best_return: item.penavgrowth,
        current_best_fund_code: item.fcode,
        current_best_fund_name: item.shortname,
        current_fund_scale: item.netnav,
        working_best_return: item.maxprofit,
        yieldse: item.yieldse,
        current_best_fund_category: item.ftype,
        score: item.score,
        resume: item.resume,
        award_num: item.awardnum.map(|n| n as i32),
        funds,
    })
}

/// Client for the EastMoney mobile fund API.
///
/// Each instance presents a random device id; `HttpFetcher` rotates the user agent per request.
#[derive(Debug, Clone)]
pub struct EastMoneyProvider {
    http: HttpFetcher,
    base_url: String,
    industry_list_url: String,
    page_size: usize,
    device_id: String,
}

impl EastMoneyProvider {
    pub fn new(http: HttpFetcher, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            industry_list_url: DEFAULT_INDUSTRY_LIST_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            device_id: Uuid::new_v4().simple().to_string(),
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_industry_list_url(mut self, url: impl Into<String>) -> Self {
        self.industry_list_url = url.into();
        self
    }

    fn common_query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("deviceid", self.device_id.clone()),
            ("plat", "Iphone".to_string()),
            ("product", "EFund".to_string()),
            ("version", APP_VERSION.to_string()),
        ]
    }

    async fn call<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        params: Vec<(&'static str, String)>,
    ) -> Result<Envelope<T>, ProviderError> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let mut query = self.common_query();
        query.extend(params);
        let envelope: Envelope<T> = self.http.get_json(&url, &query).await?;
        if envelope.err_code != 0 {
            return Err(ProviderError::Upstream {
                endpoint,
                code: envelope.err_code,
                message: envelope.err_msg.unwrap_or_default(),
            });
        }
        Ok(envelope)
    }

    async fn fund_call<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        code: &str,
    ) -> Result<Option<T>, ProviderError> {
        let envelope = self
            .call::<T>(endpoint, vec![("FCODE", code.to_string())])
            .await?;
        Ok(envelope.datas)
    }

    /// Walks `pageIndex` from 1 until `TotalCount` rows arrived or a page comes back empty.
    async fn paged<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        params: Vec<(&'static str, String)>,
    ) -> Result<Vec<T>, ProviderError> {
        let mut rows = Vec::new();
        let mut page_index = 1usize;
        loop {
            let mut query = params.clone();
            query.push(("pageIndex", page_index.to_string()));
            query.push(("pagesize", self.page_size.to_string()));
            let envelope = self.call::<Vec<T>>(endpoint, query).await?;
            let total = envelope.total_count;
            let page = envelope.datas.unwrap_or_default();
            let page_len = page.len();
            rows.extend(page);
            debug!(endpoint, page_index, page_len, total = ?total, "fetched page");

            let exhausted = match total {
                Some(total) => rows.len() as u64 >= total,
                None => page_len < self.page_size,
            };
            if page_len == 0 || exhausted {
                return Ok(rows);
            }
            page_index += 1;
        }
    }
}

#[async_trait]
impl FundProvider for EastMoneyProvider {
    async fn fetch_universe(&self, category: &str) -> Result<Vec<UniverseEntry>, ProviderError> {
        let items: Vec<RankItem> = self
            .paged(
                "FundMNRankNewList",
                vec![
                    ("FundType", category.to_string()),
                    ("SortColumn", "SYL_1N".to_string()),
                    ("Sort", "desc".to_string()),
                ],
            )
            .await?;
        Ok(items
            .into_iter()
            .filter_map(|item| {
                Some(UniverseEntry {
                    code: item.fcode?,
                    name: item.shortname.unwrap_or_default(),
                    category: category.to_string(),
                })
            })
            .collect())
    }

    async fn fetch_detail(&self, code: &str) -> Result<FundAggregate, ProviderError> {
        let basic: BasicInformation = self
            .fund_call("FundMNNBasicInformation", code)
            .await?
            .ok_or_else(|| ProviderError::EmptyPayload {
                endpoint: "FundMNNBasicInformation",
                subject: code.to_string(),
            })?;
        let periods: Vec<PeriodIncrease> = self
            .fund_call("FundMNPeriodIncrease", code)
            .await?
            .unwrap_or_default();
        let special: SpecialData = self
            .fund_call("FundMNSpecialData", code)
            .await?
            .unwrap_or_default();
        let position: InvestPosition = self
            .fund_call("FundMNInverstPosition", code)
            .await?
            .unwrap_or_default();
        let managers: Vec<ManagerItem> = self
            .fund_call("FundMNMangerList", code)
            .await?
            .unwrap_or_default();
        let dividends: Vec<DividendItem> = self
            .fund_call("FundMNFHInfo", code)
            .await?
            .unwrap_or_default();
        let assets: Vec<AssetAllocationItem> = self
            .fund_call("FundMNAssetAllocationNew", code)
            .await?
            .unwrap_or_default();
        let sectors: Vec<SectorItem> = self
            .fund_call("FundMNSectorAllocation", code)
            .await?
            .unwrap_or_default();

        let record = FundRecord {
            code: basic.fcode.unwrap_or_else(|| code.to_string()),
            name: basic.shortname.unwrap_or_default(),
            category: basic.ftype.unwrap_or_default(),
            established_date: basic.estabdate,
            net_assets_scale: basic.endnav,
            index_code: basic.indexcode,
            index_name: basic.indexname,
            fee_rate: basic.rate,
            fixed_investment_available: basic.dtzt.as_deref() == Some("1"),
            stddev: RiskMetrics::from_horizons(special.stddev1, special.stddev3, special.stddev5),
            max_retracement: RiskMetrics::from_horizons(
                special.maxretra1,
                special.maxretra3,
                special.maxretra5,
            ),
            sharp: RiskMetrics::from_horizons(special.sharp1, special.sharp3, special.sharp5),
            performance: performance_from(&periods),
        };

        let holdings = position
            .fund_stocks
            .unwrap_or_default()
            .into_iter()
            .filter_map(|stock| {
                Some(Holding {
                    stock_code: stock.gpdm?,
                    stock_name: stock.gpjc.unwrap_or_default(),
                    industry: stock.indexname,
                    exchange_suffix: stock.newtexch.as_deref().map(exchange_suffix),
                    hold_ratio: stock.jzbl.unwrap_or_default(),
                    adjust_ratio: stock.pctnvchg,
                })
            })
            .collect();

        // The provider lists the current manager first.
        let manager = managers.into_iter().find_map(|item| {
            Some(ManagerAttribution {
                manager_id: item.mgrid?,
                manager_name: item.mgrname.unwrap_or_default(),
                working_days: item.totaldays,
                manage_days: item.days,
                manage_return: item.penavgrowth,
                years_avg_return: item.yieldse,
            })
        });

        let dividends = dividends
            .into_iter()
            .filter_map(|item| {
                Some(Dividend {
                    reg_date: item.djr?,
                    value: item.fhfcz?,
                    ration_date: item.ffr,
                })
            })
            .collect();

        let asset_composition = assets
            .into_iter()
            .filter_map(|item| {
                Some(AssetComposition {
                    pub_date: item.fsrq?,
                    stock: item.gp,
                    bond: item.zq,
                    cash: item.hb,
                    other: item.qt,
                    net_assets: item.jzc,
                })
            })
            .max_by_key(|assets| assets.pub_date);

        let latest_sector_date = sectors.iter().filter_map(|item| item.fsrq).max();
        let industry_composition = sectors
            .into_iter()
            .filter(|item| item.fsrq.is_some() && item.fsrq == latest_sector_date)
            .filter_map(|item| {
                Some(IndustryComposition {
                    pub_date: item.fsrq?,
                    industry: item.hymc?,
                    proportion: item.zjzbl,
                })
            })
            .collect();

        Ok(FundAggregate {
            record,
            holdings,
            manager,
            dividends,
            asset_composition,
            industry_composition,
        })
    }

    async fn fetch_managers(&self, category: &str) -> Result<Vec<ManagerProfile>, ProviderError> {
        let items: Vec<ManagerRankItem> = self
            .paged(
                "FundMNMangerRankList",
                vec![
                    ("FundType", category.to_string()),
                    ("SortColumn", "penavgrowth".to_string()),
                    ("Sort", "desc".to_string()),
                ],
            )
            .await?;
        let mut profiles = items
            .into_iter()
            .filter_map(manager_profile_from)
            .collect::<Vec<_>>();
        profiles.sort_by(|a, b| {
            b.yieldse
                .unwrap_or(f64::MIN)
                .total_cmp(&a.yieldse.unwrap_or(f64::MIN))
        });
        Ok(profiles)
    }

    async fn fetch_industry_list(&self) -> Result<Vec<String>, ProviderError> {
        let query = vec![
            ("pn", "1".to_string()),
            ("pz", INDUSTRY_PAGE_SIZE.to_string()),
            ("po", "1".to_string()),
            ("np", "1".to_string()),
            ("fltt", "2".to_string()),
            ("invt", "2".to_string()),
            ("fid", "f3".to_string()),
            ("fs", "m:90 t:2 f:!50".to_string()),
            ("fields", "f12,f14".to_string()),
        ];
        let list: QuoteList = self.http.get_json(&self.industry_list_url, &query).await?;
        if list.rc != 0 {
            return Err(ProviderError::Upstream {
                endpoint: "qt/clist",
                code: list.rc,
                message: "industry board list rejected".to_string(),
            });
        }
        let data = list.data.ok_or_else(|| ProviderError::EmptyPayload {
            endpoint: "qt/clist",
            subject: "industry list".to_string(),
        })?;

        let mut seen = HashSet::new();
        let names = data
            .diff
            .into_iter()
            .filter_map(|item| item.f14)
            .filter(|name| seen.insert(name.clone()))
            .collect::<Vec<_>>();
        debug!(industries = names.len(), "industry list fetched");
        Ok(names)
    }
}
