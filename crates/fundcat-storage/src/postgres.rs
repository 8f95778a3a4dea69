use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fundcat_core::{
    AssetComposition, CatalogFund, ClassificationInput, Dividend, FundRecord, Holding,
    IndustryComposition, ManagedFund, ManagerAttribution, ManagerProfile, Performance,
    RiskMetrics, SyncMetadata,
};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder, Row, Transaction};
use tracing::info;

use crate::{
    content_fingerprint, position, CatalogRepository, CatalogTransaction, ChildCollection,
    KeyedChild, StorageError, INSERT_BATCH_SIZE,
};

const FUND_COLUMNS: &str = r#"
    code, name, category, established_date, net_assets_scale, index_code, index_name,
    fee_rate, fixed_investment_available, stddev, max_retracement, sharp, performance,
    is_4433, last_sync_time, last_update_time, sync_version, created_at
"#;

/// Postgres-backed catalog. Schema lives in `migrations/`.
#[derive(Debug, Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<(), StorageError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        info!("catalog migrations applied");
        Ok(())
    }
}

fn fund_from_row(row: &PgRow) -> Result<CatalogFund, sqlx::Error> {
    let stddev: Json<RiskMetrics> = row.try_get("stddev")?;
    let max_retracement: Json<RiskMetrics> = row.try_get("max_retracement")?;
    let sharp: Json<RiskMetrics> = row.try_get("sharp")?;
    let performance: Json<Performance> = row.try_get("performance")?;
    Ok(CatalogFund {
        record: FundRecord {
            code: row.try_get("code")?,
            name: row.try_get("name")?,
            category: row.try_get("category")?,
            established_date: row.try_get("established_date")?,
            net_assets_scale: row.try_get("net_assets_scale")?,
            index_code: row.try_get("index_code")?,
            index_name: row.try_get("index_name")?,
            fee_rate: row.try_get("fee_rate")?,
            fixed_investment_available: row.try_get("fixed_investment_available")?,
            stddev: stddev.0,
            max_retracement: max_retracement.0,
            sharp: sharp.0,
            performance: performance.0,
        },
        is_4433: row.try_get("is_4433")?,
        sync: SyncMetadata {
            last_sync_time: row.try_get("last_sync_time")?,
            last_update_time: row.try_get("last_update_time")?,
            sync_version: row.try_get("sync_version")?,
        },
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl CatalogRepository for PgCatalog {
    async fn begin(&self) -> Result<Box<dyn CatalogTransaction>, StorageError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTransaction { tx }))
    }

    async fn select_new_candidates(
        &self,
        upstream_codes: &[String],
    ) -> Result<Vec<String>, StorageError> {
        let synced: HashSet<String> = sqlx::query_scalar::<_, String>(
            r#"
            SELECT code
              FROM funds
             WHERE code = ANY($1)
               AND sync_version > 0
            "#,
        )
        .bind(upstream_codes)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .collect();

        let mut seen = HashSet::new();
        Ok(upstream_codes
            .iter()
            .filter(|code| seen.insert(code.as_str()))
            .filter(|code| !synced.contains(code.as_str()))
            .cloned()
            .collect())
    }

    async fn select_stale_candidates(
        &self,
        cutoff: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<String>, StorageError> {
        let codes = sqlx::query_scalar::<_, String>(
            r#"
            SELECT code
              FROM funds
             WHERE sync_version > 0
               AND last_sync_time < $1
             ORDER BY last_sync_time ASC, code ASC
             LIMIT $2
            "#,
        )
        .bind(cutoff)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        Ok(codes)
    }

    async fn classification_inputs(&self) -> Result<Vec<ClassificationInput>, StorageError> {
        let rows = sqlx::query("SELECT code, category, performance FROM funds ORDER BY code")
            .fetch_all(&self.pool)
            .await?;
        let mut inputs = Vec::with_capacity(rows.len());
        for row in rows {
            let performance: Json<Performance> = row.try_get("performance")?;
            inputs.push(ClassificationInput {
                code: row.try_get("code")?,
                category: row.try_get("category")?,
                performance: performance.0,
            });
        }
        Ok(inputs)
    }

    async fn fund(&self, code: &str) -> Result<Option<CatalogFund>, StorageError> {
        let row = sqlx::query(&format!("SELECT {FUND_COLUMNS} FROM funds WHERE code = $1"))
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(fund_from_row).transpose()?)
    }

    async fn holdings(&self, code: &str) -> Result<Vec<Holding>, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT stock_code, stock_name, industry, ex_code, hold_ratio, adjust_ratio
              FROM fund_stocks
             WHERE fund_code = $1
             ORDER BY position
            "#,
        )
        .bind(code)
        .fetch_all(&self.pool)
        .await?;
        let mut holdings = Vec::with_capacity(rows.len());
        for row in rows {
            holdings.push(Holding {
                stock_code: row.try_get("stock_code")?,
                stock_name: row.try_get("stock_name")?,
                industry: row.try_get("industry")?,
                exchange_suffix: row.try_get("ex_code")?,
                hold_ratio: row.try_get("hold_ratio")?,
                adjust_ratio: row.try_get("adjust_ratio")?,
            });
        }
        Ok(holdings)
    }

    async fn managers(&self, code: &str) -> Result<Vec<ManagerAttribution>, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT manager_id, manager_name, working_days, manage_days, manage_repay, years_avg_repay
              FROM fund_manager_relations
             WHERE fund_code = $1
             ORDER BY manager_id
            "#,
        )
        .bind(code)
        .fetch_all(&self.pool)
        .await?;
        let mut managers = Vec::with_capacity(rows.len());
        for row in rows {
            managers.push(ManagerAttribution {
                manager_id: row.try_get("manager_id")?,
                manager_name: row.try_get("manager_name")?,
                working_days: row.try_get("working_days")?,
                manage_days: row.try_get("manage_days")?,
                manage_return: row.try_get("manage_repay")?,
                years_avg_return: row.try_get("years_avg_repay")?,
            });
        }
        Ok(managers)
    }

    async fn dividends(&self, code: &str) -> Result<Vec<Dividend>, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT reg_date, value, ration_date
              FROM fund_dividends
             WHERE fund_code = $1
             ORDER BY position
            "#,
        )
        .bind(code)
        .fetch_all(&self.pool)
        .await?;
        let mut dividends = Vec::with_capacity(rows.len());
        for row in rows {
            dividends.push(Dividend {
                reg_date: row.try_get("reg_date")?,
                value: row.try_get("value")?,
                ration_date: row.try_get("ration_date")?,
            });
        }
        Ok(dividends)
    }

    async fn asset_compositions(&self, code: &str) -> Result<Vec<AssetComposition>, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT pub_date, stock, bond, cash, other, net_assets
              FROM fund_assets_proportion
             WHERE fund_code = $1
             ORDER BY pub_date
            "#,
        )
        .bind(code)
        .fetch_all(&self.pool)
        .await?;
        let mut assets = Vec::with_capacity(rows.len());
        for row in rows {
            assets.push(AssetComposition {
                pub_date: row.try_get("pub_date")?,
                stock: row.try_get("stock")?,
                bond: row.try_get("bond")?,
                cash: row.try_get("cash")?,
                other: row.try_get("other")?,
                net_assets: row.try_get("net_assets")?,
            });
        }
        Ok(assets)
    }

    async fn industry_compositions(
        &self,
        code: &str,
    ) -> Result<Vec<IndustryComposition>, StorageError> {
        let rows = sqlx::query(
            r#"
            SELECT pub_date, industry, prop
              FROM fund_industry_proportions
             WHERE fund_code = $1
             ORDER BY position
            "#,
        )
        .bind(code)
        .fetch_all(&self.pool)
        .await?;
        let mut industries = Vec::with_capacity(rows.len());
        for row in rows {
            industries.push(IndustryComposition {
                pub_date: row.try_get("pub_date")?,
                industry: row.try_get("industry")?,
                proportion: row.try_get("prop")?,
            });
        }
        Ok(industries)
    }

    async fn manager_profile(
        &self,
        manager_id: &str,
    ) -> Result<Option<ManagerProfile>, StorageError> {
        let Some(row) = sqlx::query(
            r#"
            SELECT id, name, fund_company_id, fund_company_name, working_years,
                   current_best_return, current_best_fund_code, current_best_fund_name,
                   current_fund_scale, working_best_return, yieldse, current_best_fund_type,
                   score, resume, award_num
              FROM fund_managers
             WHERE id = $1
            "#,
        )
        .bind(manager_id)
        .fetch_optional(&self.pool)
        .await?
        else {
            return Ok(None);
        };

        let funds = sqlx::query(
            r#"
            SELECT fund_code, fund_name
              FROM fund_manager_funds
             WHERE manager_id = $1
             ORDER BY position
            "#,
        )
        .bind(manager_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|row| {
            Ok(ManagedFund {
                fund_code: row.try_get("fund_code")?,
                fund_name: row.try_get("fund_name")?,
            })
        })
        .collect::<Result<Vec<_>, sqlx::Error>>()?;

        Ok(Some(ManagerProfile {
            manager_id: row.try_get("id")?,
            name: row.try_get("name")?,
            company_id: row.try_get("fund_company_id")?,
            company_name: row.try_get("fund_company_name")?,
            working_years: row.try_get("working_years")?,
            current_best_return: row.try_get("current_best_return")?,
            current_best_fund_code: row.try_get("current_best_fund_code")?,
            current_best_fund_name: row.try_get("current_best_fund_name")?,
            current_fund_scale: row.try_get("current_fund_scale")?,
            working_best_return: row.try_get("working_best_return")?,
            yieldse: row.try_get("yieldse")?,
            current_best_fund_category: row.try_get("current_best_fund_type")?,
            score: row.try_get("score")?,
            resume: row.try_get("resume")?,
            award_num: row.try_get("award_num")?,
            funds,
        }))
    }

    async fn industry_list(&self) -> Result<Vec<String>, StorageError> {
        let names = sqlx::query_scalar::<_, String>("SELECT name FROM industries ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(names)
    }
}

/// Dropping without `commit` lets sqlx roll the transaction back.
struct PgTransaction {
    tx: Transaction<'static, Postgres>,
}

impl PgTransaction {
    async fn ensure_fund(&mut self, fund_code: &str) -> Result<(), StorageError> {
        let exists: Option<i32> = sqlx::query_scalar("SELECT 1 FROM funds WHERE code = $1")
            .bind(fund_code)
            .fetch_optional(&mut *self.tx)
            .await?;
        match exists {
            Some(_) => Ok(()),
            None => Err(StorageError::MissingFund(fund_code.to_string())),
        }
    }
}

async fn insert_holdings(
    conn: &mut PgConnection,
    fund_code: &str,
    rows: &[Holding],
) -> Result<(), sqlx::Error> {
    for (chunk_index, chunk) in rows.chunks(INSERT_BATCH_SIZE).enumerate() {
        let offset = chunk_index * INSERT_BATCH_SIZE;
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO fund_stocks (fund_code, position, stock_code, stock_name, industry, ex_code, hold_ratio, adjust_ratio) ",
        );
        builder.push_values(chunk.iter().enumerate(), |mut b, (i, holding)| {
            b.push_bind(fund_code)
                .push_bind(position(offset + i))
                .push_bind(holding.stock_code.as_str())
                .push_bind(holding.stock_name.as_str())
                .push_bind(holding.industry.as_deref())
                .push_bind(holding.exchange_suffix.as_deref())
                .push_bind(holding.hold_ratio)
                .push_bind(holding.adjust_ratio);
        });
        builder.build().execute(&mut *conn).await?;
    }
    Ok(())
}

async fn insert_dividends(
    conn: &mut PgConnection,
    fund_code: &str,
    rows: &[Dividend],
) -> Result<(), sqlx::Error> {
    for (chunk_index, chunk) in rows.chunks(INSERT_BATCH_SIZE).enumerate() {
        let offset = chunk_index * INSERT_BATCH_SIZE;
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO fund_dividends (fund_code, position, reg_date, value, ration_date) ",
        );
        builder.push_values(chunk.iter().enumerate(), |mut b, (i, dividend)| {
            b.push_bind(fund_code)
                .push_bind(position(offset + i))
                .push_bind(dividend.reg_date)
                .push_bind(dividend.value)
                .push_bind(dividend.ration_date);
        });
        builder.build().execute(&mut *conn).await?;
    }
    Ok(())
}

async fn insert_industries(
    conn: &mut PgConnection,
    fund_code: &str,
    rows: &[IndustryComposition],
) -> Result<(), sqlx::Error> {
    for (chunk_index, chunk) in rows.chunks(INSERT_BATCH_SIZE).enumerate() {
        let offset = chunk_index * INSERT_BATCH_SIZE;
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO fund_industry_proportions (fund_code, position, pub_date, industry, prop) ",
        );
        builder.push_values(chunk.iter().enumerate(), |mut b, (i, industry)| {
            b.push_bind(fund_code)
                .push_bind(position(offset + i))
                .push_bind(industry.pub_date)
                .push_bind(industry.industry.as_str())
                .push_bind(industry.proportion);
        });
        builder.build().execute(&mut *conn).await?;
    }
    Ok(())
}

async fn insert_managed_funds(
    conn: &mut PgConnection,
    manager_id: &str,
    rows: &[ManagedFund],
    at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    for (chunk_index, chunk) in rows.chunks(INSERT_BATCH_SIZE).enumerate() {
        let offset = chunk_index * INSERT_BATCH_SIZE;
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO fund_manager_funds (manager_id, position, fund_code, fund_name, updated_at) ",
        );
        builder.push_values(chunk.iter().enumerate(), |mut b, (i, fund)| {
            b.push_bind(manager_id)
                .push_bind(position(offset + i))
                .push_bind(fund.fund_code.as_str())
                .push_bind(fund.fund_name.as_str())
                .push_bind(at);
        });
        builder.build().execute(&mut *conn).await?;
    }
    Ok(())
}

async fn insert_industry_names(
    conn: &mut PgConnection,
    names: &[String],
    at: DateTime<Utc>,
) -> Result<(), sqlx::Error> {
    for chunk in names.chunks(INSERT_BATCH_SIZE) {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO industries (name, updated_at) ");
        builder.push_values(chunk, |mut b, name| {
            b.push_bind(name.as_str()).push_bind(at);
        });
        builder.push(" ON CONFLICT (name) DO NOTHING");
        builder.build().execute(&mut *conn).await?;
    }
    Ok(())
}

#[async_trait]
impl CatalogTransaction for PgTransaction {
    async fn upsert_fund_record(
        &mut self,
        record: &FundRecord,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let fingerprint = content_fingerprint(record)?;
        sqlx::query(
            r#"
            INSERT INTO funds (
                code, name, category, established_date, net_assets_scale, index_code, index_name,
                fee_rate, fixed_investment_available, stddev, max_retracement, sharp, performance,
                content_hash, last_update_time, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $15)
            ON CONFLICT (code) DO UPDATE SET
                name = EXCLUDED.name,
                category = EXCLUDED.category,
                established_date = EXCLUDED.established_date,
                net_assets_scale = EXCLUDED.net_assets_scale,
                index_code = EXCLUDED.index_code,
                index_name = EXCLUDED.index_name,
                fee_rate = EXCLUDED.fee_rate,
                fixed_investment_available = EXCLUDED.fixed_investment_available,
                stddev = EXCLUDED.stddev,
                max_retracement = EXCLUDED.max_retracement,
                sharp = EXCLUDED.sharp,
                performance = EXCLUDED.performance,
                content_hash = EXCLUDED.content_hash,
                last_update_time = CASE
                    WHEN funds.content_hash IS DISTINCT FROM EXCLUDED.content_hash
                        THEN EXCLUDED.last_update_time
                    ELSE funds.last_update_time
                END
            "#,
        )
        .bind(&record.code)
        .bind(&record.name)
        .bind(&record.category)
        .bind(record.established_date)
        .bind(record.net_assets_scale)
        .bind(&record.index_code)
        .bind(&record.index_name)
        .bind(&record.fee_rate)
        .bind(record.fixed_investment_available)
        .bind(Json(&record.stddev))
        .bind(Json(&record.max_retracement))
        .bind(Json(&record.sharp))
        .bind(Json(&record.performance))
        .bind(fingerprint)
        .bind(at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn replace_child_collection(
        &mut self,
        fund_code: &str,
        rows: ChildCollection<'_>,
    ) -> Result<(), StorageError> {
        self.ensure_fund(fund_code).await?;
        let table = match rows {
            ChildCollection::Holdings(_) => "fund_stocks",
            ChildCollection::Dividends(_) => "fund_dividends",
            ChildCollection::IndustryComposition(_) => "fund_industry_proportions",
        };
        sqlx::query(&format!("DELETE FROM {table} WHERE fund_code = $1"))
            .bind(fund_code)
            .execute(&mut *self.tx)
            .await?;

        let conn = &mut *self.tx;
        match rows {
            ChildCollection::Holdings(rows) => insert_holdings(conn, fund_code, rows).await?,
            ChildCollection::Dividends(rows) => insert_dividends(conn, fund_code, rows).await?,
            ChildCollection::IndustryComposition(rows) => {
                insert_industries(conn, fund_code, rows).await?
            }
        }
        Ok(())
    }

    async fn upsert_by_natural_key(
        &mut self,
        fund_code: &str,
        row: KeyedChild<'_>,
    ) -> Result<(), StorageError> {
        self.ensure_fund(fund_code).await?;
        match row {
            KeyedChild::Manager(manager) => {
                sqlx::query(
                    r#"
                    INSERT INTO fund_manager_relations (
                        fund_code, manager_id, manager_name, working_days, manage_days,
                        manage_repay, years_avg_repay
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    ON CONFLICT (fund_code, manager_id) DO UPDATE SET
                        manager_name = EXCLUDED.manager_name,
                        working_days = EXCLUDED.working_days,
                        manage_days = EXCLUDED.manage_days,
                        manage_repay = EXCLUDED.manage_repay,
                        years_avg_repay = EXCLUDED.years_avg_repay
                    "#,
                )
                .bind(fund_code)
                .bind(&manager.manager_id)
                .bind(&manager.manager_name)
                .bind(manager.working_days)
                .bind(manager.manage_days)
                .bind(manager.manage_return)
                .bind(manager.years_avg_return)
                .execute(&mut *self.tx)
                .await?;
            }
            KeyedChild::AssetComposition(assets) => {
                sqlx::query(
                    r#"
                    INSERT INTO fund_assets_proportion (
                        fund_code, pub_date, stock, bond, cash, other, net_assets
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    ON CONFLICT (fund_code, pub_date) DO UPDATE SET
                        stock = EXCLUDED.stock,
                        bond = EXCLUDED.bond,
                        cash = EXCLUDED.cash,
                        other = EXCLUDED.other,
                        net_assets = EXCLUDED.net_assets
                    "#,
                )
                .bind(fund_code)
                .bind(assets.pub_date)
                .bind(assets.stock)
                .bind(assets.bond)
                .bind(assets.cash)
                .bind(assets.other)
                .bind(assets.net_assets)
                .execute(&mut *self.tx)
                .await?;
            }
        }
        Ok(())
    }

    async fn retain_managers(
        &mut self,
        fund_code: &str,
        keep: Option<&str>,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            DELETE FROM fund_manager_relations
             WHERE fund_code = $1
               AND manager_id IS DISTINCT FROM $2
            "#,
        )
        .bind(fund_code)
        .bind(keep)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn mark_synced(&mut self, fund_code: &str, at: DateTime<Utc>) -> Result<(), StorageError> {
        let result = sqlx::query(
            r#"
            UPDATE funds
               SET sync_version = sync_version + 1,
                   last_sync_time = $2,
                   last_update_time = COALESCE(last_update_time, $2)
             WHERE code = $1
            "#,
        )
        .bind(fund_code)
        .bind(at)
        .execute(&mut *self.tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StorageError::MissingFund(fund_code.to_string()));
        }
        Ok(())
    }

    async fn batch_update_flag(
        &mut self,
        codes: &[String],
        value: bool,
    ) -> Result<u64, StorageError> {
        let result = sqlx::query("UPDATE funds SET is_4433 = $2 WHERE code = ANY($1)")
            .bind(codes)
            .bind(value)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn batch_update_flag_except(
        &mut self,
        codes: &[String],
        value: bool,
    ) -> Result<u64, StorageError> {
        let result = sqlx::query("UPDATE funds SET is_4433 = $2 WHERE NOT (code = ANY($1))")
            .bind(codes)
            .bind(value)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn upsert_manager_profile(
        &mut self,
        profile: &ManagerProfile,
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO fund_managers (
                id, name, fund_company_id, fund_company_name, working_years,
                current_best_return, current_best_fund_code, current_best_fund_name,
                current_fund_scale, working_best_return, yieldse, current_best_fund_type,
                score, resume, award_num, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $16)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                fund_company_id = EXCLUDED.fund_company_id,
                fund_company_name = EXCLUDED.fund_company_name,
                working_years = EXCLUDED.working_years,
                current_best_return = EXCLUDED.current_best_return,
                current_best_fund_code = EXCLUDED.current_best_fund_code,
                current_best_fund_name = EXCLUDED.current_best_fund_name,
                current_fund_scale = EXCLUDED.current_fund_scale,
                working_best_return = EXCLUDED.working_best_return,
                yieldse = EXCLUDED.yieldse,
                current_best_fund_type = EXCLUDED.current_best_fund_type,
                score = EXCLUDED.score,
                resume = EXCLUDED.resume,
                award_num = EXCLUDED.award_num,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&profile.manager_id)
        .bind(&profile.name)
        .bind(&profile.company_id)
        .bind(&profile.company_name)
        .bind(profile.working_years)
        .bind(profile.current_best_return)
        .bind(&profile.current_best_fund_code)
        .bind(&profile.current_best_fund_name)
        .bind(profile.current_fund_scale)
        .bind(profile.working_best_return)
        .bind(profile.yieldse)
        .bind(&profile.current_best_fund_category)
        .bind(profile.score)
        .bind(&profile.resume)
        .bind(profile.award_num)
        .bind(at)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn replace_managed_funds(
        &mut self,
        manager_id: &str,
        funds: &[ManagedFund],
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM fund_manager_funds WHERE manager_id = $1")
            .bind(manager_id)
            .execute(&mut *self.tx)
            .await?;
        insert_managed_funds(&mut *self.tx, manager_id, funds, at).await?;
        Ok(())
    }

    async fn replace_industry_list(
        &mut self,
        names: &[String],
        at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM industries")
            .execute(&mut *self.tx)
            .await?;
        insert_industry_names(&mut *self.tx, names, at).await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StorageError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StorageError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
