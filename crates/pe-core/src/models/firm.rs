use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::AppResult;
use crate::schema::{pe_fund_performance, pe_funds, pe_firms};

/// A private-equity general partner — the top-level firm entity (§3.3).
#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = pe_firms)]
pub struct PeFirm {
    pub id: i32,
    pub name: String,
    pub cik: Option<String>,
    pub crd_number: Option<String>,
    pub website: Option<String>,
    pub firm_type: Option<String>,
    pub aum_usd: Option<BigDecimal>,
    pub employee_count: Option<i32>,
    pub sic_code: Option<String>,
    pub headquarters_city: Option<String>,
    pub headquarters_state: Option<String>,
    pub headquarters_country: Option<String>,
    pub linkedin_url: Option<String>,
    pub twitter_url: Option<String>,
    pub contact_email: Option<String>,
    pub is_sec_registered: bool,
    pub status: String,
    pub confidence: Option<String>,
    pub data_sources: Option<Vec<Option<String>>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable, Validate)]
#[diesel(table_name = pe_firms)]
pub struct NewPeFirm {
    #[validate(length(min = 1, max = 500))]
    pub name: String,
    pub cik: Option<String>,
    pub crd_number: Option<String>,
    pub website: Option<String>,
    pub firm_type: Option<String>,
}

/// Patch applied to an existing firm row by a confidence-merge handler.
/// Every field is optional; the persister only sets the ones it touched.
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = pe_firms)]
pub struct PeFirmPatch {
    pub headquarters_city: Option<String>,
    pub headquarters_state: Option<String>,
    pub headquarters_country: Option<String>,
    pub cik: Option<String>,
    pub linkedin_url: Option<String>,
    pub twitter_url: Option<String>,
    pub contact_email: Option<String>,
    pub is_sec_registered: Option<bool>,
    pub data_sources: Option<Vec<Option<String>>>,
    pub updated_at: Option<DateTime<Utc>>,
}

diesel::sql_function!(fn lower(x: diesel::sql_types::Text) -> diesel::sql_types::Text);

impl PeFirm {
    pub async fn find_by_name_lower(
        conn: &mut AsyncPgConnection,
        name_lower: &str,
    ) -> AppResult<Option<PeFirm>> {
        Ok(pe_firms::table
            .filter(lower(pe_firms::name).eq(name_lower))
            .select(PeFirm::as_select())
            .first(conn)
            .await
            .optional()?)
    }

    pub async fn find_by_id(conn: &mut AsyncPgConnection, id: i32) -> AppResult<Option<PeFirm>> {
        Ok(pe_firms::table
            .filter(pe_firms::id.eq(id))
            .select(PeFirm::as_select())
            .first(conn)
            .await
            .optional()?)
    }

    /// All `(id, name)` pairs — used to warm the persister's firm cache.
    pub async fn list_id_name(conn: &mut AsyncPgConnection) -> AppResult<Vec<(i32, String)>> {
        Ok(pe_firms::table
            .select((pe_firms::id, pe_firms::name))
            .load(conn)
            .await?)
    }

    /// Active firms, optionally filtered by firm type, for the orchestrator's
    /// entity loader (§4.8 step 1) when no explicit ids are supplied.
    pub async fn find_active(
        conn: &mut AsyncPgConnection,
        firm_types: Option<&[String]>,
    ) -> AppResult<Vec<PeFirm>> {
        let mut query = pe_firms::table
            .filter(pe_firms::status.eq("Active"))
            .into_boxed();
        if let Some(types) = firm_types {
            if !types.is_empty() {
                query = query.filter(pe_firms::firm_type.eq_any(types));
            }
        }
        Ok(query.select(PeFirm::as_select()).load(conn).await?)
    }

    pub async fn find_by_ids(
        conn: &mut AsyncPgConnection,
        ids: &[i32],
    ) -> AppResult<Vec<PeFirm>> {
        Ok(pe_firms::table
            .filter(pe_firms::id.eq_any(ids))
            .select(PeFirm::as_select())
            .load(conn)
            .await?)
    }

    pub async fn create(conn: &mut AsyncPgConnection, new_firm: &NewPeFirm) -> AppResult<PeFirm> {
        Ok(diesel::insert_into(pe_firms::table)
            .values(new_firm)
            .returning(PeFirm::as_returning())
            .get_result(conn)
            .await?)
    }

    pub async fn apply_patch(
        conn: &mut AsyncPgConnection,
        id: i32,
        patch: &PeFirmPatch,
    ) -> AppResult<()> {
        diesel::update(pe_firms::table.filter(pe_firms::id.eq(id)))
            .set(patch)
            .execute(conn)
            .await?;
        Ok(())
    }
}

/// A fund vehicle belonging to a firm. Most rows are real funds seeded from
/// reference data; the 13F collector creates one synthetic holdings fund per
/// firm on demand (§3.4, I4).
#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Associations, Serialize, Deserialize)]
#[diesel(table_name = pe_funds)]
#[diesel(belongs_to(PeFirm, foreign_key = firm_id))]
pub struct PeFund {
    pub id: i32,
    pub firm_id: i32,
    pub name: String,
    pub strategy: Option<String>,
    pub vintage_year: Option<i32>,
    pub fund_size_usd: Option<BigDecimal>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = pe_funds)]
pub struct NewPeFund {
    pub firm_id: i32,
    pub name: String,
    pub strategy: Option<String>,
    pub status: String,
}

impl PeFund {
    pub const HOLDINGS_STRATEGY: &'static str = "13F Reported Holdings";

    pub async fn find_by_firm_and_strategy(
        conn: &mut AsyncPgConnection,
        firm_id: i32,
        strategy: &str,
    ) -> AppResult<Option<PeFund>> {
        Ok(pe_funds::table
            .filter(pe_funds::firm_id.eq(firm_id))
            .filter(pe_funds::strategy.eq(strategy))
            .select(PeFund::as_select())
            .first(conn)
            .await
            .optional()?)
    }

    /// `(firm_id, fund_id)` pairs for every synthetic holdings fund, used to
    /// warm the persister's `firm_id -> fund_id` cache.
    pub async fn list_holdings_funds(
        conn: &mut AsyncPgConnection,
    ) -> AppResult<Vec<(i32, i32)>> {
        Ok(pe_funds::table
            .filter(pe_funds::strategy.eq(Self::HOLDINGS_STRATEGY))
            .select((pe_funds::firm_id, pe_funds::id))
            .load(conn)
            .await?)
    }

    pub async fn create(conn: &mut AsyncPgConnection, new_fund: &NewPeFund) -> AppResult<PeFund> {
        Ok(diesel::insert_into(pe_funds::table)
            .values(new_fund)
            .returning(PeFund::as_returning())
            .get_result(conn)
            .await?)
    }
}

/// Periodic fund-level return metrics. Not written by any collector in this
/// implementation (no source in scope reports fund-level IRR/MOIC yet) but
/// modeled alongside `pe_funds` since it hangs off the same entity.
#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Associations, Serialize, Deserialize)]
#[diesel(table_name = pe_fund_performance)]
#[diesel(belongs_to(PeFund, foreign_key = fund_id))]
pub struct PeFundPerformance {
    pub id: i32,
    pub fund_id: i32,
    pub as_of_date: NaiveDate,
    pub net_irr_pct: Option<BigDecimal>,
    pub gross_irr_pct: Option<BigDecimal>,
    pub moic: Option<BigDecimal>,
    pub dpi: Option<BigDecimal>,
    pub rvpi: Option<BigDecimal>,
    pub tvpi: Option<BigDecimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = pe_fund_performance)]
pub struct NewPeFundPerformance {
    pub fund_id: i32,
    pub as_of_date: NaiveDate,
    pub net_irr_pct: Option<BigDecimal>,
    pub gross_irr_pct: Option<BigDecimal>,
    pub moic: Option<BigDecimal>,
}
