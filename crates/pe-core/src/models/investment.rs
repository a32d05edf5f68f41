use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::models::company::PePortfolioCompany;
use crate::models::firm::PeFund;
use crate::schema::pe_fund_investments;

/// A stake held by a fund in a portfolio company — a PE platform
/// investment, a 13F holding, or a 13D stake, distinguished by
/// `investment_type` (§3.4, §4.6, §4.7).
#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Associations, Serialize, Deserialize)]
#[diesel(table_name = pe_fund_investments)]
#[diesel(belongs_to(PeFund, foreign_key = fund_id))]
#[diesel(belongs_to(PePortfolioCompany, foreign_key = company_id))]
pub struct PeFundInvestment {
    pub id: i32,
    pub fund_id: i32,
    pub company_id: i32,
    pub investment_date: Option<NaiveDate>,
    pub investment_type: String,
    pub invested_amount_usd: Option<BigDecimal>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = pe_fund_investments)]
pub struct NewPeFundInvestment {
    pub fund_id: i32,
    pub company_id: i32,
    pub investment_date: Option<NaiveDate>,
    pub investment_type: String,
    pub invested_amount_usd: Option<BigDecimal>,
    pub status: String,
}

impl PeFundInvestment {
    pub const TYPE_13F_HOLDING: &'static str = "13F Holding";
    pub const TYPE_13D_STAKE: &'static str = "13D Stake";

    /// Dedup key for 13F holdings: `(fund, company, investment_date)` —
    /// `investment_date` carries the filing's report date.
    pub async fn find_by_fund_company_date(
        conn: &mut AsyncPgConnection,
        fund_id: i32,
        company_id: i32,
        investment_date: NaiveDate,
    ) -> AppResult<Option<PeFundInvestment>> {
        Ok(pe_fund_investments::table
            .filter(pe_fund_investments::fund_id.eq(fund_id))
            .filter(pe_fund_investments::company_id.eq(company_id))
            .filter(pe_fund_investments::investment_date.eq(investment_date))
            .select(PeFundInvestment::as_select())
            .first(conn)
            .await
            .optional()?)
    }

    /// Dedup key for 13D stakes: `(fund, company, investment_type)` — no
    /// date component, since a 13D amendment doesn't necessarily carry one.
    pub async fn find_by_fund_company_type(
        conn: &mut AsyncPgConnection,
        fund_id: i32,
        company_id: i32,
        investment_type: &str,
    ) -> AppResult<Option<PeFundInvestment>> {
        Ok(pe_fund_investments::table
            .filter(pe_fund_investments::fund_id.eq(fund_id))
            .filter(pe_fund_investments::company_id.eq(company_id))
            .filter(pe_fund_investments::investment_type.eq(investment_type))
            .select(PeFundInvestment::as_select())
            .first(conn)
            .await
            .optional()?)
    }

    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_investment: &NewPeFundInvestment,
    ) -> AppResult<PeFundInvestment> {
        Ok(diesel::insert_into(pe_fund_investments::table)
            .values(new_investment)
            .returning(PeFundInvestment::as_returning())
            .get_result(conn)
            .await?)
    }

    pub async fn update_invested_amount(
        conn: &mut AsyncPgConnection,
        id: i32,
        invested_amount_usd: &BigDecimal,
    ) -> AppResult<()> {
        diesel::update(pe_fund_investments::table.filter(pe_fund_investments::id.eq(id)))
            .set((
                pe_fund_investments::invested_amount_usd.eq(invested_amount_usd),
                pe_fund_investments::updated_at.eq(diesel::dsl::now),
            ))
            .execute(conn)
            .await?;
        Ok(())
    }
}
