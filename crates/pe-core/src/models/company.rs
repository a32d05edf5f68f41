use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::AppResult;
use crate::models::person::PePerson;
use crate::schema::{
    pe_company_financials, pe_company_leadership, pe_company_valuations, pe_competitor_mappings,
    pe_portfolio_companies,
};

/// A portfolio company — the target side of a deal or a 13F/13D holding
/// (§3.3). Rows come from portfolio listings, public-comps lookups, or as a
/// side effect of persisting a fund investment for an issuer seen for the
/// first time.
#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = pe_portfolio_companies)]
pub struct PePortfolioCompany {
    pub id: i32,
    pub name: String,
    pub industry: Option<String>,
    pub sector: Option<String>,
    pub description: Option<String>,
    pub employee_count: Option<i32>,
    pub headquarters_city: Option<String>,
    pub headquarters_state: Option<String>,
    pub headquarters_country: Option<String>,
    pub website: Option<String>,
    pub ticker: Option<String>,
    pub ownership_status: Option<String>,
    pub current_pe_owner: Option<String>,
    pub status: String,
    pub confidence: Option<String>,
    pub data_sources: Option<Vec<Option<String>>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable, Validate)]
#[diesel(table_name = pe_portfolio_companies)]
pub struct NewPePortfolioCompany {
    #[validate(length(min = 1, max = 500))]
    pub name: String,
    pub ownership_status: Option<String>,
    pub current_pe_owner: Option<String>,
    pub ticker: Option<String>,
    pub status: String,
}

#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = pe_portfolio_companies)]
pub struct PePortfolioCompanyPatch {
    pub website: Option<String>,
    pub description: Option<String>,
    pub current_pe_owner: Option<String>,
    pub ownership_status: Option<String>,
    pub industry: Option<String>,
    pub sector: Option<String>,
    pub employee_count: Option<i32>,
    pub headquarters_city: Option<String>,
    pub headquarters_state: Option<String>,
    pub headquarters_country: Option<String>,
    pub ticker: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

diesel::sql_function!(fn lower(x: diesel::sql_types::Text) -> diesel::sql_types::Text);

impl PePortfolioCompany {
    pub async fn find_by_name_lower(
        conn: &mut AsyncPgConnection,
        name_lower: &str,
    ) -> AppResult<Option<PePortfolioCompany>> {
        Ok(pe_portfolio_companies::table
            .filter(lower(pe_portfolio_companies::name).eq(name_lower))
            .select(PePortfolioCompany::as_select())
            .first(conn)
            .await
            .optional()?)
    }

    pub async fn find_by_id(
        conn: &mut AsyncPgConnection,
        id: i32,
    ) -> AppResult<Option<PePortfolioCompany>> {
        Ok(pe_portfolio_companies::table
            .filter(pe_portfolio_companies::id.eq(id))
            .select(PePortfolioCompany::as_select())
            .first(conn)
            .await
            .optional()?)
    }

    pub async fn list_id_name(conn: &mut AsyncPgConnection) -> AppResult<Vec<(i32, String)>> {
        Ok(pe_portfolio_companies::table
            .select((pe_portfolio_companies::id, pe_portfolio_companies::name))
            .load(conn)
            .await?)
    }

    pub async fn find_by_ids(
        conn: &mut AsyncPgConnection,
        ids: &[i32],
    ) -> AppResult<Vec<PePortfolioCompany>> {
        Ok(pe_portfolio_companies::table
            .filter(pe_portfolio_companies::id.eq_any(ids))
            .select(PePortfolioCompany::as_select())
            .load(conn)
            .await?)
    }

    pub async fn find_active_by_sector(
        conn: &mut AsyncPgConnection,
        sectors: Option<&[String]>,
    ) -> AppResult<Vec<PePortfolioCompany>> {
        let mut query = pe_portfolio_companies::table
            .filter(pe_portfolio_companies::status.eq("Active"))
            .into_boxed();
        if let Some(sectors) = sectors {
            if !sectors.is_empty() {
                query = query.filter(pe_portfolio_companies::sector.eq_any(sectors));
            }
        }
        Ok(query
            .select(PePortfolioCompany::as_select())
            .load(conn)
            .await?)
    }

    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_company: &NewPePortfolioCompany,
    ) -> AppResult<PePortfolioCompany> {
        Ok(diesel::insert_into(pe_portfolio_companies::table)
            .values(new_company)
            .returning(PePortfolioCompany::as_returning())
            .get_result(conn)
            .await?)
    }

    pub async fn apply_patch(
        conn: &mut AsyncPgConnection,
        id: i32,
        patch: &PePortfolioCompanyPatch,
    ) -> AppResult<()> {
        diesel::update(pe_portfolio_companies::table.filter(pe_portfolio_companies::id.eq(id)))
            .set(patch)
            .execute(conn)
            .await?;
        Ok(())
    }
}

/// One fiscal-period financial snapshot, keyed `(company, fiscal_year,
/// fiscal_period)`. Written by the public-comps collector, typically as a
/// trailing-twelve-month period.
#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Associations, Serialize, Deserialize)]
#[diesel(table_name = pe_company_financials)]
#[diesel(belongs_to(PePortfolioCompany, foreign_key = company_id))]
pub struct PeCompanyFinancial {
    pub id: i32,
    pub company_id: i32,
    pub fiscal_year: i32,
    pub fiscal_period: String,
    pub revenue_usd: Option<BigDecimal>,
    pub ebitda_usd: Option<BigDecimal>,
    pub gross_profit_usd: Option<BigDecimal>,
    pub ebit_usd: Option<BigDecimal>,
    pub net_income_usd: Option<BigDecimal>,
    pub total_assets_usd: Option<BigDecimal>,
    pub total_debt_usd: Option<BigDecimal>,
    pub cash_usd: Option<BigDecimal>,
    pub shareholders_equity_usd: Option<BigDecimal>,
    pub free_cash_flow_usd: Option<BigDecimal>,
    pub operating_cash_flow_usd: Option<BigDecimal>,
    pub gross_margin_pct: Option<BigDecimal>,
    pub ebitda_margin_pct: Option<BigDecimal>,
    pub revenue_growth_pct: Option<BigDecimal>,
    pub data_source: Option<String>,
    pub confidence: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = pe_company_financials)]
pub struct NewPeCompanyFinancial {
    pub company_id: i32,
    pub fiscal_year: i32,
    pub fiscal_period: String,
    pub revenue_usd: Option<BigDecimal>,
    pub ebitda_usd: Option<BigDecimal>,
    pub gross_profit_usd: Option<BigDecimal>,
    pub ebit_usd: Option<BigDecimal>,
    pub net_income_usd: Option<BigDecimal>,
    pub total_assets_usd: Option<BigDecimal>,
    pub total_debt_usd: Option<BigDecimal>,
    pub cash_usd: Option<BigDecimal>,
    pub shareholders_equity_usd: Option<BigDecimal>,
    pub free_cash_flow_usd: Option<BigDecimal>,
    pub operating_cash_flow_usd: Option<BigDecimal>,
    pub gross_margin_pct: Option<BigDecimal>,
    pub ebitda_margin_pct: Option<BigDecimal>,
    pub revenue_growth_pct: Option<BigDecimal>,
    pub data_source: Option<String>,
    pub confidence: Option<String>,
}

#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = pe_company_financials)]
pub struct PeCompanyFinancialPatch {
    pub revenue_usd: Option<BigDecimal>,
    pub ebitda_usd: Option<BigDecimal>,
    pub gross_profit_usd: Option<BigDecimal>,
    pub ebit_usd: Option<BigDecimal>,
    pub net_income_usd: Option<BigDecimal>,
    pub total_assets_usd: Option<BigDecimal>,
    pub total_debt_usd: Option<BigDecimal>,
    pub cash_usd: Option<BigDecimal>,
    pub shareholders_equity_usd: Option<BigDecimal>,
    pub free_cash_flow_usd: Option<BigDecimal>,
    pub operating_cash_flow_usd: Option<BigDecimal>,
    pub gross_margin_pct: Option<BigDecimal>,
    pub ebitda_margin_pct: Option<BigDecimal>,
    pub revenue_growth_pct: Option<BigDecimal>,
    pub confidence: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl PeCompanyFinancial {
    pub async fn find_existing(
        conn: &mut AsyncPgConnection,
        company_id: i32,
        fiscal_year: i32,
        fiscal_period: &str,
    ) -> AppResult<Option<PeCompanyFinancial>> {
        Ok(pe_company_financials::table
            .filter(pe_company_financials::company_id.eq(company_id))
            .filter(pe_company_financials::fiscal_year.eq(fiscal_year))
            .filter(pe_company_financials::fiscal_period.eq(fiscal_period))
            .select(PeCompanyFinancial::as_select())
            .first(conn)
            .await
            .optional()?)
    }

    /// Most recent row for a company by fiscal year, for collectors that
    /// need a financial-context snapshot rather than a specific period.
    pub async fn find_latest(
        conn: &mut AsyncPgConnection,
        company_id: i32,
    ) -> AppResult<Option<PeCompanyFinancial>> {
        Ok(pe_company_financials::table
            .filter(pe_company_financials::company_id.eq(company_id))
            .select(PeCompanyFinancial::as_select())
            .order(pe_company_financials::fiscal_year.desc())
            .first(conn)
            .await
            .optional()?)
    }

    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_financial: &NewPeCompanyFinancial,
    ) -> AppResult<PeCompanyFinancial> {
        Ok(diesel::insert_into(pe_company_financials::table)
            .values(new_financial)
            .returning(PeCompanyFinancial::as_returning())
            .get_result(conn)
            .await?)
    }

    pub async fn apply_patch(
        conn: &mut AsyncPgConnection,
        id: i32,
        patch: &PeCompanyFinancialPatch,
    ) -> AppResult<()> {
        diesel::update(pe_company_financials::table.filter(pe_company_financials::id.eq(id)))
            .set(patch)
            .execute(conn)
            .await?;
        Ok(())
    }
}

/// A point-in-time valuation estimate, keyed `(company, valuation_date,
/// data_source)` so a market-data refresh and an LLM estimate on the same
/// day coexist rather than clobber each other.
#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Associations, Serialize, Deserialize)]
#[diesel(table_name = pe_company_valuations)]
#[diesel(belongs_to(PePortfolioCompany, foreign_key = company_id))]
pub struct PeCompanyValuation {
    pub id: i32,
    pub company_id: i32,
    pub valuation_date: NaiveDate,
    pub enterprise_value_usd: Option<BigDecimal>,
    pub equity_value_usd: Option<BigDecimal>,
    pub ev_revenue_multiple: Option<BigDecimal>,
    pub ev_ebitda_multiple: Option<BigDecimal>,
    pub price_earnings_multiple: Option<BigDecimal>,
    pub valuation_type: Option<String>,
    pub methodology: Option<String>,
    pub data_source: String,
    pub source_url: Option<String>,
    pub confidence: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = pe_company_valuations)]
pub struct NewPeCompanyValuation {
    pub company_id: i32,
    pub valuation_date: NaiveDate,
    pub enterprise_value_usd: Option<BigDecimal>,
    pub equity_value_usd: Option<BigDecimal>,
    pub ev_revenue_multiple: Option<BigDecimal>,
    pub ev_ebitda_multiple: Option<BigDecimal>,
    pub price_earnings_multiple: Option<BigDecimal>,
    pub valuation_type: Option<String>,
    pub methodology: Option<String>,
    pub data_source: String,
    pub source_url: Option<String>,
    pub confidence: Option<String>,
}

impl PeCompanyValuation {
    pub async fn find_existing(
        conn: &mut AsyncPgConnection,
        company_id: i32,
        valuation_date: NaiveDate,
        data_source: &str,
    ) -> AppResult<Option<PeCompanyValuation>> {
        Ok(pe_company_valuations::table
            .filter(pe_company_valuations::company_id.eq(company_id))
            .filter(pe_company_valuations::valuation_date.eq(valuation_date))
            .filter(pe_company_valuations::data_source.eq(data_source))
            .select(PeCompanyValuation::as_select())
            .first(conn)
            .await
            .optional()?)
    }

    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_valuation: &NewPeCompanyValuation,
    ) -> AppResult<PeCompanyValuation> {
        Ok(diesel::insert_into(pe_company_valuations::table)
            .values(new_valuation)
            .returning(PeCompanyValuation::as_returning())
            .get_result(conn)
            .await?)
    }
}

/// A leadership link between a person and a portfolio company — distinct
/// from `pe_firm_people`, which links a person to the PE firm itself.
#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Associations, Serialize, Deserialize)]
#[diesel(table_name = pe_company_leadership)]
#[diesel(belongs_to(PePortfolioCompany, foreign_key = company_id))]
#[diesel(belongs_to(PePerson, foreign_key = person_id))]
pub struct PeCompanyLeadership {
    pub id: i32,
    pub company_id: i32,
    pub person_id: i32,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = pe_company_leadership)]
pub struct NewPeCompanyLeadership {
    pub company_id: i32,
    pub person_id: i32,
    pub title: Option<String>,
}

impl PeCompanyLeadership {
    pub async fn exists(
        conn: &mut AsyncPgConnection,
        company_id: i32,
        person_id: i32,
    ) -> AppResult<bool> {
        use diesel::dsl::count_star;
        let n: i64 = pe_company_leadership::table
            .filter(pe_company_leadership::company_id.eq(company_id))
            .filter(pe_company_leadership::person_id.eq(person_id))
            .select(count_star())
            .first(conn)
            .await?;
        Ok(n > 0)
    }

    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_link: &NewPeCompanyLeadership,
    ) -> AppResult<PeCompanyLeadership> {
        Ok(diesel::insert_into(pe_company_leadership::table)
            .values(new_link)
            .returning(PeCompanyLeadership::as_returning())
            .get_result(conn)
            .await?)
    }
}

/// A competitor relationship between two portfolio companies. Not populated
/// by any collector in this implementation; modeled so downstream tooling
/// (and a future collector) has somewhere to write it.
#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = pe_competitor_mappings)]
pub struct PeCompetitorMapping {
    pub id: i32,
    pub company_id: i32,
    pub competitor_company_id: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = pe_competitor_mappings)]
pub struct NewPeCompetitorMapping {
    pub company_id: i32,
    pub competitor_company_id: i32,
}
