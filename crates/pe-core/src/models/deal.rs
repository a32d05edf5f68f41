use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::models::company::PePortfolioCompany;
use crate::models::person::PePerson;
use crate::schema::{pe_deal_advisors, pe_deal_participants, pe_deal_person_involvement, pe_deals};

/// A transaction event — ranging from a bare Form D filing placeholder to a
/// fully LLM-parsed buyout with participants (§3.3, §4.9 end-to-end
/// scenario). `source_url` is the dedup key across every collector that
/// writes deals; `press_release_url` is consulted too so a press-release
/// placeholder is found and enriched rather than duplicated.
#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = pe_deals)]
pub struct PeDeal {
    pub id: i32,
    pub company_id: Option<i32>,
    pub deal_type: Option<String>,
    pub deal_sub_type: Option<String>,
    pub deal_name: Option<String>,
    pub announced_date: Option<NaiveDate>,
    pub closed_date: Option<NaiveDate>,
    pub enterprise_value_usd: Option<BigDecimal>,
    pub buyer_name: Option<String>,
    pub seller_name: Option<String>,
    pub status: String,
    pub data_source: Option<String>,
    pub source_url: Option<String>,
    pub press_release_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = pe_deals)]
pub struct NewPeDeal {
    pub company_id: Option<i32>,
    pub deal_type: Option<String>,
    pub deal_sub_type: Option<String>,
    pub deal_name: Option<String>,
    pub announced_date: Option<NaiveDate>,
    pub closed_date: Option<NaiveDate>,
    pub enterprise_value_usd: Option<BigDecimal>,
    pub buyer_name: Option<String>,
    pub seller_name: Option<String>,
    pub status: String,
    pub data_source: Option<String>,
    pub source_url: Option<String>,
    pub press_release_url: Option<String>,
}

#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = pe_deals)]
pub struct PeDealPatch {
    pub deal_type: Option<String>,
    pub enterprise_value_usd: Option<BigDecimal>,
    pub announced_date: Option<NaiveDate>,
    pub closed_date: Option<NaiveDate>,
    pub seller_name: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl PeDeal {
    pub async fn find_by_id(conn: &mut AsyncPgConnection, id: i32) -> AppResult<Option<PeDeal>> {
        Ok(pe_deals::table
            .filter(pe_deals::id.eq(id))
            .select(PeDeal::as_select())
            .first(conn)
            .await
            .optional()?)
    }

    pub async fn find_by_source_url(
        conn: &mut AsyncPgConnection,
        source_url: &str,
    ) -> AppResult<Option<PeDeal>> {
        Ok(pe_deals::table
            .filter(pe_deals::source_url.eq(source_url))
            .select(PeDeal::as_select())
            .first(conn)
            .await
            .optional()?)
    }

    pub async fn find_by_press_release_url(
        conn: &mut AsyncPgConnection,
        press_release_url: &str,
    ) -> AppResult<Option<PeDeal>> {
        Ok(pe_deals::table
            .filter(pe_deals::press_release_url.eq(press_release_url))
            .select(PeDeal::as_select())
            .first(conn)
            .await
            .optional()?)
    }

    pub async fn create(conn: &mut AsyncPgConnection, new_deal: &NewPeDeal) -> AppResult<PeDeal> {
        Ok(diesel::insert_into(pe_deals::table)
            .values(new_deal)
            .returning(PeDeal::as_returning())
            .get_result(conn)
            .await?)
    }

    pub async fn apply_patch(
        conn: &mut AsyncPgConnection,
        id: i32,
        patch: &PeDealPatch,
    ) -> AppResult<()> {
        diesel::update(pe_deals::table.filter(pe_deals::id.eq(id)))
            .set(patch)
            .execute(conn)
            .await?;
        Ok(())
    }
}

/// A firm (or unresolved named party) on one side of a deal.
#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Associations, Serialize, Deserialize)]
#[diesel(table_name = pe_deal_participants)]
#[diesel(belongs_to(PeDeal, foreign_key = deal_id))]
pub struct PeDealParticipant {
    pub id: i32,
    pub deal_id: i32,
    pub firm_id: Option<i32>,
    pub participant_name: String,
    pub participant_type: Option<String>,
    pub role: Option<String>,
    pub is_lead: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = pe_deal_participants)]
pub struct NewPeDealParticipant {
    pub deal_id: i32,
    pub firm_id: Option<i32>,
    pub participant_name: String,
    pub participant_type: Option<String>,
    pub role: Option<String>,
    pub is_lead: bool,
}

impl PeDealParticipant {
    pub async fn exists(
        conn: &mut AsyncPgConnection,
        deal_id: i32,
        participant_name_lower: &str,
    ) -> AppResult<bool> {
        diesel::sql_function!(fn lower(x: diesel::sql_types::Text) -> diesel::sql_types::Text);
        let n: i64 = pe_deal_participants::table
            .filter(pe_deal_participants::deal_id.eq(deal_id))
            .filter(lower(pe_deal_participants::participant_name).eq(participant_name_lower))
            .select(diesel::dsl::count_star())
            .first(conn)
            .await?;
        Ok(n > 0)
    }

    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_participant: &NewPeDealParticipant,
    ) -> AppResult<PeDealParticipant> {
        Ok(diesel::insert_into(pe_deal_participants::table)
            .values(new_participant)
            .returning(PeDealParticipant::as_returning())
            .get_result(conn)
            .await?)
    }
}

/// An advisor (bank, law firm) credited on a deal. Not populated by any
/// collector in this implementation; modeled so it's available once a
/// source surfaces advisor mentions.
#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Associations, Serialize, Deserialize)]
#[diesel(table_name = pe_deal_advisors)]
#[diesel(belongs_to(PeDeal, foreign_key = deal_id))]
pub struct PeDealAdvisor {
    pub id: i32,
    pub deal_id: i32,
    pub firm_id: Option<i32>,
    pub advisor_name: String,
    pub advisor_type: Option<String>,
    pub role: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = pe_deal_advisors)]
pub struct NewPeDealAdvisor {
    pub deal_id: i32,
    pub firm_id: Option<i32>,
    pub advisor_name: String,
    pub advisor_type: Option<String>,
    pub role: Option<String>,
}

/// A person's involvement in a deal (e.g. a named operating partner).
/// Not populated by any collector in this implementation.
#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Associations, Serialize, Deserialize)]
#[diesel(table_name = pe_deal_person_involvement)]
#[diesel(belongs_to(PeDeal, foreign_key = deal_id))]
#[diesel(belongs_to(PePerson, foreign_key = person_id))]
pub struct PeDealPersonInvolvement {
    pub id: i32,
    pub deal_id: i32,
    pub person_id: i32,
    pub role: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = pe_deal_person_involvement)]
pub struct NewPeDealPersonInvolvement {
    pub deal_id: i32,
    pub person_id: i32,
    pub role: Option<String>,
}
