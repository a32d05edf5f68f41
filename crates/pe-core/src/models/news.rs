use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::models::firm::PeFirm;
use crate::schema::pe_firm_news;

/// A news mention about a firm, deduplicated by `source_url` (I2). Title is
/// truncated to the column's 1000-character limit before insert.
#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Associations, Serialize, Deserialize)]
#[diesel(table_name = pe_firm_news)]
#[diesel(belongs_to(PeFirm, foreign_key = firm_id))]
pub struct PeFirmNews {
    pub id: i32,
    pub firm_id: i32,
    pub title: String,
    pub source_name: Option<String>,
    pub source_url: String,
    pub summary: Option<String>,
    pub published_date: Option<DateTime<Utc>>,
    pub news_type: Option<String>,
    pub sentiment: Option<String>,
    pub sentiment_score: Option<BigDecimal>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = pe_firm_news)]
pub struct NewPeFirmNews {
    pub firm_id: i32,
    pub title: String,
    pub source_name: Option<String>,
    pub source_url: String,
    pub summary: Option<String>,
    pub published_date: Option<DateTime<Utc>>,
    pub news_type: Option<String>,
    pub sentiment: Option<String>,
    pub sentiment_score: Option<BigDecimal>,
}

impl PeFirmNews {
    pub const TITLE_MAX_LEN: usize = 1000;

    pub async fn find_by_source_url(
        conn: &mut AsyncPgConnection,
        source_url: &str,
    ) -> AppResult<Option<PeFirmNews>> {
        Ok(pe_firm_news::table
            .filter(pe_firm_news::source_url.eq(source_url))
            .select(PeFirmNews::as_select())
            .first(conn)
            .await
            .optional()?)
    }

    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_news: &NewPeFirmNews,
    ) -> AppResult<PeFirmNews> {
        Ok(diesel::insert_into(pe_firm_news::table)
            .values(new_news)
            .returning(PeFirmNews::as_returning())
            .get_result(conn)
            .await?)
    }
}
