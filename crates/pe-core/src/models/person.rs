use chrono::{DateTime, Utc};
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::AppResult;
use crate::models::firm::PeFirm;
use crate::schema::{pe_firm_people, pe_people, pe_person_education, pe_person_experience};

diesel::sql_function!(fn lower(x: diesel::sql_types::Text) -> diesel::sql_types::Text);

/// A natural person — a team member, founder, or Form D related person
/// (§3.3). Deduplicated first by LinkedIn URL, then by lowercased full name.
#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize, Deserialize)]
#[diesel(table_name = pe_people)]
pub struct PePerson {
    pub id: i32,
    pub full_name: String,
    pub linkedin_url: Option<String>,
    pub current_title: Option<String>,
    pub current_company: Option<String>,
    pub bio: Option<String>,
    pub confidence: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable, Validate)]
#[diesel(table_name = pe_people)]
pub struct NewPePerson {
    #[validate(length(min = 1, max = 300))]
    pub full_name: String,
    pub linkedin_url: Option<String>,
    pub current_title: Option<String>,
    pub current_company: Option<String>,
}

#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = pe_people)]
pub struct PePersonPatch {
    pub current_title: Option<String>,
    pub current_company: Option<String>,
    pub bio: Option<String>,
    pub linkedin_url: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl PePerson {
    pub async fn find_by_id(conn: &mut AsyncPgConnection, id: i32) -> AppResult<Option<PePerson>> {
        Ok(pe_people::table
            .filter(pe_people::id.eq(id))
            .select(PePerson::as_select())
            .first(conn)
            .await
            .optional()?)
    }

    pub async fn find_by_linkedin_url(
        conn: &mut AsyncPgConnection,
        linkedin_url: &str,
    ) -> AppResult<Option<PePerson>> {
        Ok(pe_people::table
            .filter(pe_people::linkedin_url.eq(linkedin_url))
            .select(PePerson::as_select())
            .first(conn)
            .await
            .optional()?)
    }

    /// `(id, full_name, linkedin_url)` rows, used to warm the persister's
    /// person cache keyed by LinkedIn URL or lowercase name.
    pub async fn list_id_name_linkedin(
        conn: &mut AsyncPgConnection,
    ) -> AppResult<Vec<(i32, String, Option<String>)>> {
        Ok(pe_people::table
            .select((pe_people::id, pe_people::full_name, pe_people::linkedin_url))
            .load(conn)
            .await?)
    }

    pub async fn create(conn: &mut AsyncPgConnection, new_person: &NewPePerson) -> AppResult<PePerson> {
        Ok(diesel::insert_into(pe_people::table)
            .values(new_person)
            .returning(PePerson::as_returning())
            .get_result(conn)
            .await?)
    }

    pub async fn apply_patch(
        conn: &mut AsyncPgConnection,
        id: i32,
        patch: &PePersonPatch,
    ) -> AppResult<()> {
        diesel::update(pe_people::table.filter(pe_people::id.eq(id)))
            .set(patch)
            .execute(conn)
            .await?;
        Ok(())
    }
}

/// One education entry for a person, deduplicated by `(person_id,
/// lower(institution))`.
#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Associations, Serialize, Deserialize)]
#[diesel(table_name = pe_person_education)]
#[diesel(belongs_to(PePerson, foreign_key = person_id))]
pub struct PePersonEducation {
    pub id: i32,
    pub person_id: i32,
    pub institution: String,
    pub degree: Option<String>,
    pub field_of_study: Option<String>,
    pub graduation_year: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = pe_person_education)]
pub struct NewPePersonEducation {
    pub person_id: i32,
    pub institution: String,
    pub degree: Option<String>,
    pub field_of_study: Option<String>,
    pub graduation_year: Option<i32>,
}

impl PePersonEducation {
    pub async fn exists(
        conn: &mut AsyncPgConnection,
        person_id: i32,
        institution_lower: &str,
    ) -> AppResult<bool> {
        let n: i64 = pe_person_education::table
            .filter(pe_person_education::person_id.eq(person_id))
            .filter(lower(pe_person_education::institution).eq(institution_lower))
            .select(count_star())
            .first(conn)
            .await?;
        Ok(n > 0)
    }

    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_row: &NewPePersonEducation,
    ) -> AppResult<PePersonEducation> {
        Ok(diesel::insert_into(pe_person_education::table)
            .values(new_row)
            .returning(PePersonEducation::as_returning())
            .get_result(conn)
            .await?)
    }
}

/// One work-experience entry for a person, deduplicated by `(person_id,
/// lower(company), lower(title))`.
#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Associations, Serialize, Deserialize)]
#[diesel(table_name = pe_person_experience)]
#[diesel(belongs_to(PePerson, foreign_key = person_id))]
pub struct PePersonExperience {
    pub id: i32,
    pub person_id: i32,
    pub company: String,
    pub title: String,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = pe_person_experience)]
pub struct NewPePersonExperience {
    pub person_id: i32,
    pub company: String,
    pub title: String,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
}

impl PePersonExperience {
    pub async fn exists(
        conn: &mut AsyncPgConnection,
        person_id: i32,
        company_lower: &str,
        title_lower: &str,
    ) -> AppResult<bool> {
        let n: i64 = pe_person_experience::table
            .filter(pe_person_experience::person_id.eq(person_id))
            .filter(lower(pe_person_experience::company).eq(company_lower))
            .filter(lower(pe_person_experience::title).eq(title_lower))
            .select(count_star())
            .first(conn)
            .await?;
        Ok(n > 0)
    }

    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_row: &NewPePersonExperience,
    ) -> AppResult<PePersonExperience> {
        Ok(diesel::insert_into(pe_person_experience::table)
            .values(new_row)
            .returning(PePersonExperience::as_returning())
            .get_result(conn)
            .await?)
    }
}

/// A person's role at a PE firm itself (team page, ADV filing signatory,
/// Form D related person) — separate from `pe_company_leadership`, which
/// covers portfolio-company roles.
#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Associations, Serialize, Deserialize)]
#[diesel(table_name = pe_firm_people)]
#[diesel(belongs_to(PeFirm, foreign_key = firm_id))]
#[diesel(belongs_to(PePerson, foreign_key = person_id))]
pub struct PeFirmPeople {
    pub id: i32,
    pub firm_id: i32,
    pub person_id: i32,
    pub title: Option<String>,
    pub is_current: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = pe_firm_people)]
pub struct NewPeFirmPeople {
    pub firm_id: i32,
    pub person_id: i32,
    pub title: Option<String>,
    pub is_current: bool,
}

impl PeFirmPeople {
    pub async fn exists(
        conn: &mut AsyncPgConnection,
        firm_id: i32,
        person_id: i32,
    ) -> AppResult<bool> {
        let n: i64 = pe_firm_people::table
            .filter(pe_firm_people::firm_id.eq(firm_id))
            .filter(pe_firm_people::person_id.eq(person_id))
            .select(count_star())
            .first(conn)
            .await?;
        Ok(n > 0)
    }

    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_link: &NewPeFirmPeople,
    ) -> AppResult<PeFirmPeople> {
        Ok(diesel::insert_into(pe_firm_people::table)
            .values(new_link)
            .returning(PeFirmPeople::as_returning())
            .get_result(conn)
            .await?)
    }
}
