//! Phase 1 (entity) item handlers (§4.9), grounded field-for-field in
//! `original_source/app/sources/pe_collection/persister.py`'s
//! `_persist_firm_update`, `_persist_portfolio_company`,
//! `_persist_team_member`, `_persist_person`, `_persist_related_person`,
//! and `_persist_company_update` handlers.

use chrono::Utc;
use diesel_async::AsyncPgConnection;

use pe_core::error::{AppError, AppResult};
use pe_core::model::{
    CompanyUpdatePayload, Confidence, FirmUpdatePayload, FormAdvFilingPayload, ItemEnvelope,
    PersonPayload, PortfolioCompanyPayload, RelatedPersonPayload, TeamMemberPayload,
};
use pe_core::models::company::{PePortfolioCompany, PePortfolioCompanyPatch};
use pe_core::models::firm::{PeFirm, PeFirmPatch};
use pe_core::models::person::{
    NewPeFirmPeople, NewPePersonEducation, NewPePersonExperience, PeFirmPeople, PePerson,
    PePersonEducation, PePersonExperience, PePersonPatch,
};

use crate::cache::FkCaches;
use crate::merge::{merge_field, should_overwrite};
use crate::resolve::resolve_or_create_person;
use crate::stats::Outcome;

pub async fn persist_firm_update(
    conn: &mut AsyncPgConnection,
    _caches: &mut FkCaches,
    envelope: &ItemEnvelope<FirmUpdatePayload>,
) -> AppResult<Outcome> {
    let payload = &envelope.payload;
    let existing = PeFirm::find_by_id(conn, payload.entity_id)
        .await?
        .ok_or_else(|| AppError::persistence(format!("firm {} not found", payload.entity_id)))?;

    let existing_confidence = existing.confidence.as_deref().and_then(Confidence::parse);
    let new_confidence = envelope.confidence;

    let mut data_sources = existing.data_sources.clone().unwrap_or_default();
    let already_sourced = data_sources
        .iter()
        .any(|s| s.as_deref() == Some(payload.source_label.as_str()));
    let data_sources_patch = if already_sourced {
        None
    } else {
        data_sources.push(Some(payload.source_label.clone()));
        Some(data_sources)
    };

    let is_sec_registered_patch = payload.is_sec_registered.and_then(|v| {
        if should_overwrite(false, new_confidence, existing_confidence) {
            Some(v)
        } else {
            None
        }
    });

    let patch = PeFirmPatch {
        headquarters_city: merge_field(
            payload.headquarters_city.as_ref(),
            &existing.headquarters_city,
            new_confidence,
            existing_confidence,
        ),
        headquarters_state: merge_field(
            payload.headquarters_state.as_ref(),
            &existing.headquarters_state,
            new_confidence,
            existing_confidence,
        ),
        headquarters_country: merge_field(
            payload.headquarters_country.as_ref(),
            &existing.headquarters_country,
            new_confidence,
            existing_confidence,
        ),
        cik: merge_field(payload.cik.as_ref(), &existing.cik, new_confidence, existing_confidence),
        linkedin_url: merge_field(
            payload.linkedin_url.as_ref(),
            &existing.linkedin_url,
            new_confidence,
            existing_confidence,
        ),
        twitter_url: merge_field(
            payload.twitter_url.as_ref(),
            &existing.twitter_url,
            new_confidence,
            existing_confidence,
        ),
        contact_email: merge_field(
            payload.contact_email.as_ref(),
            &existing.contact_email,
            new_confidence,
            existing_confidence,
        ),
        is_sec_registered: is_sec_registered_patch,
        data_sources: data_sources_patch,
        updated_at: None,
    };

    let changed = patch.headquarters_city.is_some()
        || patch.headquarters_state.is_some()
        || patch.headquarters_country.is_some()
        || patch.cik.is_some()
        || patch.linkedin_url.is_some()
        || patch.twitter_url.is_some()
        || patch.contact_email.is_some()
        || patch.is_sec_registered.is_some()
        || patch.data_sources.is_some();

    if !changed {
        return Ok(Outcome::Skipped);
    }

    let patch = PeFirmPatch {
        updated_at: Some(Utc::now()),
        ..patch
    };
    PeFirm::apply_patch(conn, payload.entity_id, &patch).await?;
    Ok(Outcome::Updated)
}

/// No dedicated ADV-filing table exists in this schema (§9 Design Notes):
/// the structured effect of an ADV filing — confirming SEC registration —
/// already arrives via the `FirmUpdate` item the collector emits alongside
/// this one. This handler is a deliberate no-op.
pub async fn persist_form_adv_filing(
    _conn: &mut AsyncPgConnection,
    _caches: &mut FkCaches,
    _envelope: &ItemEnvelope<FormAdvFilingPayload>,
) -> AppResult<Outcome> {
    Ok(Outcome::Skipped)
}

pub async fn persist_portfolio_company(
    conn: &mut AsyncPgConnection,
    caches: &mut FkCaches,
    envelope: &ItemEnvelope<PortfolioCompanyPayload>,
) -> AppResult<Outcome> {
    let payload = &envelope.payload;
    let key = payload.name.to_lowercase();
    let existing = match caches.companies.get(&key) {
        Some(id) => PePortfolioCompany::find_by_id(conn, *id).await?,
        None => PePortfolioCompany::find_by_name_lower(conn, &key).await?,
    };

    let Some(existing) = existing else {
        let company = PePortfolioCompany::create(
            conn,
            &pe_core::models::company::NewPePortfolioCompany {
                name: payload.name.clone(),
                ownership_status: payload.ownership_status.clone(),
                current_pe_owner: None,
                ticker: None,
                status: "Active".to_string(),
            },
        )
        .await?;
        caches.companies.insert(key, company.id);

        let patch = PePortfolioCompanyPatch {
            website: payload.website.clone(),
            description: payload.description.clone(),
            industry: payload.industry.clone(),
            ..Default::default()
        };
        if patch.website.is_some() || patch.description.is_some() || patch.industry.is_some() {
            PePortfolioCompany::apply_patch(conn, company.id, &patch).await?;
        }
        return Ok(Outcome::Persisted);
    };

    caches.companies.insert(key, existing.id);
    let existing_confidence = existing.confidence.as_deref().and_then(Confidence::parse);
    let new_confidence = envelope.confidence;

    let patch = PePortfolioCompanyPatch {
        website: merge_field(payload.website.as_ref(), &existing.website, new_confidence, existing_confidence),
        description: merge_field(
            payload.description.as_ref(),
            &existing.description,
            new_confidence,
            existing_confidence,
        ),
        ownership_status: merge_field(
            payload.ownership_status.as_ref(),
            &existing.ownership_status,
            new_confidence,
            existing_confidence,
        ),
        industry: merge_field(payload.industry.as_ref(), &existing.industry, new_confidence, existing_confidence),
        updated_at: Some(Utc::now()),
        ..Default::default()
    };

    let changed = patch.website.is_some()
        || patch.description.is_some()
        || patch.ownership_status.is_some()
        || patch.industry.is_some();
    if !changed {
        return Ok(Outcome::Skipped);
    }
    PePortfolioCompany::apply_patch(conn, existing.id, &patch).await?;
    Ok(Outcome::Updated)
}

pub async fn persist_team_member(
    conn: &mut AsyncPgConnection,
    caches: &mut FkCaches,
    envelope: &ItemEnvelope<TeamMemberPayload>,
) -> AppResult<Outcome> {
    let payload = &envelope.payload;
    let firm_id = payload.entity_id;

    let (person_id, person_created) =
        resolve_or_create_person(conn, caches, &payload.full_name, None, payload.title.as_deref(), None).await?;

    if !person_created {
        if let Some(title) = &payload.title {
            if let Some(person) = PePerson::find_by_id(conn, person_id).await? {
                let existing_confidence = person.confidence.as_deref().and_then(Confidence::parse);
                if let Some(patched_title) =
                    merge_field(Some(title), &person.current_title, envelope.confidence, existing_confidence)
                {
                    PePerson::apply_patch(
                        conn,
                        person_id,
                        &PePersonPatch {
                            current_title: Some(patched_title),
                            updated_at: Some(Utc::now()),
                            ..Default::default()
                        },
                    )
                    .await?;
                }
            }
        }
    }

    if PeFirmPeople::exists(conn, firm_id, person_id).await? {
        return Ok(if person_created { Outcome::Persisted } else { Outcome::Skipped });
    }

    PeFirmPeople::create(
        conn,
        &NewPeFirmPeople {
            firm_id,
            person_id,
            title: payload.title.clone(),
            is_current: true,
        },
    )
    .await?;
    Ok(Outcome::Persisted)
}

pub async fn persist_person(
    conn: &mut AsyncPgConnection,
    caches: &mut FkCaches,
    envelope: &ItemEnvelope<PersonPayload>,
) -> AppResult<Outcome> {
    let payload = &envelope.payload;
    let (person_id, created) = resolve_or_create_person(
        conn,
        caches,
        &payload.full_name,
        payload.linkedin_url.as_deref(),
        payload.current_title.as_deref(),
        payload.current_company.as_deref(),
    )
    .await?;

    let mut changed = created;

    if !created {
        if let Some(existing) = PePerson::find_by_id(conn, person_id).await? {
            let existing_confidence = existing.confidence.as_deref().and_then(Confidence::parse);
            let new_confidence = envelope.confidence;
            let patch = PePersonPatch {
                current_title: merge_field(
                    payload.current_title.as_ref(),
                    &existing.current_title,
                    new_confidence,
                    existing_confidence,
                ),
                current_company: merge_field(
                    payload.current_company.as_ref(),
                    &existing.current_company,
                    new_confidence,
                    existing_confidence,
                ),
                bio: merge_field(payload.bio.as_ref(), &existing.bio, new_confidence, existing_confidence),
                linkedin_url: merge_field(
                    payload.linkedin_url.as_ref(),
                    &existing.linkedin_url,
                    new_confidence,
                    existing_confidence,
                ),
                updated_at: Some(Utc::now()),
            };
            let field_changed = patch.current_title.is_some()
                || patch.current_company.is_some()
                || patch.bio.is_some()
                || patch.linkedin_url.is_some();
            if field_changed {
                PePerson::apply_patch(conn, person_id, &patch).await?;
                changed = true;
            }
        }
    }

    if let Some(firm_id) = payload.firm_id {
        if !PeFirmPeople::exists(conn, firm_id, person_id).await? {
            PeFirmPeople::create(
                conn,
                &NewPeFirmPeople {
                    firm_id,
                    person_id,
                    title: payload.current_title.clone(),
                    is_current: true,
                },
            )
            .await?;
            changed = true;
        }
    }

    for entry in &payload.education {
        let institution_lower = entry.institution.to_lowercase();
        if !PePersonEducation::exists(conn, person_id, &institution_lower).await? {
            PePersonEducation::create(
                conn,
                &NewPePersonEducation {
                    person_id,
                    institution: entry.institution.clone(),
                    degree: entry.degree.clone(),
                    field_of_study: entry.field_of_study.clone(),
                    graduation_year: entry.graduation_year,
                },
            )
            .await?;
            changed = true;
        }
    }

    for entry in &payload.experience {
        let company_lower = entry.company.to_lowercase();
        let title_lower = entry.title.to_lowercase();
        if !PePersonExperience::exists(conn, person_id, &company_lower, &title_lower).await? {
            PePersonExperience::create(
                conn,
                &NewPePersonExperience {
                    person_id,
                    company: entry.company.clone(),
                    title: entry.title.clone(),
                    start_year: entry.start_year,
                    end_year: entry.end_year,
                },
            )
            .await?;
            changed = true;
        }
    }

    Ok(if created {
        Outcome::Persisted
    } else if changed {
        Outcome::Updated
    } else {
        Outcome::Skipped
    })
}

pub async fn persist_related_person(
    conn: &mut AsyncPgConnection,
    caches: &mut FkCaches,
    envelope: &ItemEnvelope<RelatedPersonPayload>,
) -> AppResult<Outcome> {
    let payload = &envelope.payload;
    let firm_id = payload.entity_id;

    let (person_id, created) =
        resolve_or_create_person(conn, caches, &payload.full_name, None, None, None).await?;

    if PeFirmPeople::exists(conn, firm_id, person_id).await? {
        return Ok(if created { Outcome::Persisted } else { Outcome::Skipped });
    }

    PeFirmPeople::create(
        conn,
        &NewPeFirmPeople {
            firm_id,
            person_id,
            title: payload.relationship.clone(),
            is_current: true,
        },
    )
    .await?;
    Ok(Outcome::Persisted)
}

pub async fn persist_company_update(
    conn: &mut AsyncPgConnection,
    _caches: &mut FkCaches,
    envelope: &ItemEnvelope<CompanyUpdatePayload>,
) -> AppResult<Outcome> {
    let payload = &envelope.payload;
    let company_id = payload.company_id.unwrap_or(payload.entity_id);

    let existing = PePortfolioCompany::find_by_id(conn, company_id)
        .await?
        .ok_or_else(|| AppError::persistence(format!("company {company_id} not found")))?;

    let existing_confidence = existing.confidence.as_deref().and_then(Confidence::parse);
    let new_confidence = envelope.confidence;

    let patch = PePortfolioCompanyPatch {
        industry: merge_field(payload.industry.as_ref(), &existing.industry, new_confidence, existing_confidence),
        sector: merge_field(payload.sector.as_ref(), &existing.sector, new_confidence, existing_confidence),
        description: merge_field(
            payload.description.as_ref(),
            &existing.description,
            new_confidence,
            existing_confidence,
        ),
        employee_count: merge_field(
            payload.employee_count.as_ref(),
            &existing.employee_count,
            new_confidence,
            existing_confidence,
        ),
        headquarters_city: merge_field(
            payload.headquarters_city.as_ref(),
            &existing.headquarters_city,
            new_confidence,
            existing_confidence,
        ),
        headquarters_state: merge_field(
            payload.headquarters_state.as_ref(),
            &existing.headquarters_state,
            new_confidence,
            existing_confidence,
        ),
        headquarters_country: merge_field(
            payload.headquarters_country.as_ref(),
            &existing.headquarters_country,
            new_confidence,
            existing_confidence,
        ),
        website: merge_field(payload.website.as_ref(), &existing.website, new_confidence, existing_confidence),
        ticker: merge_field(payload.ticker.as_ref(), &existing.ticker, new_confidence, existing_confidence),
        updated_at: Some(Utc::now()),
    };

    let changed = patch.industry.is_some()
        || patch.sector.is_some()
        || patch.description.is_some()
        || patch.employee_count.is_some()
        || patch.headquarters_city.is_some()
        || patch.headquarters_state.is_some()
        || patch.headquarters_country.is_some()
        || patch.website.is_some()
        || patch.ticker.is_some();

    if !changed {
        return Ok(Outcome::Skipped);
    }
    PePortfolioCompany::apply_patch(conn, company_id, &patch).await?;
    Ok(Outcome::Updated)
}
