//! Get-or-create helpers shared by the phase handlers. Every lookup goes
//! through the warmed [`FkCaches`] first and only falls back to a create
//! (plus a cache insert) on a miss.

use diesel_async::AsyncPgConnection;

use pe_core::error::AppResult;
use pe_core::models::company::{NewPePortfolioCompany, PePortfolioCompany};
use pe_core::models::firm::{NewPeFirm, NewPeFund, PeFirm, PeFund};
use pe_core::models::person::{NewPePerson, PePerson};

use crate::cache::FkCaches;

pub async fn resolve_or_create_firm(
    conn: &mut AsyncPgConnection,
    caches: &mut FkCaches,
    name: &str,
) -> AppResult<i32> {
    let key = name.to_lowercase();
    if let Some(id) = caches.firms.get(&key) {
        return Ok(*id);
    }
    let firm = PeFirm::create(
        conn,
        &NewPeFirm {
            name: name.to_string(),
            cik: None,
            crd_number: None,
            website: None,
            firm_type: None,
        },
    )
    .await?;
    caches.firms.insert(key, firm.id);
    Ok(firm.id)
}

pub async fn resolve_or_create_company(
    conn: &mut AsyncPgConnection,
    caches: &mut FkCaches,
    name: &str,
    ownership_status: Option<&str>,
) -> AppResult<(i32, bool)> {
    let key = name.to_lowercase();
    if let Some(id) = caches.companies.get(&key) {
        return Ok((*id, false));
    }
    let company = PePortfolioCompany::create(
        conn,
        &NewPePortfolioCompany {
            name: name.to_string(),
            ownership_status: ownership_status.map(str::to_string),
            current_pe_owner: None,
            ticker: None,
            status: "Active".to_string(),
        },
    )
    .await?;
    caches.companies.insert(key, company.id);
    Ok((company.id, true))
}

/// Resolves a person by `linkedin_url` when present, else by lowercased
/// full name, creating a minimal row on a miss.
pub async fn resolve_or_create_person(
    conn: &mut AsyncPgConnection,
    caches: &mut FkCaches,
    full_name: &str,
    linkedin_url: Option<&str>,
    current_title: Option<&str>,
    current_company: Option<&str>,
) -> AppResult<(i32, bool)> {
    let key = FkCaches::person_key(full_name, linkedin_url);
    if let Some(id) = caches.people.get(&key) {
        return Ok((*id, false));
    }
    if let Some(url) = linkedin_url {
        if let Some(existing) = PePerson::find_by_linkedin_url(conn, url).await? {
            caches.people.insert(key, existing.id);
            return Ok((existing.id, false));
        }
    }
    let person = PePerson::create(
        conn,
        &NewPePerson {
            full_name: full_name.to_string(),
            linkedin_url: linkedin_url.map(str::to_string),
            current_title: current_title.map(str::to_string),
            current_company: current_company.map(str::to_string),
        },
    )
    .await?;
    caches.people.insert(key, person.id);
    Ok((person.id, true))
}

/// One synthetic fund per firm holds every 13F/13D stake reported for it
/// (§3.4 I4). Both investment types share the same fund — a 13D amendment
/// for a firm that already has 13F holdings lands in the same vehicle.
pub async fn resolve_or_create_holdings_fund(
    conn: &mut AsyncPgConnection,
    caches: &mut FkCaches,
    firm_id: i32,
    firm_name: &str,
) -> AppResult<i32> {
    if let Some(id) = caches.holdings_funds.get(&firm_id) {
        return Ok(*id);
    }
    if let Some(existing) = PeFund::find_by_firm_and_strategy(conn, firm_id, PeFund::HOLDINGS_STRATEGY).await? {
        caches.holdings_funds.insert(firm_id, existing.id);
        return Ok(existing.id);
    }
    let fund = PeFund::create(
        conn,
        &NewPeFund {
            firm_id,
            name: format!("{firm_name} - 13F Holdings"),
            strategy: Some(PeFund::HOLDINGS_STRATEGY.to_string()),
            status: "Active".to_string(),
        },
    )
    .await?;
    caches.holdings_funds.insert(firm_id, fund.id);
    Ok(fund.id)
}
