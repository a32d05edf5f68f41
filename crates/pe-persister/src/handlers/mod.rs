//! Per-variant item handlers, grouped by commit phase (§4.9).

mod phase1;
mod phase2;

use diesel_async::AsyncPgConnection;

use pe_core::error::AppResult;
use pe_core::model::Item;

use crate::cache::FkCaches;
use crate::stats::Outcome;

/// Dispatches one item to its handler. The caller decides which phase an
/// item belongs to via [`Item::is_phase_one`]; this match only needs to
/// route by variant.
pub async fn dispatch(
    conn: &mut AsyncPgConnection,
    caches: &mut FkCaches,
    item: &Item,
) -> AppResult<Outcome> {
    match item {
        Item::FirmUpdate(envelope) => phase1::persist_firm_update(conn, caches, envelope).await,
        Item::FormAdvFiling(envelope) => phase1::persist_form_adv_filing(conn, caches, envelope).await,
        Item::PortfolioCompany(envelope) => phase1::persist_portfolio_company(conn, caches, envelope).await,
        Item::TeamMember(envelope) => phase1::persist_team_member(conn, caches, envelope).await,
        Item::Person(envelope) => phase1::persist_person(conn, caches, envelope).await,
        Item::RelatedPerson(envelope) => phase1::persist_related_person(conn, caches, envelope).await,
        Item::CompanyUpdate(envelope) => phase1::persist_company_update(conn, caches, envelope).await,
        Item::ThirteenFHolding(envelope) => phase2::persist_13f_holding(conn, caches, envelope).await,
        Item::ThirteenDStake(envelope) => phase2::persist_13d_stake(conn, caches, envelope).await,
        Item::FormDFiling(envelope) => phase2::persist_form_d_filing(conn, caches, envelope).await,
        Item::DealFrom8k(envelope) => phase2::persist_deal_from_8k(conn, caches, envelope).await,
        Item::DealPressRelease(envelope) => phase2::persist_deal_press_release(conn, caches, envelope).await,
        Item::Deal(envelope) => phase2::persist_deal(conn, caches, envelope).await,
        Item::FirmNews(envelope) => phase2::persist_firm_news(conn, caches, envelope).await,
        Item::CompanyFinancial(envelope) => phase2::persist_company_financial(conn, caches, envelope).await,
        Item::CompanyValuation(envelope) => phase2::persist_company_valuation(conn, caches, envelope).await,
    }
}
