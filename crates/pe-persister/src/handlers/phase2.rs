//! Phase 2 (relationship) item handlers (§4.9), grounded field-for-field in
//! `original_source/app/sources/pe_collection/persister.py`'s
//! `_persist_13f_holding`, `_persist_13d_stake`, `_persist_form_d_filing`,
//! `_persist_deal_from_8k`, `_persist_deal_press_release`, `_persist_deal`,
//! `_persist_firm_news`, `_persist_company_financial`, and
//! `_persist_company_valuation` handlers.

use bigdecimal::BigDecimal;
use chrono::{Datelike, Utc};
use diesel_async::AsyncPgConnection;

use pe_core::error::AppResult;
use pe_core::model::{
    CompanyFinancialPayload, CompanyValuationPayload, DealFrom8kPayload, DealPayload,
    DealPressReleasePayload, FirmNewsPayload, FormDFilingPayload, ItemEnvelope,
    ThirteenDStakePayload, ThirteenFHoldingPayload,
};
use pe_core::models::company::{
    NewPeCompanyFinancial, NewPeCompanyValuation, PeCompanyFinancial, PeCompanyFinancialPatch,
    PeCompanyValuation,
};
use pe_core::models::deal::{NewPeDeal, NewPeDealParticipant, PeDeal, PeDealParticipant};
use pe_core::models::investment::{NewPeFundInvestment, PeFundInvestment};
use pe_core::models::news::{NewPeFirmNews, PeFirmNews};

use crate::cache::FkCaches;
use crate::merge::merge_field;
use crate::resolve::{resolve_or_create_company, resolve_or_create_firm, resolve_or_create_holdings_fund};
use crate::stats::Outcome;

pub async fn persist_13f_holding(
    conn: &mut AsyncPgConnection,
    caches: &mut FkCaches,
    envelope: &ItemEnvelope<ThirteenFHoldingPayload>,
) -> AppResult<Outcome> {
    let payload = &envelope.payload;
    let Some(issuer_name) = payload.issuer_name.as_deref() else {
        return Ok(Outcome::Skipped);
    };

    let firm_id = payload.firm_id.unwrap_or(payload.entity_id);
    let (company_id, _) = resolve_or_create_company(conn, caches, issuer_name, None).await?;
    let fund_id = resolve_or_create_holdings_fund(conn, caches, firm_id, &payload.firm_name).await?;

    let existing = PeFundInvestment::find_by_fund_company_date(conn, fund_id, company_id, payload.report_date).await?;

    match existing {
        Some(existing) => {
            let Some(amount) = &payload.invested_amount_usd else {
                return Ok(Outcome::Skipped);
            };
            if existing.invested_amount_usd.as_ref() == Some(amount) {
                return Ok(Outcome::Skipped);
            }
            PeFundInvestment::update_invested_amount(conn, existing.id, amount).await?;
            Ok(Outcome::Updated)
        }
        None => {
            PeFundInvestment::create(
                conn,
                &NewPeFundInvestment {
                    fund_id,
                    company_id,
                    investment_date: Some(payload.report_date),
                    investment_type: PeFundInvestment::TYPE_13F_HOLDING.to_string(),
                    invested_amount_usd: payload.invested_amount_usd.clone(),
                    status: "Active".to_string(),
                },
            )
            .await?;
            Ok(Outcome::Persisted)
        }
    }
}

/// Deliberately asymmetric with `persist_13f_holding`: a matching row is
/// skipped, never updated. This mirrors the original's two handlers exactly
/// rather than unifying them (§4.9).
pub async fn persist_13d_stake(
    conn: &mut AsyncPgConnection,
    caches: &mut FkCaches,
    envelope: &ItemEnvelope<ThirteenDStakePayload>,
) -> AppResult<Outcome> {
    let payload = &envelope.payload;
    let Some(issuer_name) = payload.issuer_name.as_deref() else {
        return Ok(Outcome::Skipped);
    };

    let firm_id = payload.firm_id.unwrap_or(payload.entity_id);
    let (company_id, _) = resolve_or_create_company(conn, caches, issuer_name, None).await?;
    let fund_id = resolve_or_create_holdings_fund(conn, caches, firm_id, &payload.firm_name).await?;

    let existing =
        PeFundInvestment::find_by_fund_company_type(conn, fund_id, company_id, PeFundInvestment::TYPE_13D_STAKE)
            .await?;
    if existing.is_some() {
        return Ok(Outcome::Skipped);
    }

    PeFundInvestment::create(
        conn,
        &NewPeFundInvestment {
            fund_id,
            company_id,
            investment_date: payload.report_date,
            investment_type: PeFundInvestment::TYPE_13D_STAKE.to_string(),
            invested_amount_usd: None,
            status: "Active".to_string(),
        },
    )
    .await?;
    Ok(Outcome::Persisted)
}

/// `exemption` has no landing column on `pe_portfolio_companies` and is
/// dropped here; the filing's structural effect is recording the issuer as
/// a known company (§9 Design Notes).
pub async fn persist_form_d_filing(
    conn: &mut AsyncPgConnection,
    caches: &mut FkCaches,
    envelope: &ItemEnvelope<FormDFilingPayload>,
) -> AppResult<Outcome> {
    let payload = &envelope.payload;
    let Some(issuer_name) = payload.issuer_name.as_deref() else {
        return Ok(Outcome::Skipped);
    };

    let (_, created) =
        resolve_or_create_company(conn, caches, issuer_name, Some("Private Issuer")).await?;
    Ok(if created { Outcome::Persisted } else { Outcome::Skipped })
}

pub async fn persist_deal_from_8k(
    conn: &mut AsyncPgConnection,
    caches: &mut FkCaches,
    envelope: &ItemEnvelope<DealFrom8kPayload>,
) -> AppResult<Outcome> {
    let payload = &envelope.payload;
    let Some(source_url) = envelope.source_url.as_deref() else {
        return Ok(Outcome::Skipped);
    };

    if PeDeal::find_by_source_url(conn, source_url).await?.is_some() {
        return Ok(Outcome::Skipped);
    }

    let company_id = match &payload.company_name {
        Some(name) => Some(resolve_or_create_company(conn, caches, name, None).await?.0),
        None => None,
    };

    PeDeal::create(
        conn,
        &NewPeDeal {
            company_id,
            deal_type: None,
            deal_sub_type: None,
            deal_name: payload.title.clone(),
            announced_date: None,
            closed_date: None,
            enterprise_value_usd: None,
            buyer_name: payload.firm_name.clone(),
            seller_name: None,
            status: "Announced".to_string(),
            data_source: Some("SEC 8-K".to_string()),
            source_url: Some(source_url.to_string()),
            press_release_url: None,
        },
    )
    .await?;
    Ok(Outcome::Persisted)
}

pub async fn persist_deal_press_release(
    conn: &mut AsyncPgConnection,
    _caches: &mut FkCaches,
    envelope: &ItemEnvelope<DealPressReleasePayload>,
) -> AppResult<Outcome> {
    let payload = &envelope.payload;
    let Some(press_release_url) = envelope.source_url.as_deref() else {
        return Ok(Outcome::Skipped);
    };

    if PeDeal::find_by_press_release_url(conn, press_release_url).await?.is_some()
        || PeDeal::find_by_source_url(conn, press_release_url).await?.is_some()
    {
        return Ok(Outcome::Skipped);
    }

    PeDeal::create(
        conn,
        &NewPeDeal {
            company_id: None,
            deal_type: None,
            deal_sub_type: None,
            deal_name: None,
            announced_date: None,
            closed_date: None,
            enterprise_value_usd: None,
            buyer_name: payload.firm_name.clone(),
            seller_name: None,
            status: "Rumored".to_string(),
            data_source: payload.source.clone().or_else(|| Some("Press Release".to_string())),
            source_url: Some(press_release_url.to_string()),
            press_release_url: Some(press_release_url.to_string()),
        },
    )
    .await?;
    Ok(Outcome::Persisted)
}

/// `pe_deals` carries no confidence column, so an existing placeholder is
/// enriched on a null-fill basis only — never gated by confidence, unlike
/// every Phase 1 handler (§4.9).
pub async fn persist_deal(
    conn: &mut AsyncPgConnection,
    caches: &mut FkCaches,
    envelope: &ItemEnvelope<DealPayload>,
) -> AppResult<Outcome> {
    let payload = &envelope.payload;
    let Some(source_url) = envelope.source_url.as_deref() else {
        return Ok(Outcome::Skipped);
    };

    let existing = match PeDeal::find_by_press_release_url(conn, source_url).await? {
        Some(deal) => Some(deal),
        None => PeDeal::find_by_source_url(conn, source_url).await?,
    };

    let (deal_id, outcome) = match existing {
        Some(existing) => {
            let patch = pe_core::models::deal::PeDealPatch {
                deal_type: merge_field(payload.deal_type.as_ref(), &existing.deal_type, envelope.confidence, None),
                enterprise_value_usd: merge_field(
                    payload.enterprise_value_usd.as_ref(),
                    &existing.enterprise_value_usd,
                    envelope.confidence,
                    None,
                ),
                announced_date: merge_field(
                    payload.announced_date.as_ref(),
                    &existing.announced_date,
                    envelope.confidence,
                    None,
                ),
                closed_date: merge_field(payload.closed_date.as_ref(), &existing.closed_date, envelope.confidence, None),
                seller_name: merge_field(payload.seller.as_ref(), &existing.seller_name, envelope.confidence, None),
                updated_at: Some(Utc::now()),
            };
            let changed = patch.deal_type.is_some()
                || patch.enterprise_value_usd.is_some()
                || patch.announced_date.is_some()
                || patch.closed_date.is_some()
                || patch.seller_name.is_some();
            if changed {
                PeDeal::apply_patch(conn, existing.id, &patch).await?;
            }
            (existing.id, if changed { Outcome::Updated } else { Outcome::Skipped })
        }
        None => {
            let company_id = match &payload.target_company {
                Some(name) => Some(resolve_or_create_company(conn, caches, name, None).await?.0),
                None => None,
            };
            let deal = PeDeal::create(
                conn,
                &NewPeDeal {
                    company_id,
                    deal_type: payload.deal_type.clone(),
                    deal_sub_type: None,
                    deal_name: payload.target_company.clone(),
                    announced_date: payload.announced_date,
                    closed_date: payload.closed_date,
                    enterprise_value_usd: payload.enterprise_value_usd.clone(),
                    buyer_name: Some(payload.entity_name.clone()),
                    seller_name: payload.seller.clone(),
                    status: "Announced".to_string(),
                    data_source: Some("LLM Extracted".to_string()),
                    source_url: Some(source_url.to_string()),
                    press_release_url: Some(source_url.to_string()),
                },
            )
            .await?;
            (deal.id, Outcome::Persisted)
        }
    };

    for co_investor in &payload.co_investors {
        let name_lower = co_investor.name.to_lowercase();
        if PeDealParticipant::exists(conn, deal_id, &name_lower).await? {
            continue;
        }
        let firm_id = resolve_or_create_firm(conn, caches, &co_investor.name).await.ok();
        PeDealParticipant::create(
            conn,
            &NewPeDealParticipant {
                deal_id,
                firm_id,
                participant_name: co_investor.name.clone(),
                participant_type: Some("Co-Investor".to_string()),
                role: None,
                is_lead: false,
            },
        )
        .await?;
    }

    Ok(outcome)
}

pub async fn persist_firm_news(
    conn: &mut AsyncPgConnection,
    _caches: &mut FkCaches,
    envelope: &ItemEnvelope<FirmNewsPayload>,
) -> AppResult<Outcome> {
    let payload = &envelope.payload;
    let Some(source_url) = envelope.source_url.as_deref() else {
        return Ok(Outcome::Skipped);
    };

    if PeFirmNews::find_by_source_url(conn, source_url).await?.is_some() {
        return Ok(Outcome::Skipped);
    }

    let title: String = payload.title.chars().take(PeFirmNews::TITLE_MAX_LEN).collect();

    PeFirmNews::create(
        conn,
        &NewPeFirmNews {
            firm_id: payload.entity_id,
            title,
            source_name: payload.source_name.clone(),
            source_url: source_url.to_string(),
            summary: payload.summary.clone(),
            published_date: payload.published_date,
            news_type: payload.news_type.clone(),
            sentiment: payload.sentiment.clone(),
            sentiment_score: payload.relevance_score.and_then(|v| BigDecimal::try_from(v).ok()),
        },
    )
    .await?;
    Ok(Outcome::Persisted)
}

pub async fn persist_company_financial(
    conn: &mut AsyncPgConnection,
    _caches: &mut FkCaches,
    envelope: &ItemEnvelope<CompanyFinancialPayload>,
) -> AppResult<Outcome> {
    let payload = &envelope.payload;
    let fiscal_year = Utc::now().year();
    let fiscal_period = "TTM";

    let existing = PeCompanyFinancial::find_existing(conn, payload.company_id, fiscal_year, fiscal_period).await?;

    match existing {
        Some(existing) => {
            let existing_confidence = existing.confidence.as_deref().and_then(pe_core::model::Confidence::parse);
            let new_confidence = envelope.confidence;
            let patch = PeCompanyFinancialPatch {
                revenue_usd: merge_field(payload.revenue.as_ref(), &existing.revenue_usd, new_confidence, existing_confidence),
                ebitda_usd: merge_field(payload.ebitda.as_ref(), &existing.ebitda_usd, new_confidence, existing_confidence),
                gross_profit_usd: merge_field(
                    payload.gross_profit.as_ref(),
                    &existing.gross_profit_usd,
                    new_confidence,
                    existing_confidence,
                ),
                ebit_usd: merge_field(
                    payload.operating_income.as_ref(),
                    &existing.ebit_usd,
                    new_confidence,
                    existing_confidence,
                ),
                net_income_usd: merge_field(
                    payload.net_income.as_ref(),
                    &existing.net_income_usd,
                    new_confidence,
                    existing_confidence,
                ),
                total_assets_usd: merge_field(
                    payload.total_assets.as_ref(),
                    &existing.total_assets_usd,
                    new_confidence,
                    existing_confidence,
                ),
                total_debt_usd: merge_field(
                    payload.total_debt.as_ref(),
                    &existing.total_debt_usd,
                    new_confidence,
                    existing_confidence,
                ),
                cash_usd: merge_field(payload.total_cash.as_ref(), &existing.cash_usd, new_confidence, existing_confidence),
                shareholders_equity_usd: merge_field(
                    payload.total_stockholder_equity.as_ref(),
                    &existing.shareholders_equity_usd,
                    new_confidence,
                    existing_confidence,
                ),
                free_cash_flow_usd: merge_field(
                    payload.free_cash_flow.as_ref(),
                    &existing.free_cash_flow_usd,
                    new_confidence,
                    existing_confidence,
                ),
                operating_cash_flow_usd: merge_field(
                    payload.operating_cash_flow.as_ref(),
                    &existing.operating_cash_flow_usd,
                    new_confidence,
                    existing_confidence,
                ),
                gross_margin_pct: merge_field(
                    payload.gross_margin.as_ref(),
                    &existing.gross_margin_pct,
                    new_confidence,
                    existing_confidence,
                ),
                ebitda_margin_pct: merge_field(
                    payload.operating_margin.as_ref(),
                    &existing.ebitda_margin_pct,
                    new_confidence,
                    existing_confidence,
                ),
                revenue_growth_pct: merge_field(
                    payload.revenue_growth.as_ref(),
                    &existing.revenue_growth_pct,
                    new_confidence,
                    existing_confidence,
                ),
                confidence: if new_confidence >= existing_confidence.unwrap_or(pe_core::model::Confidence::Low) {
                    Some(new_confidence.as_str().to_string())
                } else {
                    None
                },
                updated_at: Some(Utc::now()),
            };

            let changed = patch.revenue_usd.is_some()
                || patch.ebitda_usd.is_some()
                || patch.gross_profit_usd.is_some()
                || patch.ebit_usd.is_some()
                || patch.net_income_usd.is_some()
                || patch.total_assets_usd.is_some()
                || patch.total_debt_usd.is_some()
                || patch.cash_usd.is_some()
                || patch.shareholders_equity_usd.is_some()
                || patch.free_cash_flow_usd.is_some()
                || patch.operating_cash_flow_usd.is_some()
                || patch.gross_margin_pct.is_some()
                || patch.ebitda_margin_pct.is_some()
                || patch.revenue_growth_pct.is_some();

            if !changed {
                return Ok(Outcome::Skipped);
            }
            PeCompanyFinancial::apply_patch(conn, existing.id, &patch).await?;
            Ok(Outcome::Updated)
        }
        None => {
            PeCompanyFinancial::create(
                conn,
                &NewPeCompanyFinancial {
                    company_id: payload.company_id,
                    fiscal_year,
                    fiscal_period: fiscal_period.to_string(),
                    revenue_usd: payload.revenue.clone(),
                    ebitda_usd: payload.ebitda.clone(),
                    gross_profit_usd: payload.gross_profit.clone(),
                    ebit_usd: payload.operating_income.clone(),
                    net_income_usd: payload.net_income.clone(),
                    total_assets_usd: payload.total_assets.clone(),
                    total_debt_usd: payload.total_debt.clone(),
                    cash_usd: payload.total_cash.clone(),
                    shareholders_equity_usd: payload.total_stockholder_equity.clone(),
                    free_cash_flow_usd: payload.free_cash_flow.clone(),
                    operating_cash_flow_usd: payload.operating_cash_flow.clone(),
                    gross_margin_pct: payload.gross_margin.clone(),
                    ebitda_margin_pct: payload.operating_margin.clone(),
                    revenue_growth_pct: payload.revenue_growth.clone(),
                    data_source: Some("Yahoo Finance".to_string()),
                    confidence: Some(envelope.confidence.as_str().to_string()),
                },
            )
            .await?;
            Ok(Outcome::Persisted)
        }
    }
}

/// `pe_company_valuations` rows are immutable point-in-time snapshots: a
/// match on `(company, date, data_source)` is skipped outright, never
/// patched — there is no `PeCompanyValuationPatch` because the source never
/// updates one of these rows in place (§4.9).
pub async fn persist_company_valuation(
    conn: &mut AsyncPgConnection,
    _caches: &mut FkCaches,
    envelope: &ItemEnvelope<CompanyValuationPayload>,
) -> AppResult<Outcome> {
    let payload = &envelope.payload;
    let data_source = if payload.valuation_method.is_some() {
        "LLM Estimate"
    } else {
        "Yahoo Finance"
    };

    if PeCompanyValuation::find_existing(conn, payload.company_id, payload.valuation_date, data_source)
        .await?
        .is_some()
    {
        return Ok(Outcome::Skipped);
    }

    PeCompanyValuation::create(
        conn,
        &NewPeCompanyValuation {
            company_id: payload.company_id,
            valuation_date: payload.valuation_date,
            enterprise_value_usd: payload.enterprise_value.clone().or_else(|| payload.estimated_enterprise_value_usd.clone()),
            equity_value_usd: payload.market_cap.clone().or_else(|| payload.estimated_equity_value_usd.clone()),
            ev_revenue_multiple: payload.ev_to_revenue.clone().or_else(|| payload.ev_to_revenue_multiple.clone()),
            ev_ebitda_multiple: payload.ev_to_ebitda.clone().or_else(|| payload.ev_to_ebitda_multiple.clone()),
            price_earnings_multiple: payload.trailing_pe.clone(),
            valuation_type: None,
            methodology: payload.valuation_method.clone(),
            data_source: data_source.to_string(),
            source_url: envelope.source_url.clone(),
            confidence: Some(envelope.confidence.as_str().to_string()),
        },
    )
    .await?;
    Ok(Outcome::Persisted)
}
