//! Public comps collector (§4.5), grounded in
//! `original_source/.../financial_collectors/public_comps_collector.py`.
//!
//! The original calls `yfinance.Ticker(ticker).info`, a synchronous library
//! call offloaded to an executor thread. No crate in this workspace offers
//! an async Yahoo Finance client, so the equivalent fetch here is a blocking
//! `reqwest::blocking::Client` call run via `tokio::task::spawn_blocking`
//! (§9 "Blocking calls inside async").

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;

use pe_core::error::{AppError, AppResult};
use pe_core::model::{
    CompanyFinancialPayload, CompanyUpdatePayload, CompanyValuationPayload, Confidence,
    EntityType, Item, ItemEnvelope, Source,
};
use pe_http::HttpSubstrate;

use crate::registry::Collector;
use crate::CollectArgs;

const SEARCH_URL: &str = "https://query2.finance.yahoo.com/v1/finance/search";
const QUOTE_SUMMARY_URL: &str = "https://query2.finance.yahoo.com/v10/finance/quoteSummary";
const QUOTE_SUMMARY_MODULES: &str = "financialData,defaultKeyStatistics,summaryProfile,price";

pub struct PublicCompsCollector {
    http: Arc<HttpSubstrate>,
}

impl PublicCompsCollector {
    pub fn new(http: Arc<HttpSubstrate>) -> Self {
        Self { http }
    }

    async fn resolve_ticker(&self, company_name: &str) -> Option<String> {
        let url = format!(
            "{SEARCH_URL}?q={}&quotesCount=5&newsCount=0",
            url_encode(company_name)
        );
        let search: YahooSearchResponse = self.http.get_json(&url).await.ok()?;
        pick_equity_ticker(&search.quotes.unwrap_or_default())
    }

    async fn fetch_quote_summary(&self, ticker: &str) -> AppResult<QuoteSummaryResult> {
        let url = format!("{QUOTE_SUMMARY_URL}/{ticker}?modules={QUOTE_SUMMARY_MODULES}");

        let body = tokio::task::spawn_blocking(move || -> AppResult<Vec<u8>> {
            let client = reqwest::blocking::Client::builder()
                .user_agent("pe-collector/1.0")
                .timeout(Duration::from_secs(30))
                .build()
                .map_err(|e| AppError::fatal(format!("failed to build blocking HTTP client: {e}")))?;

            let response = client
                .get(&url)
                .send()
                .map_err(|e| AppError::transient(format!("Yahoo Finance request failed: {e}")))?;

            if !response.status().is_success() {
                return Err(AppError::fatal(format!(
                    "Yahoo Finance returned {}",
                    response.status()
                )));
            }

            response
                .bytes()
                .map(|b| b.to_vec())
                .map_err(|e| AppError::transient(format!("reading Yahoo Finance response: {e}")))
        })
        .await
        .map_err(|e| AppError::fatal(format!("blocking fetch task panicked: {e}")))??;

        let envelope: QuoteSummaryEnvelope = serde_json::from_slice(&body)
            .map_err(|e| AppError::parse(format!("invalid Yahoo Finance response: {e}")))?;

        envelope
            .quote_summary
            .result
            .and_then(|mut results| if results.is_empty() { None } else { Some(results.remove(0)) })
            .ok_or_else(|| AppError::not_found(format!("no quoteSummary result for {ticker}")))
    }
}

#[async_trait]
impl Collector for PublicCompsCollector {
    fn source_type(&self) -> Source {
        Source::PublicComps
    }

    fn entity_type(&self) -> EntityType {
        EntityType::Company
    }

    async fn collect(&self, args: &CollectArgs) -> pe_core::model::CollectionResult {
        let started_at = Utc::now();

        let ticker = match args.ticker.clone() {
            Some(t) => Some(t),
            None => self.resolve_ticker(&args.entity_name).await,
        };

        let Some(ticker) = ticker else {
            return pe_core::model::CollectionResult {
                warnings: vec!["could not resolve a stock ticker for this company".to_string()],
                completed_at: Utc::now(),
                ..pe_core::model::CollectionResult::empty(
                    args.entity_id,
                    args.entity_name.clone(),
                    EntityType::Company,
                    Source::PublicComps,
                    started_at,
                )
            };
        };

        let info = match self.fetch_quote_summary(&ticker).await {
            Ok(info) => info,
            Err(e) => {
                return pe_core::model::CollectionResult::failed(
                    args.entity_id,
                    args.entity_name.clone(),
                    EntityType::Company,
                    Source::PublicComps,
                    started_at,
                    format!("failed to fetch Yahoo Finance data for {ticker}: {e}"),
                )
            }
        };

        let source_url = format!("https://finance.yahoo.com/quote/{ticker}");
        let mut items = Vec::new();

        if let Some(financial) = build_financial_payload(&info, args.entity_id) {
            items.push(Item::CompanyFinancial(ItemEnvelope::new(
                financial,
                Some(source_url.clone()),
                Confidence::High,
                false,
            )));
        }
        if let Some(valuation) = build_valuation_payload(&info, args.entity_id) {
            items.push(Item::CompanyValuation(ItemEnvelope::new(
                valuation,
                Some(source_url.clone()),
                Confidence::High,
                false,
            )));
        }
        if let Some(update) = build_update_payload(&info, args.entity_id, ticker.clone()) {
            items.push(Item::CompanyUpdate(ItemEnvelope::new(
                update,
                Some(source_url.clone()),
                Confidence::Medium,
                false,
            )));
        }

        pe_core::model::CollectionResult {
            items,
            completed_at: Utc::now(),
            ..pe_core::model::CollectionResult::empty(
                args.entity_id,
                args.entity_name.clone(),
                EntityType::Company,
                Source::PublicComps,
                started_at,
            )
        }
    }
}

fn url_encode(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

#[derive(Debug, Deserialize)]
struct YahooSearchResponse {
    quotes: Option<Vec<YahooSearchQuote>>,
}

#[derive(Debug, Clone, Deserialize)]
struct YahooSearchQuote {
    symbol: String,
    #[serde(rename = "quoteType")]
    quote_type: Option<String>,
}

fn pick_equity_ticker(quotes: &[YahooSearchQuote]) -> Option<String> {
    quotes
        .iter()
        .find(|q| q.quote_type.as_deref() == Some("EQUITY"))
        .or_else(|| quotes.first())
        .map(|q| q.symbol.clone())
}

#[derive(Debug, Default, Deserialize)]
struct QuoteSummaryEnvelope {
    #[serde(rename = "quoteSummary")]
    quote_summary: QuoteSummary,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteSummary {
    result: Option<Vec<QuoteSummaryResult>>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteSummaryResult {
    #[serde(rename = "financialData")]
    financial_data: Option<Value>,
    #[serde(rename = "defaultKeyStatistics")]
    default_key_statistics: Option<Value>,
    #[serde(rename = "summaryProfile")]
    summary_profile: Option<Value>,
    price: Option<Value>,
}

/// Yahoo's quoteSummary API wraps most numeric fields as `{"raw": ..., "fmt": ...}`.
fn raw(value: &Option<Value>, field: &str) -> Option<f64> {
    value.as_ref()?.get(field)?.get("raw")?.as_f64()
}

/// `summaryProfile` fields (industry, sector, address) are plain JSON scalars.
fn plain_str(value: &Option<Value>, field: &str) -> Option<String> {
    value.as_ref()?.get(field)?.as_str().map(str::to_string)
}

fn plain_i64(value: &Option<Value>, field: &str) -> Option<i64> {
    value.as_ref()?.get(field)?.as_i64()
}

fn to_decimal(value: Option<f64>) -> Option<BigDecimal> {
    value.and_then(|v| BigDecimal::try_from(v).ok())
}

fn build_financial_payload(info: &QuoteSummaryResult, entity_id: i32) -> Option<CompanyFinancialPayload> {
    let fd = &info.financial_data;
    let payload = CompanyFinancialPayload {
        entity_id,
        company_id: entity_id,
        revenue: to_decimal(raw(fd, "totalRevenue")),
        ebitda: to_decimal(raw(fd, "ebitda")),
        gross_profit: to_decimal(raw(fd, "grossProfits")),
        operating_income: to_decimal(raw(fd, "operatingIncome")),
        net_income: to_decimal(raw(fd, "netIncomeToCommon")),
        total_assets: to_decimal(raw(fd, "totalAssets")),
        total_debt: to_decimal(raw(fd, "totalDebt")),
        total_cash: to_decimal(raw(fd, "totalCash")),
        total_stockholder_equity: to_decimal(raw(&info.default_key_statistics, "bookValue")),
        free_cash_flow: to_decimal(raw(fd, "freeCashflow")),
        operating_cash_flow: to_decimal(raw(fd, "operatingCashflow")),
        gross_margin: to_decimal(raw(fd, "grossMargins")),
        operating_margin: to_decimal(raw(fd, "operatingMargins")),
        revenue_growth: to_decimal(raw(fd, "revenueGrowth")),
    };

    let any_present = payload.revenue.is_some()
        || payload.ebitda.is_some()
        || payload.gross_profit.is_some()
        || payload.operating_income.is_some()
        || payload.net_income.is_some()
        || payload.total_assets.is_some()
        || payload.total_debt.is_some()
        || payload.total_cash.is_some()
        || payload.total_stockholder_equity.is_some()
        || payload.free_cash_flow.is_some()
        || payload.operating_cash_flow.is_some()
        || payload.gross_margin.is_some()
        || payload.operating_margin.is_some()
        || payload.revenue_growth.is_some();

    any_present.then_some(payload)
}

fn build_valuation_payload(info: &QuoteSummaryResult, entity_id: i32) -> Option<CompanyValuationPayload> {
    let dks = &info.default_key_statistics;
    let enterprise_value = to_decimal(raw(dks, "enterpriseValue"));
    let market_cap = to_decimal(raw(&info.price, "marketCap"));

    if enterprise_value.is_none() && market_cap.is_none() {
        return None;
    }

    Some(CompanyValuationPayload {
        entity_id,
        company_id: entity_id,
        valuation_date: Utc::now().date_naive(),
        enterprise_value,
        estimated_enterprise_value_usd: None,
        market_cap,
        estimated_equity_value_usd: None,
        ev_to_revenue: to_decimal(raw(dks, "enterpriseToRevenue")),
        ev_to_revenue_multiple: None,
        ev_to_ebitda: to_decimal(raw(dks, "enterpriseToEbitda")),
        ev_to_ebitda_multiple: None,
        trailing_pe: to_decimal(raw(dks, "trailingPE")),
        valuation_method: Some("Public Comps".to_string()),
    })
}

fn build_update_payload(info: &QuoteSummaryResult, entity_id: i32, ticker: String) -> Option<CompanyUpdatePayload> {
    let sp = &info.summary_profile;
    let industry = plain_str(sp, "industry");
    let sector = plain_str(sp, "sector");

    if industry.is_none() && sector.is_none() {
        return None;
    }

    Some(CompanyUpdatePayload {
        entity_id,
        company_id: Some(entity_id),
        industry,
        sector,
        description: plain_str(sp, "longBusinessSummary"),
        employee_count: plain_i64(sp, "fullTimeEmployees").map(|v| v as i32),
        headquarters_city: plain_str(sp, "city"),
        headquarters_state: plain_str(sp, "state"),
        headquarters_country: plain_str(sp, "country"),
        website: plain_str(sp, "website"),
        ticker: Some(ticker),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_equity_quote_over_first_result() {
        let quotes = vec![
            YahooSearchQuote { symbol: "KKRX".to_string(), quote_type: Some("OPTION".to_string()) },
            YahooSearchQuote { symbol: "KKR".to_string(), quote_type: Some("EQUITY".to_string()) },
        ];
        assert_eq!(pick_equity_ticker(&quotes), Some("KKR".to_string()));
    }

    #[test]
    fn falls_back_to_first_quote_when_no_equity() {
        let quotes = vec![YahooSearchQuote { symbol: "KKRX".to_string(), quote_type: Some("OPTION".to_string()) }];
        assert_eq!(pick_equity_ticker(&quotes), Some("KKRX".to_string()));
    }

    #[test]
    fn extracts_raw_wrapped_numeric_field() {
        let value: Value = serde_json::json!({"totalRevenue": {"raw": 123.0, "fmt": "123"}});
        assert_eq!(raw(&Some(value), "totalRevenue"), Some(123.0));
    }

    #[test]
    fn financial_payload_absent_when_all_fields_missing() {
        let info = QuoteSummaryResult::default();
        assert!(build_financial_payload(&info, 1).is_none());
    }
}
