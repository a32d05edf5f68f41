//! Valuation estimator (§4.5), grounded in
//! `original_source/.../financial_collectors/valuation_estimator.py`.
//!
//! Unlike every other collector, this one has no document to fetch: its
//! only inputs are whatever financial context already sits in the
//! database for the company. Rather than widen `CollectArgs` with fields
//! only this collector needs, it holds a `DatabasePool` directly and looks
//! up the company's most recent financial snapshot at `collect()` time —
//! the same role the orchestrator's entity loader plays for every other
//! collector, just deferred to here since the lookup is collector-local.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use pe_core::model::{CompanyValuationPayload, Confidence, EntityType, Item, ItemEnvelope, Source};
use pe_core::models::company::{PeCompanyFinancial, PePortfolioCompany};
use pe_core::DatabasePool;

use crate::llm::{parse_json_array_with_repair, LlmClient, LlmRequest};
use crate::registry::Collector;
use crate::CollectArgs;

const VALUATION_PROMPT_TEMPLATE: &str = r#"Estimate a valuation for {company_name}, a private company, using the financial context below. Return ONLY valid JSON:
{{
  "estimated_enterprise_value_usd": number or null,
  "estimated_equity_value_usd": number or null,
  "valuation_method": "Comparable Multiples|DCF Proxy|Revenue Multiple|EBITDA Multiple|Asset-Based|Blended",
  "ev_to_revenue_multiple": number or null,
  "ev_to_ebitda_multiple": number or null,
  "comparable_companies": ["list of public comps used"],
  "industry_median_ev_revenue": number or null,
  "industry_median_ev_ebitda": number or null,
  "confidence_level": "Low|Medium|High",
  "key_assumptions": ["list of assumptions"],
  "methodology_notes": "1-2 sentences on the approach"
}}

Financial context:
{context}"#;

#[derive(Debug, Deserialize)]
struct ValuationEstimate {
    estimated_enterprise_value_usd: Option<f64>,
    estimated_equity_value_usd: Option<f64>,
    valuation_method: Option<String>,
    ev_to_revenue_multiple: Option<f64>,
    ev_to_ebitda_multiple: Option<f64>,
    confidence_level: Option<String>,
}

pub struct ValuationEstimatorCollector {
    db: Arc<DatabasePool>,
    llm: Arc<dyn LlmClient>,
}

impl ValuationEstimatorCollector {
    pub fn new(db: Arc<DatabasePool>, llm: Arc<dyn LlmClient>) -> Self {
        Self { db, llm }
    }

    fn build_context(company: &PePortfolioCompany, financial: Option<&PeCompanyFinancial>) -> String {
        let mut lines = Vec::new();
        lines.push(format!("Company: {}", company.name));
        if let Some(industry) = &company.industry {
            lines.push(format!("Industry: {industry}"));
        }
        if let Some(sector) = &company.sector {
            lines.push(format!("Sector: {sector}"));
        }
        if let Some(employees) = company.employee_count {
            lines.push(format!("Employees: {employees}"));
        }
        if let Some(description) = &company.description {
            lines.push(format!("Description: {description}"));
        }
        if let Some(f) = financial {
            if let Some(revenue) = &f.revenue_usd {
                lines.push(format!("Revenue: ${revenue}"));
            }
            if let Some(ebitda) = &f.ebitda_usd {
                lines.push(format!("EBITDA: ${ebitda}"));
            }
            if let Some(growth) = &f.revenue_growth_pct {
                lines.push(format!("Revenue growth: {growth}%"));
            }
            if let Some(debt) = &f.total_debt_usd {
                lines.push(format!("Total debt: ${debt}"));
            }
            if let Some(cash) = &f.cash_usd {
                lines.push(format!("Cash: ${cash}"));
            }
        }
        if lines.len() <= 1 {
            lines.push("No structured financial data on file; estimate from the company description alone.".to_string());
        }
        lines.join("\n")
    }

    /// The LLM self-reports its own confidence tier, but that tier is never
    /// promoted into the pipeline's `Medium`/`High` bands — those are
    /// reserved for directly-observed, structured-source data, not an LLM's
    /// self-assessment (§4.5, recorded as an Open Question in DESIGN.md).
    fn map_confidence(level: Option<&str>) -> Confidence {
        match level {
            Some("Low") => Confidence::Low,
            Some("Medium") | Some("High") => Confidence::LlmExtracted,
            _ => Confidence::Low,
        }
    }
}

#[async_trait]
impl Collector for ValuationEstimatorCollector {
    fn source_type(&self) -> Source {
        Source::ValuationEstimator
    }

    fn entity_type(&self) -> EntityType {
        EntityType::Company
    }

    async fn collect(&self, args: &CollectArgs) -> pe_core::model::CollectionResult {
        let started_at = Utc::now();

        let mut conn = match self.db.get().await {
            Ok(conn) => conn,
            Err(e) => {
                return pe_core::model::CollectionResult::failed(
                    args.entity_id,
                    args.entity_name.clone(),
                    EntityType::Company,
                    Source::ValuationEstimator,
                    started_at,
                    format!("failed to acquire a database connection: {e}"),
                )
            }
        };

        let company = match PePortfolioCompany::find_by_id(&mut conn, args.entity_id).await {
            Ok(Some(company)) => company,
            Ok(None) => {
                return pe_core::model::CollectionResult::failed(
                    args.entity_id,
                    args.entity_name.clone(),
                    EntityType::Company,
                    Source::ValuationEstimator,
                    started_at,
                    format!("no portfolio company row for entity {}", args.entity_id),
                )
            }
            Err(e) => {
                return pe_core::model::CollectionResult::failed(
                    args.entity_id,
                    args.entity_name.clone(),
                    EntityType::Company,
                    Source::ValuationEstimator,
                    started_at,
                    format!("failed to load company: {e}"),
                )
            }
        };

        let financial = match PeCompanyFinancial::find_latest(&mut conn, args.entity_id).await {
            Ok(financial) => financial,
            Err(e) => {
                tracing::warn!(entity_id = args.entity_id, error = %e, "failed to load financial snapshot, estimating without it");
                None
            }
        };

        let context = Self::build_context(&company, financial.as_ref());
        let prompt = VALUATION_PROMPT_TEMPLATE
            .replace("{company_name}", &args.entity_name)
            .replace("{context}", &context);

        let response = match self
            .llm
            .complete(LlmRequest {
                system: "You are a private-equity valuation analyst. Respond with only valid JSON, no prose."
                    .to_string(),
                user: prompt,
                max_tokens: 1000,
                temperature: 0.2,
                json_mode: true,
                purpose: Source::ValuationEstimator,
            })
            .await
        {
            Ok(r) => r,
            Err(e) => {
                return pe_core::model::CollectionResult::failed(
                    args.entity_id,
                    args.entity_name.clone(),
                    EntityType::Company,
                    Source::ValuationEstimator,
                    started_at,
                    format!("LLM valuation request failed: {e}"),
                )
            }
        };

        // The LLM is asked for a single object, but the repair routine
        // parses arrays; wrap and unwrap a one-element array so truncated
        // responses still benefit from the JSON-array repair pass.
        let wrapped = format!("[{}]", response.content.trim());
        let estimates: Vec<ValuationEstimate> = match parse_json_array_with_repair(&wrapped) {
            Ok(estimates) => estimates,
            Err(e) => {
                return pe_core::model::CollectionResult {
                    warnings: vec![format!("could not parse valuation estimate: {e}")],
                    completed_at: Utc::now(),
                    ..pe_core::model::CollectionResult::empty(
                        args.entity_id,
                        args.entity_name.clone(),
                        EntityType::Company,
                        Source::ValuationEstimator,
                        started_at,
                    )
                }
            }
        };

        let Some(estimate) = estimates.into_iter().next() else {
            return pe_core::model::CollectionResult {
                warnings: vec!["LLM returned no valuation estimate".to_string()],
                completed_at: Utc::now(),
                ..pe_core::model::CollectionResult::empty(
                    args.entity_id,
                    args.entity_name.clone(),
                    EntityType::Company,
                    Source::ValuationEstimator,
                    started_at,
                )
            };
        };

        let confidence = Self::map_confidence(estimate.confidence_level.as_deref());

        let payload = CompanyValuationPayload {
            entity_id: args.entity_id,
            company_id: args.entity_id,
            valuation_date: Utc::now().date_naive(),
            enterprise_value: None,
            estimated_enterprise_value_usd: estimate
                .estimated_enterprise_value_usd
                .and_then(|v| bigdecimal::BigDecimal::try_from(v).ok()),
            market_cap: None,
            estimated_equity_value_usd: estimate
                .estimated_equity_value_usd
                .and_then(|v| bigdecimal::BigDecimal::try_from(v).ok()),
            ev_to_revenue: None,
            ev_to_revenue_multiple: estimate
                .ev_to_revenue_multiple
                .and_then(|v| bigdecimal::BigDecimal::try_from(v).ok()),
            ev_to_ebitda: None,
            ev_to_ebitda_multiple: estimate
                .ev_to_ebitda_multiple
                .and_then(|v| bigdecimal::BigDecimal::try_from(v).ok()),
            trailing_pe: None,
            valuation_method: estimate.valuation_method,
        };

        // `source_url: None` is intentional — this is an LLM estimate, not
        // a document the persister can point back to.
        let items = vec![Item::CompanyValuation(ItemEnvelope::new(payload, None, confidence, false))];

        pe_core::model::CollectionResult {
            items,
            completed_at: Utc::now(),
            ..pe_core::model::CollectionResult::empty(
                args.entity_id,
                args.entity_name.clone(),
                EntityType::Company,
                Source::ValuationEstimator,
                started_at,
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_confidence_level_maps_to_low() {
        assert_eq!(ValuationEstimatorCollector::map_confidence(Some("Low")), Confidence::Low);
    }

    #[test]
    fn medium_and_high_confidence_levels_never_promote_past_llm_extracted() {
        assert_eq!(ValuationEstimatorCollector::map_confidence(Some("Medium")), Confidence::LlmExtracted);
        assert_eq!(ValuationEstimatorCollector::map_confidence(Some("High")), Confidence::LlmExtracted);
    }

    #[test]
    fn missing_confidence_level_defaults_to_low() {
        assert_eq!(ValuationEstimatorCollector::map_confidence(None), Confidence::Low);
    }
}
