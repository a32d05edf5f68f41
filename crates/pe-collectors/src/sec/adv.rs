//! Form ADV collector (§4.3), grounded in
//! `original_source/.../firm_collectors/sec_adv_collector.py`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use pe_core::model::{
    Confidence, EntityType, FirmUpdatePayload, FormAdvFilingPayload, Item, ItemEnvelope,
    Source,
};
use pe_http::HttpSubstrate;

use crate::registry::Collector;
use crate::sec::shared::{browse_edgar_url, filing_document_url, strip_accession_dashes, submissions_url, SecSubmissions};
use crate::CollectArgs;

pub struct SecAdvCollector {
    http: Arc<HttpSubstrate>,
}

impl SecAdvCollector {
    pub fn new(http: Arc<HttpSubstrate>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Collector for SecAdvCollector {
    fn source_type(&self) -> Source {
        Source::SecAdv
    }

    fn entity_type(&self) -> EntityType {
        EntityType::Firm
    }

    async fn collect(&self, args: &CollectArgs) -> pe_core::model::CollectionResult {
        let started_at = Utc::now();

        let Some(cik) = args.cik.as_deref() else {
            return pe_core::model::CollectionResult::failed(
                args.entity_id,
                args.entity_name.clone(),
                EntityType::Firm,
                Source::SecAdv,
                started_at,
                "no CIK provided for SEC lookup".to_string(),
            );
        };

        let submissions: SecSubmissions = match self.http.get_json(&submissions_url(cik)).await {
            Ok(s) => s,
            Err(e) => {
                return pe_core::model::CollectionResult::failed(
                    args.entity_id,
                    args.entity_name.clone(),
                    EntityType::Firm,
                    Source::SecAdv,
                    started_at,
                    e.to_string(),
                )
            }
        };

        let mut items = Vec::new();

        items.push(Item::FirmUpdate(ItemEnvelope::new(
            firm_update_from_submissions(args.entity_id, args.entity_name.clone(), &submissions),
            Some(browse_edgar_url(cik, None)),
            Confidence::High,
            false,
        )));

        for filing in submissions.filings_of(&["1-A", "ADV", "ADV-H", "ADV-NR", "ADV-W"], usize::MAX) {
            if !filing.form.to_uppercase().contains("ADV") {
                continue;
            }
            let Some(accession) = filing.accession_number.clone() else {
                continue;
            };
            let Some(primary_doc) = filing.primary_document.clone() else {
                continue;
            };
            let accession_clean = strip_accession_dashes(&accession);
            let filing_url = filing_document_url(cik, &accession_clean, &primary_doc);

            items.push(Item::FormAdvFiling(ItemEnvelope::new(
                FormAdvFilingPayload {
                    entity_id: args.entity_id,
                    form_type: filing.form.clone(),
                    filing_date: filing.filing_date.as_deref().and_then(parse_filing_date),
                    document_url: Some(filing_url.clone()),
                },
                Some(filing_url),
                Confidence::High,
                false,
            )));

            if items.len() >= 6 {
                // one FirmUpdate + 5 most-recent ADV filings, matching the
                // original collector's cap
                break;
            }
        }

        pe_core::model::CollectionResult {
            items,
            completed_at: Utc::now(),
            ..pe_core::model::CollectionResult::empty(
                args.entity_id,
                args.entity_name.clone(),
                EntityType::Firm,
                Source::SecAdv,
                started_at,
            )
        }
    }
}

fn firm_update_from_submissions(
    entity_id: i32,
    entity_name: String,
    submissions: &SecSubmissions,
) -> FirmUpdatePayload {
    let business = submissions.addresses.business.as_ref();
    FirmUpdatePayload {
        entity_id,
        entity_name,
        headquarters_city: business.and_then(|b| b.city.clone()),
        headquarters_state: business.and_then(|b| b.state_or_country.clone()),
        headquarters_country: None,
        cik: submissions.cik.as_ref().map(|v| v.to_string()),
        linkedin_url: None,
        twitter_url: None,
        contact_email: None,
        is_sec_registered: Some(true),
        source_label: "sec_adv".to_string(),
    }
}

fn parse_filing_date(date: &str) -> Option<chrono::NaiveDate> {
    chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn firm_update_pulls_business_address() {
        let submissions = SecSubmissions {
            name: Some("Example Capital".to_string()),
            cik: Some(serde_json::json!(320193)),
            sic: None,
            sic_description: None,
            addresses: crate::sec::shared::SecAddresses {
                business: Some(crate::sec::shared::SecAddress {
                    city: Some("New York".to_string()),
                    state_or_country: Some("NY".to_string()),
                }),
            },
            filings: crate::sec::shared::SecFilings {
                recent: Default::default(),
            },
        };

        let payload = firm_update_from_submissions(1, "Example Capital".to_string(), &submissions);
        assert_eq!(payload.headquarters_city.as_deref(), Some("New York"));
        assert_eq!(payload.is_sec_registered, Some(true));
    }
}
