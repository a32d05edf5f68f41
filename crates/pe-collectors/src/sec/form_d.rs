//! Form D collector (§4.3), grounded in
//! `original_source/.../deal_collectors/sec_formd_collector.py` and
//! `original_source/app/sources/sec_form_d/parser.py`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use pe_core::model::{Confidence, EntityType, FormDFilingPayload, Item, ItemEnvelope, RelatedPersonPayload, Source};
use pe_http::HttpSubstrate;

use crate::registry::Collector;
use crate::sec::shared::{
    browse_edgar_url, filing_document_url, find_text_by_local_name, nodes_by_local_name,
    strip_accession_dashes, submissions_url, SecSubmissions,
};
use crate::CollectArgs;

const FORM_D_TYPES: &[&str] = &["D", "D/A"];
const MAX_FILINGS: usize = 10;

pub struct SecFormDCollector {
    http: Arc<HttpSubstrate>,
}

impl SecFormDCollector {
    pub fn new(http: Arc<HttpSubstrate>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Collector for SecFormDCollector {
    fn source_type(&self) -> Source {
        Source::SecFormD
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
                Source::SecFormD,
                started_at,
                "no CIK provided for Form D lookup".to_string(),
            );
        };

        let submissions: SecSubmissions = match self.http.get_json(&submissions_url(cik)).await {
            Ok(s) => s,
            Err(e) => {
                return pe_core::model::CollectionResult::failed(
                    args.entity_id,
                    args.entity_name.clone(),
                    EntityType::Firm,
                    Source::SecFormD,
                    started_at,
                    e.to_string(),
                )
            }
        };

        let mut items = Vec::new();
        let mut warnings = Vec::new();

        for filing in submissions.filings_of(FORM_D_TYPES, MAX_FILINGS) {
            let (Some(accession), Some(primary_doc)) =
                (filing.accession_number.clone(), filing.primary_document.clone())
            else {
                continue;
            };
            let accession_clean = strip_accession_dashes(&accession);
            let doc_url = filing_document_url(cik, &accession_clean, &primary_doc);

            let xml = match self.http.get_bytes(&doc_url).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warnings.push(format!("could not fetch XML for {accession}: {e}"));
                    continue;
                }
            };
            let xml_text = String::from_utf8_lossy(&xml);

            let doc = match roxmltree::Document::parse(&xml_text) {
                Ok(doc) => doc,
                Err(e) => {
                    warnings.push(format!("could not parse XML for {accession}: {e}"));
                    continue;
                }
            };
            let root = doc.root_element();

            let issuer_name = find_text_by_local_name(root, "issuerName")
                .or_else(|| find_text_by_local_name(root, "entityName"));
            let exemption_code = find_text_by_local_name(root, "exemption")
                .or_else(|| find_text_by_local_name(root, "federalExemptionsExclusions"));
            let exemption = exemption_code.as_deref().map(resolve_exemption_label);

            items.push(Item::FormDFiling(ItemEnvelope::new(
                FormDFilingPayload {
                    entity_id: args.entity_id,
                    entity_name: args.entity_name.clone(),
                    issuer_name: issuer_name.clone(),
                    exemption,
                },
                Some(browse_edgar_url(cik, Some("D"))),
                Confidence::High,
                false,
            )));

            for person_node in nodes_by_local_name(root, "relatedPersonInfo") {
                let first = find_text_by_local_name(person_node, "firstName");
                let last = find_text_by_local_name(person_node, "lastName");
                let full_name = match (first, last) {
                    (Some(f), Some(l)) => format!("{f} {l}"),
                    (Some(f), None) => f,
                    (None, Some(l)) => l,
                    (None, None) => continue,
                };
                let relationship = find_text_by_local_name(person_node, "relationship");

                items.push(Item::RelatedPerson(ItemEnvelope::new(
                    RelatedPersonPayload {
                        entity_id: args.entity_id,
                        full_name,
                        relationship,
                    },
                    Some(doc_url.clone()),
                    Confidence::High,
                    false,
                )));
            }
        }

        pe_core::model::CollectionResult {
            items,
            warnings,
            completed_at: Utc::now(),
            ..pe_core::model::CollectionResult::empty(
                args.entity_id,
                args.entity_name.clone(),
                EntityType::Firm,
                Source::SecFormD,
                started_at,
            )
        }
    }
}

/// Maps a Form D exemption code to its human label (Regulation D §230,
/// Securities Act §3(c)). Codes outside the known set are passed through
/// verbatim rather than dropped.
fn resolve_exemption_label(code: &str) -> String {
    match code {
        "06b" => "Rule 506(b)".to_string(),
        "06c" => "Rule 506(c)".to_string(),
        "04" => "Rule 504".to_string(),
        "05" => "Rule 505".to_string(),
        "3C" => "Section 3(c)".to_string(),
        "3C.1" => "Section 3(c)(1)".to_string(),
        "3C.7" => "Section 3(c)(7)".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_known_exemption_codes() {
        assert_eq!(resolve_exemption_label("06b"), "Rule 506(b)");
        assert_eq!(resolve_exemption_label("3C.1"), "Section 3(c)(1)");
    }

    #[test]
    fn passes_through_unknown_codes() {
        assert_eq!(resolve_exemption_label("99z"), "99z");
    }

    #[test]
    fn extracts_issuer_and_related_persons_from_xml() {
        let xml = r#"<edgarSubmission>
            <primaryIssuer><issuerName>Acme Growth Fund LP</issuerName></primaryIssuer>
            <offeringData>
                <federalExemptionsExclusions><item>06b</item></federalExemptionsExclusions>
            </offeringData>
            <relatedPersonsList>
                <relatedPersonInfo>
                    <relatedPersonName><firstName>Jane</firstName><lastName>Doe</lastName></relatedPersonName>
                    <relatedPersonRelationshipList><relationship>Executive Officer</relationship></relatedPersonRelationshipList>
                </relatedPersonInfo>
            </relatedPersonsList>
        </edgarSubmission>"#;

        let doc = roxmltree::Document::parse(xml).unwrap();
        let root = doc.root_element();

        assert_eq!(
            find_text_by_local_name(root, "issuerName").as_deref(),
            Some("Acme Growth Fund LP")
        );
        let persons = nodes_by_local_name(root, "relatedPersonInfo");
        assert_eq!(persons.len(), 1);
        assert_eq!(
            find_text_by_local_name(persons[0], "firstName").as_deref(),
            Some("Jane")
        );
    }
}
