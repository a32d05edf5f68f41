//! 13F/13D collector (§4.3), grounded in
//! `original_source/.../portfolio_collectors/sec_13f_collector.py`. Both form
//! families share one `Collector` impl and report under `Source::Sec13d`,
//! matching the original's single `source_type`.

use std::sync::Arc;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;
use scraper::{Html, Selector};

use pe_core::model::{
    Confidence, EntityType, Item, ItemEnvelope, Source, ThirteenDStakePayload, ThirteenFHoldingPayload,
};
use pe_http::HttpSubstrate;

use crate::registry::Collector;
use crate::sec::shared::{
    browse_edgar_url, filing_document_url, filing_index_url, find_text_by_local_name, nodes_by_local_name,
    strip_accession_dashes, submissions_url, SecFiling, SecSubmissions,
};
use crate::CollectArgs;

const FORM_13F_TYPES: &[&str] = &["13F-HR", "13F-HR/A", "13F-NT", "13F-NT/A"];
const FORM_13D_TYPES: &[&str] = &["SC 13D", "SC 13D/A", "SC 13G", "SC 13G/A"];
const MAX_13F_FILINGS: usize = 4;
const MAX_13D_FILINGS: usize = 10;

pub struct Sec13fCollector {
    http: Arc<HttpSubstrate>,
}

impl Sec13fCollector {
    pub fn new(http: Arc<HttpSubstrate>) -> Self {
        Self { http }
    }

    /// Lists the filing index page and tries each XML file, largest first —
    /// SEC does not canonically label which document is the infotable, and
    /// filers use inconsistent filenames across software versions.
    async fn fetch_infotable_from_index(
        &self,
        cik: &str,
        accession_clean: &str,
    ) -> Option<(Vec<ThirteenFHoldingRow>, String)> {
        let index_url = filing_index_url(cik, accession_clean);
        let index_html = self.http.get_bytes(&index_url).await.ok()?;
        let index_text = String::from_utf8_lossy(&index_html);

        let mut candidates = parse_index_xml_files(&index_text);
        candidates.sort_by(|a, b| b.1.cmp(&a.1));

        for (filename, _size) in candidates {
            if filename.eq_ignore_ascii_case("primary_doc.xml") {
                continue;
            }
            let xml_url = filing_document_url(cik, accession_clean, &filename);
            let Ok(bytes) = self.http.get_bytes(&xml_url).await else {
                continue;
            };
            let text = String::from_utf8_lossy(&bytes);
            let holdings = parse_infotable_xml(&text);
            if !holdings.is_empty() {
                return Some((holdings, xml_url));
            }
        }
        None
    }

    async fn process_13f_filing(&self, filing: &SecFiling, cik: &str, args: &CollectArgs) -> Vec<Item> {
        let Some(accession) = filing.accession_number.as_deref() else {
            return Vec::new();
        };
        let accession_clean = strip_accession_dashes(accession);

        let Some((holdings, source_url)) = self.fetch_infotable_from_index(cik, &accession_clean).await else {
            return Vec::new();
        };

        let report_date = filing.report_date.as_deref().and_then(parse_date);

        holdings
            .into_iter()
            .filter(|h| h.cusip.is_some())
            .map(|h| {
                Item::ThirteenFHolding(ItemEnvelope::new(
                    ThirteenFHoldingPayload {
                        entity_id: args.entity_id,
                        firm_id: Some(args.entity_id),
                        firm_name: args.entity_name.clone(),
                        issuer_name: h.issuer,
                        security_class: h.class,
                        cusip: h.cusip,
                        shares: h.shares,
                        invested_amount_usd: h.value,
                        put_call: h.put_call,
                        investment_discretion: h.investment_discretion,
                        report_date: report_date
                            .unwrap_or_else(|| chrono::NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()),
                    },
                    Some(source_url.clone()),
                    Confidence::High,
                    false,
                ))
            })
            .collect()
    }

    /// 13D/13G are processed from submission metadata only — no document
    /// fetch — so `issuer_name` is never populated here. See DESIGN.md Open
    /// Questions: the persister is expected to skip the item rather than
    /// treat the absence as an error.
    fn process_13d_filing(&self, filing: &SecFiling, args: &CollectArgs) -> Option<Item> {
        filing.accession_number.as_ref()?;
        Some(Item::ThirteenDStake(ItemEnvelope::new(
            ThirteenDStakePayload {
                entity_id: args.entity_id,
                firm_id: Some(args.entity_id),
                firm_name: args.entity_name.clone(),
                issuer_name: None,
                report_date: filing.report_date.as_deref().and_then(parse_date),
            },
            Some(browse_edgar_url(&args.entity_id.to_string(), Some("SC+13D"))),
            Confidence::High,
            false,
        )))
    }
}

#[async_trait]
impl Collector for Sec13fCollector {
    fn source_type(&self) -> Source {
        Source::Sec13d
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
                Source::Sec13d,
                started_at,
                "no CIK provided — cannot fetch SEC filings".to_string(),
            );
        };

        let submissions: SecSubmissions = match self.http.get_json(&submissions_url(cik)).await {
            Ok(s) => s,
            Err(e) => {
                return pe_core::model::CollectionResult::failed(
                    args.entity_id,
                    args.entity_name.clone(),
                    EntityType::Firm,
                    Source::Sec13d,
                    started_at,
                    e.to_string(),
                )
            }
        };

        let mut items = Vec::new();
        let mut warnings = Vec::new();

        for filing in submissions.filings_of(FORM_13F_TYPES, MAX_13F_FILINGS) {
            let filing_items = self.process_13f_filing(&filing, cik, args).await;
            if filing_items.is_empty() {
                warnings.push(format!(
                    "no holdings parsed from 13F filing {}",
                    filing.accession_number.clone().unwrap_or_default()
                ));
            }
            items.extend(filing_items);
        }

        for filing in submissions.filings_of(FORM_13D_TYPES, MAX_13D_FILINGS) {
            if let Some(item) = self.process_13d_filing(&filing, args) {
                items.push(item);
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
                Source::Sec13d,
                started_at,
            )
        }
    }
}

struct ThirteenFHoldingRow {
    issuer: Option<String>,
    class: Option<String>,
    cusip: Option<String>,
    shares: Option<i64>,
    value: Option<BigDecimal>,
    put_call: Option<String>,
    investment_discretion: Option<String>,
}

/// SEC's filing index HTML lists each document as a table row with an
/// anchor and a file-size cell; this pulls `(filename, size)` pairs for
/// `.xml` documents.
fn parse_index_xml_files(html: &str) -> Vec<(String, u64)> {
    let document = Html::parse_document(html);
    let row_selector = Selector::parse("tr").unwrap();
    let link_selector = Selector::parse("a").unwrap();
    let cell_selector = Selector::parse("td").unwrap();

    let mut files = Vec::new();
    for row in document.select(&row_selector) {
        let Some(link) = row.select(&link_selector).next() else {
            continue;
        };
        let href = link.value().attr("href").unwrap_or_default();
        if !href.to_lowercase().ends_with(".xml") {
            continue;
        }
        let filename = href.rsplit('/').next().unwrap_or(href).to_string();

        let size = row
            .select(&cell_selector)
            .filter_map(|td| td.text().collect::<String>().trim().parse::<u64>().ok())
            .next()
            .unwrap_or(0);

        files.push((filename, size));
    }
    files
}

/// Parses a 13F infoTable XML document, tolerant of the namespace and
/// casing variations different filer software emits (§4.3).
fn parse_infotable_xml(xml: &str) -> Vec<ThirteenFHoldingRow> {
    let Ok(doc) = roxmltree::Document::parse(xml) else {
        return Vec::new();
    };
    let root = doc.root_element();

    let mut entries = nodes_by_local_name(root, "infoTable");
    if entries.is_empty() {
        entries = nodes_by_local_name(root, "infotable");
    }
    if entries.is_empty() && root.tag_name().name().eq_ignore_ascii_case("informationTable") {
        entries = root.children().filter(|n| n.is_element()).collect();
    }

    entries
        .into_iter()
        .map(|entry| ThirteenFHoldingRow {
            issuer: find_text_by_local_name(entry, "nameOfIssuer"),
            class: find_text_by_local_name(entry, "titleOfClass"),
            cusip: find_text_by_local_name(entry, "cusip"),
            shares: find_text_by_local_name(entry, "sshPrnamt").and_then(|s| s.parse().ok()),
            value: find_text_by_local_name(entry, "value").and_then(|s| s.parse().ok()),
            put_call: find_text_by_local_name(entry, "putCall"),
            investment_discretion: find_text_by_local_name(entry, "investmentDiscretion"),
        })
        .collect()
}

fn parse_date(date: &str) -> Option<chrono::NaiveDate> {
    chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_infotable_entries() {
        let xml = r#"<informationTable xmlns="http://www.sec.gov/edgar/document/thirteenf/informationtable">
            <infoTable>
                <nameOfIssuer>ACME CORP</nameOfIssuer>
                <titleOfClass>COM</titleOfClass>
                <cusip>000000000</cusip>
                <value>12345</value>
                <shrsOrPrnAmt><sshPrnamt>1000</sshPrnamt></shrsOrPrnAmt>
                <putCall>Call</putCall>
                <investmentDiscretion>SOLE</investmentDiscretion>
            </infoTable>
        </informationTable>"#;

        let holdings = parse_infotable_xml(xml);
        assert_eq!(holdings.len(), 1);
        assert_eq!(holdings[0].issuer.as_deref(), Some("ACME CORP"));
        assert_eq!(holdings[0].cusip.as_deref(), Some("000000000"));
    }

    #[test]
    fn thirteen_d_never_populates_issuer_name() {
        let filing = SecFiling {
            form: "SC 13D".to_string(),
            accession_number: Some("0001234567-24-000001".to_string()),
            filing_date: Some("2024-01-02".to_string()),
            report_date: Some("2024-01-01".to_string()),
            primary_document: Some("primary_doc.xml".to_string()),
        };
        let args = CollectArgs {
            entity_id: 1,
            entity_name: "Example Capital".to_string(),
            entity_type: EntityType::Firm,
            website_url: None,
            cik: Some("320193".to_string()),
            ticker: None,
            crd_number: None,
            rate_limit_delay: std::time::Duration::from_millis(100),
            max_retries: 3,
        };

        let http = Arc::new(HttpSubstrate::new("t/1.0", "t/1.0", 10.0, 1, 2.0).unwrap());
        let collector = Sec13fCollector::new(http);
        let item = collector.process_13d_filing(&filing, &args).unwrap();
        match item {
            Item::ThirteenDStake(envelope) => assert!(envelope.payload.issuer_name.is_none()),
            _ => panic!("expected ThirteenDStake"),
        }
    }
}
